//! Remlink Client Invocation Runtime
//!
//! A client-side runtime for invoking business interfaces implemented by
//! remote components over shared multiplexed connections. Callers build a
//! [`Locator`] for the target view, register connections in a
//! [`ClientContext`], and invoke through a [`ProxyInvoker`] either
//! synchronously or via an [`InvocationFuture`]. Every failure is classified
//! into the [`InvocationError`] taxonomy so application faults, peer
//! infrastructure faults, missing receivers and expired sessions stay
//! distinguishable across the process boundary.
//!
//! ```no_run
//! use remoting::{ClientContext, Connection, ModuleIdent, ProxyInvoker};
//! use remoting::transport::{StaticResolver, TcpChannel, TcpChannelConfig};
//! use std::sync::Arc;
//! use types::Locator;
//!
//! # async fn run() -> remoting::Result<()> {
//! let resolver = StaticResolver::new().with_entry("node-one", "127.0.0.1:4447".parse().unwrap());
//! let channel = TcpChannel::connect_named(&resolver, "node-one", TcpChannelConfig::default()).await?;
//!
//! let context = ClientContext::new();
//! context.register_connection(Connection::open(
//!     "node-one",
//!     vec![ModuleIdent::new("shop-app", "orders", "")],
//!     Arc::new(channel),
//! ));
//!
//! let locator = Locator::stateless("shop-app", "orders", "EchoBean", "", "EchoRemote");
//! let proxy = ProxyInvoker::new(context, locator);
//! let echoed: String = proxy.invoke("echo", "hi").await?;
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod completion;
pub mod connection;
pub mod context;
pub mod error;
pub mod interceptor;
pub mod proxy;
pub mod selector;
pub mod testing;
pub mod transport;

pub use classify::{classify, Classified};
pub use completion::{CompletionCell, InvocationFuture, Resolution};
pub use connection::{
    Connection, ConnectionId, ConnectionState, ModuleIdent, PendingInvocation,
};
pub use context::{ClientContext, TransactionToken};
pub use error::{InvocationError, Result};
pub use interceptor::{
    InterceptorAction, InterceptorChain, InvocationInterceptor, TracingInterceptor,
    TransactionInterceptor, TRANSACTION_ATTACHMENT,
};
pub use proxy::{create_session, InvocationConfig, ProxyInvoker};
pub use selector::select_receiver;
