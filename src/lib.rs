pub mod balancer;
pub mod config;
pub mod conn;
pub mod context;
pub mod discovery;
pub mod metrics;
pub mod policies;
pub mod policy;
pub mod result;
pub mod session;
pub mod signal;

mod utils;

pub use balancer::Balancer;
pub use conn::{Conn, ConnState, Endpoint};
pub use context::{CancelHandle, Context};
pub use policies::{RandomChoice, RoundRobin};
pub use policy::BalancerPolicy;
pub use result::{Error, Result};
pub use signal::RefreshSignal;
