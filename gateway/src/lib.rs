// gateway/src/lib.rs
pub mod actors;
pub mod dispatch;
pub mod error;
pub mod middleware;
pub mod routing;
pub mod rpc;
pub mod store;
pub mod upgrade;
