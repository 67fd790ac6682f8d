// gateway/src/middleware/mod.rs
pub mod observe;

pub use observe::{Observe, Outcome, Reporter, TracingReporter};
