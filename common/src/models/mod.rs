// common/src/models/mod.rs
pub mod session;
