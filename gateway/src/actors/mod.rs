// gateway/src/actors/mod.rs

pub mod directory;
pub mod socket_session;
pub mod user_socket;
