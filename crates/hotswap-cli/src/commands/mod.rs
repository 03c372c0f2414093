//! CLI command implementations

pub mod apply;
pub mod resolve;
pub mod watch;
