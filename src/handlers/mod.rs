//! Terminal handlers for commands that never spawn a git process

pub mod lfs;
pub mod two_factor;
pub mod welcome;
