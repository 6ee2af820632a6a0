//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Session: resolve or issue the session id
//! 2. Rate limiter: reject early, keyed by session

pub mod rate;
pub mod session;
