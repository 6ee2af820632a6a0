//! The response pipeline: prompt → generation → relay → persistence.

pub mod emergency;
pub mod generation;
pub mod persist;
pub mod prompt;
pub mod relay;
pub mod urgency;
