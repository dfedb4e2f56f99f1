//! Request handlers.
//!
//! Handlers stay thin: extract and validate, call one component, wrap the
//! result in the response envelope.

pub mod counters;
pub mod kv;
pub mod leaderboard;
pub mod users;
