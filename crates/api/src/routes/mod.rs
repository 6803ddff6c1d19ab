//! HTTP route handlers

pub mod alerts;
pub mod frames;
pub mod sensors;
pub mod state;

use serde::Deserialize;

/// Optional caller-supplied timestamp
#[derive(Debug, Default, Deserialize)]
pub struct TimestampQuery {
    pub timestamp_ms: Option<u64>,
}
