//! API request/response models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scheduler::JobSnapshot;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub jobs: usize,
    pub active_attempts: usize,
}

/// Job list response.
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobSnapshot>,
    pub total: usize,
}

/// Result of a lifecycle action on a job.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub id: String,
    pub action: String,
    pub applied: bool,
}

/// Request body for feeding items into an input.
#[derive(Debug, Deserialize)]
pub struct AppendItemsRequest {
    pub items: Vec<Value>,
}

/// Result of feeding items into an input.
#[derive(Debug, Serialize)]
pub struct AppendItemsResponse {
    pub id: String,
    pub accepted: usize,
}
