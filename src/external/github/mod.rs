//! GitHub Actions REST API

mod client;
mod types;

pub use client::{GithubActionsClient, ListRunsParams};
pub use types::{Actor, RunConclusion, WorkflowRun, WorkflowRunsResponse};
