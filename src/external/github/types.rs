use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Partial response of `GET /repos/{owner}/{repo}/actions/runs`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowRunsResponse {
    #[serde(default)]
    pub total_count: u64,
    pub workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub name: Option<String>,
    pub head_branch: Option<String>,
    #[serde(default)]
    pub head_sha: String,
    #[serde(default)]
    pub run_number: u64,
    #[serde(default)]
    pub event: String,
    /// `queued`, `in_progress`, `completed`, ...
    pub status: Option<String>,
    /// Set once `status` is `completed`
    pub conclusion: Option<String>,
    pub html_url: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub actor: Option<Actor>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Actor {
    pub login: String,
}

/// Outcome of a completed run, grouped the way notifications care about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunConclusion {
    Success,
    Failure,
    Cancelled,
    Other,
}

impl WorkflowRun {
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some("completed")
    }

    pub fn conclusion(&self) -> RunConclusion {
        match self.conclusion.as_deref() {
            Some("success") => RunConclusion::Success,
            Some("failure") | Some("timed_out") | Some("startup_failure") => RunConclusion::Failure,
            Some("cancelled") => RunConclusion::Cancelled,
            _ => RunConclusion::Other,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("workflow")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_partial_run() {
        let json = r#"{
            "total_count": 1,
            "workflow_runs": [{
                "id": 30433642,
                "name": "Build",
                "head_branch": "main",
                "head_sha": "acb5820ced9479c074f688cc328bf03f341a511d",
                "run_number": 562,
                "event": "push",
                "status": "completed",
                "conclusion": "timed_out",
                "html_url": "https://github.com/octo-org/octo-repo/actions/runs/30433642",
                "created_at": "2020-01-22T19:33:08Z",
                "updated_at": "2020-01-22T19:40:08Z",
                "actor": { "login": "octocat", "id": 1 },
                "workflow_id": 159038
            }]
        }"#;

        let response: WorkflowRunsResponse = serde_json::from_str(json).unwrap();
        let run = &response.workflow_runs[0];
        assert!(run.is_completed());
        assert_eq!(run.conclusion(), RunConclusion::Failure);
        assert_eq!(run.display_name(), "Build");
        assert_eq!(run.actor.as_ref().map(|a| a.login.as_str()), Some("octocat"));
        assert!(run.updated_at > run.created_at);
    }

    #[test]
    fn test_in_progress_run_has_no_conclusion() {
        let run = WorkflowRun {
            id: 1,
            name: None,
            head_branch: None,
            head_sha: String::new(),
            run_number: 1,
            event: "push".to_string(),
            status: Some("in_progress".to_string()),
            conclusion: None,
            html_url: "https://github.com/acme/widgets/actions/runs/1".to_string(),
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
            actor: None,
        };
        assert!(!run.is_completed());
        assert_eq!(run.conclusion(), RunConclusion::Other);
        assert_eq!(run.display_name(), "workflow");
    }
}
