use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};

use super::types::{WorkflowRun, WorkflowRunsResponse};
use crate::config::GithubConfig;
use crate::error::{AppError, AppResult};
use crate::external::client::build_http_client;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Query for [`GithubActionsClient::list_workflow_runs`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRunsParams {
    pub per_page: u32,
    pub status: Option<String>,
    pub branch: Option<String>,
    /// 1-based result page; the first page when unset
    pub page: Option<u32>,
}

/// Thin client over the workflow runs endpoint.
#[derive(Debug, Clone)]
pub struct GithubActionsClient {
    http: reqwest::Client,
    api_url: Url,
    headers: HeaderMap,
}

impl GithubActionsClient {
    pub fn new(config: &GithubConfig) -> AppResult<Self> {
        let api_url = Url::parse(config.api_url.trim_end_matches('/')).map_err(|e| {
            AppError::Validation {
                field: "github.api_url".to_string(),
                reason: e.to_string(),
            }
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        if let Some(token) = config.token.as_deref() {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                AppError::Validation {
                    field: "github.token".to_string(),
                    reason: "token contains characters not allowed in a header".to_string(),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(Self {
            http: build_http_client(config.request_timeout())?,
            api_url,
            headers,
        })
    }

    fn make_error(message: impl Into<String>, source: Option<anyhow::Error>) -> AppError {
        AppError::ExternalApi {
            service: "github".into(),
            message: message.into(),
            source,
        }
    }

    fn runs_url(&self, repo: &str, params: &ListRunsParams) -> AppResult<Url> {
        let (owner, name) = repo.split_once('/').ok_or_else(|| AppError::Validation {
            field: "repository".to_string(),
            reason: format!("'{}' is not in owner/repo form", repo),
        })?;

        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| Self::make_error("api_url cannot be a base URL", None))?
            .pop_if_empty()
            .extend(["repos", owner, name, "actions", "runs"]);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("per_page", &params.per_page.to_string());
            if let Some(status) = params.status.as_deref() {
                query.append_pair("status", status);
            }
            if let Some(branch) = params.branch.as_deref() {
                query.append_pair("branch", branch);
            }
            if let Some(page) = params.page {
                query.append_pair("page", &page.to_string());
            }
        }
        Ok(url)
    }

    /// Most recent runs of `repo` (`owner/repo`), newest first.
    pub async fn list_workflow_runs(
        &self,
        repo: &str,
        params: &ListRunsParams,
    ) -> AppResult<Vec<WorkflowRun>> {
        let url = self.runs_url(repo, params)?;
        tracing::debug!(repo, url = %url, "Listing workflow runs");

        let resp = self
            .http
            .get(url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| {
                Self::make_error(format!("request for {} failed", repo), Some(e.into()))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let hint = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => " (check github.token)",
                StatusCode::NOT_FOUND => " (unknown repository or missing access)",
                _ => "",
            };
            return Err(Self::make_error(
                format!("list runs for {} returned {}{}", repo, status, hint),
                None,
            ));
        }

        let body: WorkflowRunsResponse = resp.json().await.map_err(|e| {
            Self::make_error(format!("invalid runs payload for {}", repo), Some(e.into()))
        })?;
        Ok(body.workflow_runs)
    }

    /// Reads consecutive pages of runs until one comes back shorter than
    /// `per_page`, or `max_pages` pages were read.
    ///
    /// Runs are ordered by creation, so a run finishing late can sit on a
    /// later page than runs that started after it.
    pub async fn list_workflow_runs_paged(
        &self,
        repo: &str,
        params: &ListRunsParams,
        max_pages: u32,
    ) -> AppResult<Vec<WorkflowRun>> {
        let per_page = params.per_page as usize;
        let mut runs = Vec::new();

        for page in 1..=max_pages.max(1) {
            let params = ListRunsParams {
                page: Some(page),
                ..params.clone()
            };
            let batch = self.list_workflow_runs(repo, &params).await?;
            let exhausted = batch.len() < per_page || batch.is_empty();
            runs.extend(batch);

            if exhausted {
                return Ok(runs);
            }
        }

        tracing::warn!(
            repo,
            max_pages,
            per_page,
            "Stopped reading workflow runs at the page limit; older runs may be missed"
        );
        Ok(runs)
    }
}
