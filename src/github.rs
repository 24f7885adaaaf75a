use std::process::Command;

use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    error::Error,
    graphql::{
        self, CandidatePageData, DetailedStateData, GraphQLResponse, ViewerData,
        candidate_page_query, detailed_state_query, viewer_query,
    },
    types::{CandidateId, CandidatePage, DetailedState, Forge, ViewerInfo},
};

pub fn get_github_token() -> Result<String> {
    // Prefer environment variables over gh CLI to avoid subprocess overhead.
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var)
            && !token.trim().is_empty()
        {
            debug!(source = var, "Using token from environment");
            return Ok(token.trim().to_string());
        }
    }

    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .context("Failed to run 'gh auth token'")?;

    if !output.status.success() {
        anyhow::bail!("Failed to get GitHub token from gh CLI. Please run 'gh auth login' first");
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();

    if token.is_empty() {
        anyhow::bail!("Empty token returned from gh CLI");
    }

    Ok(token)
}

/// Creates an authenticated GitHub client using available credentials.
pub fn setup_github_client() -> Result<Octocrab> {
    let token = get_github_token().context("Failed to obtain GitHub authentication token")?;
    Octocrab::builder()
        .personal_token(token)
        .build()
        .context("Failed to create GitHub client")
}

/// [`Forge`] backed by GitHub's GraphQL API.
pub struct GitHub {
    client: Octocrab,
}

impl GitHub {
    pub fn new(client: Octocrab) -> Self {
        Self { client }
    }

    async fn execute<T>(&self, query: &serde_json::Value) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let response: GraphQLResponse<T> = self
            .client
            .graphql(query)
            .await
            .map_err(classify_octocrab_error)?;
        graphql::into_data(response)
    }
}

fn classify_octocrab_error(err: octocrab::Error) -> Error {
    match &err {
        octocrab::Error::GitHub { source, .. } => {
            classify_status(source.status_code.as_u16(), &source.message)
        }
        _ => Error::Transport(err.to_string()),
    }
}

/// A 401, or a 403 that is not a rate limit, means the credential was refused.
fn classify_status(status: u16, message: &str) -> Error {
    let rate_limited = message.to_lowercase().contains("rate limit");
    if status == 401 || (status == 403 && !rate_limited) {
        Error::AuthRejected(message.to_string())
    } else {
        Error::Transport(format!("HTTP {status}: {message}"))
    }
}

#[async_trait]
impl Forge for GitHub {
    async fn viewer_info(&self) -> Result<ViewerInfo> {
        let data: ViewerData = self
            .execute(&viewer_query())
            .await
            .context("Failed to look up the authenticated user")?;
        Ok(graphql::convert_viewer(data))
    }

    async fn fetch_candidate_page(&self, first: u32, after: Option<&str>) -> Result<CandidatePage> {
        debug!(first, after = ?after, "Requesting pull request page");
        let data: CandidatePageData = self
            .execute(&candidate_page_query(first, after))
            .await
            .context("Failed to fetch open pull requests")?;
        Ok(graphql::convert_candidate_page(data)?)
    }

    async fn fetch_detailed_state(&self, id: &CandidateId) -> Result<DetailedState> {
        let data: DetailedStateData = self
            .execute(&detailed_state_query(id))
            .await
            .with_context(|| format!("Failed to fetch merge state for {id}"))?;
        Ok(graphql::convert_detailed_state(id, data)?)
    }
}
