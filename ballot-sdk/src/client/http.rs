use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::{
    BallotChoice, CastVoteRequest, CastVoteResponse, HealthResponse, StatsResponse,
    StoredVoteResponse,
};

/// Typed HTTP client for the ballot server API.
#[derive(Debug, Clone)]
pub struct BallotClient {
    http: Client,
    base_url: Url,
}

impl BallotClient {
    /// Create a new `BallotClient` rooted at `base_url`
    /// (e.g. `http://localhost:8080`).
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /api/vote` – queue a vote.
    ///
    /// Pass the `voter_id` returned by a previous call to change that
    /// voter's choice instead of casting a new vote.
    pub async fn cast_vote(
        &self,
        vote: BallotChoice,
        voter_id: Option<&str>,
    ) -> Result<CastVoteResponse, ClientError> {
        let url = self.base_url.join("/api/vote")?;
        let body = CastVoteRequest {
            vote: vote.as_str().to_owned(),
            voter_id: voter_id.map(Into::into),
        };

        let resp = self.http.post(url).json(&body).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/vote/{voter_id}` – the vote currently stored for a voter.
    ///
    /// Returns `Ok(None)` if the voter has no applied vote yet (it may still
    /// be waiting in the queue).
    pub async fn get_vote(&self, voter_id: &str) -> Result<Option<StoredVoteResponse>, ClientError> {
        let mut url = self.base_url.join("/api/vote/")?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push(voter_id);
        let resp = self.http.get(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse_response(resp).await.map(Some)
    }

    /// `GET /api/stats` – current tally straight from the store.
    pub async fn stats(&self) -> Result<StatsResponse, ClientError> {
        let url = self.base_url.join("/api/stats")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/health`
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let url = self.base_url.join("/api/health")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
