// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BALLOT - SNAPSHOT INDEX CLIENT
//
// POST {"query", "variables"} → {"data": {...}}
//
// Transport failures and non-2xx statuses are retried with the identical
// request after a fixed backoff. With no attempt cap this never gives up; the
// process has to be stopped from outside. Envelope problems are not retried.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::queries;
use ballot_core::config::PipelineConfig;
use ballot_core::{BallotError, Proposal, RemoteIndex, Result, SpaceId, Vote};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

/// Per-request timeout; a hung connection counts as a transient failure
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Duration,
    /// `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_millis(500),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            backoff: Duration::from_millis(config.retry_backoff_ms),
            max_attempts: config.retry_max_attempts,
        }
    }

    fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

/// Split a response body into its `data` object.
///
/// A body carrying `errors` next to usable `data` is accepted (and logged);
/// `errors` without `data`, or no `data` at all, is malformed.
pub fn decode_envelope(body: &str) -> Result<Value> {
    let mut envelope: Map<String, Value> = serde_json::from_str(body)
        .map_err(|e| BallotError::malformed(format!("response is not a JSON object: {}", e)))?;

    let data = envelope.remove("data").filter(|d| !d.is_null());
    match (data, envelope.get("errors")) {
        (Some(data), errors) => {
            if let Some(errors) = errors {
                warn!("Remote index returned partial data with errors: {}", errors);
            }
            Ok(data)
        }
        (None, Some(errors)) => Err(BallotError::malformed(format!("GraphQL errors: {}", errors))),
        (None, None) => Err(BallotError::malformed("response has no `data` member")),
    }
}

/// Take `key` out of a decoded `data` object
fn take_field<T: DeserializeOwned>(data: &mut Value, key: &str) -> Result<T> {
    let value = data
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| BallotError::malformed(format!("missing field `{}`", key)))?;
    serde_json::from_value(value).map_err(|e| BallotError::malformed(format!("field `{}`: {}", key, e)))
}

#[derive(Deserialize)]
struct FollowRow {
    space: SpaceKey,
}

#[derive(Deserialize)]
struct SpaceKey {
    id: SpaceId,
}

pub struct SnapshotClient {
    endpoint: String,
    http: reqwest::blocking::Client,
    retry: RetryPolicy,
}

impl SnapshotClient {
    pub fn new<S: Into<String>>(endpoint: S, retry: RetryPolicy) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("ballot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BallotError::config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self::with_http(endpoint, retry, http))
    }

    /// Use a preconfigured HTTP client (proxies, TLS roots, timeouts)
    pub fn with_http<S: Into<String>>(
        endpoint: S,
        retry: RetryPolicy,
        http: reqwest::blocking::Client,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            http,
            retry,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(config.endpoint.clone(), RetryPolicy::from_config(config))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// One POST; `Err` carries a description of a transient failure
    fn post_once(&self, body: &Value) -> std::result::Result<String, String> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(body)
            .send()
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }
        response
            .text()
            .map_err(|e| format!("reading body failed: {}", e))
    }

    /// Run a query document, retrying transient failures, and return `data`
    pub fn query(&self, document: &str, variables: Value) -> Result<Value> {
        let body = json!({ "query": document, "variables": variables });
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.post_once(&body) {
                Ok(text) => {
                    debug!("Remote index answered after {} attempt(s)", attempts);
                    return decode_envelope(&text);
                }
                Err(last_error) if self.retry.exhausted(attempts) => {
                    return Err(BallotError::RemoteUnavailable {
                        attempts,
                        last_error,
                    });
                }
                Err(e) => {
                    warn!(
                        "Remote index attempt {} failed: {}; retrying in {:?}",
                        attempts, e, self.retry.backoff
                    );
                    thread::sleep(self.retry.backoff);
                }
            }
        }
    }
}

impl RemoteIndex for SnapshotClient {
    fn followed_spaces(&self, wallet: &str, limit: usize) -> Result<BTreeSet<SpaceId>> {
        let mut data = self.query(
            queries::FOLLOWED_SPACES,
            json!({ "wallet": wallet, "first": limit }),
        )?;
        let rows: Vec<FollowRow> = take_field(&mut data, "follows")?;
        Ok(rows.into_iter().map(|row| row.space.id).collect())
    }

    fn active_proposals(&self, spaces: &BTreeSet<SpaceId>, limit: usize) -> Result<Vec<Proposal>> {
        // an empty space_in is treated as "no filter" by the hub
        if spaces.is_empty() {
            return Ok(Vec::new());
        }
        let mut data = self.query(
            queries::ACTIVE_PROPOSALS,
            json!({ "spaces": spaces, "first": limit }),
        )?;
        take_field(&mut data, "proposals")
    }

    fn proposal(&self, id: &str) -> Result<Proposal> {
        let mut data = self.query(queries::PROPOSAL, json!({ "id": id }))?;
        let proposal: Option<Proposal> = take_field(&mut data, "proposal")?;
        proposal.ok_or_else(|| BallotError::not_found(format!("proposal {}", id)))
    }

    fn votes(&self, proposal_id: &str, limit: usize) -> Result<Vec<Vote>> {
        let mut data = self.query(
            queries::VOTES,
            json!({ "proposal": proposal_id, "first": limit }),
        )?;
        take_field(&mut data, "votes")
    }

    fn has_voted(&self, proposal_id: &str, wallet: &str) -> Result<bool> {
        let mut data = self.query(
            queries::HAS_VOTED,
            json!({ "proposal": proposal_id, "voter": wallet }),
        )?;
        let rows: Vec<Value> = take_field(&mut data, "votes")?;
        Ok(!rows.is_empty())
    }

    fn closed_proposals(&self, space: &str, limit: usize) -> Result<Vec<Proposal>> {
        let mut data = self.query(
            queries::CLOSED_PROPOSALS,
            json!({ "space": space, "first": limit }),
        )?;
        take_field(&mut data, "proposals")
    }
}
