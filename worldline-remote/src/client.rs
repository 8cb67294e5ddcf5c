//! Remote query surface: the [`RemoteQuery`] trait and its HTTP implementation.
//!
//! The coordinator only depends on the trait, so tests drive it with an
//! in-memory fake. [`fetch_hydrate`] and [`fetch_poll`] issue the
//! per-pass requests concurrently and fail as a whole if any one fails.

use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use worldline_core::types::{
    AgentId, AgentProfile, AgentStatePatch, ConfigPatch, FeedPost, GroupProfile,
    InterventionRecord, LogLine, TimelineEvent,
};

use crate::error::RemoteError;
use crate::types::{
    GroupsResponse, InterventionRequest, RemoteBatch, RemoteWorldState, StatePatch, Windows,
};

/// Result alias for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Operations the remote authority exposes.
///
/// Window queries return the newest `limit` items, newest first.
pub trait RemoteQuery: Send + Sync {
    /// `GET /api/agents`.
    fn list_agents(&self) -> impl Future<Output = RemoteResult<Vec<AgentProfile>>> + Send;
    /// `GET /api/state`.
    fn get_state(&self) -> impl Future<Output = RemoteResult<RemoteWorldState>> + Send;
    /// `GET /api/groups`.
    fn list_groups(&self) -> impl Future<Output = RemoteResult<Vec<GroupProfile>>> + Send;
    /// `GET /api/feed?limit=`.
    fn list_feed(&self, limit: usize) -> impl Future<Output = RemoteResult<Vec<FeedPost>>> + Send;
    /// `GET /api/events?limit=`.
    fn list_events(&self, limit: usize)
    -> impl Future<Output = RemoteResult<Vec<TimelineEvent>>> + Send;
    /// `GET /api/logs?limit=`.
    fn list_logs(&self, limit: usize) -> impl Future<Output = RemoteResult<Vec<LogLine>>> + Send;
    /// `GET /api/interventions?limit=`.
    fn list_interventions(
        &self,
        limit: usize,
    ) -> impl Future<Output = RemoteResult<Vec<InterventionRecord>>> + Send;
    /// `POST /api/intervention`. A refusal is [`RemoteError::Rejected`].
    fn apply_intervention(
        &self,
        request: InterventionRequest,
    ) -> impl Future<Output = RemoteResult<InterventionRecord>> + Send;
    /// `PATCH /api/state`.
    fn patch_state(&self, patch: StatePatch) -> impl Future<Output = RemoteResult<()>> + Send;
    /// `PATCH /api/config`.
    fn patch_config(&self, patch: ConfigPatch) -> impl Future<Output = RemoteResult<()>> + Send;
    /// `PATCH /api/agents/{id}/state`.
    fn patch_agent_state(
        &self,
        agent_id: AgentId,
        patch: AgentStatePatch,
    ) -> impl Future<Output = RemoteResult<()>> + Send;
}

/// Fetch everything hydration needs, concurrently.
///
/// # Errors
/// Returns the first error any request produced.
pub async fn fetch_hydrate<R: RemoteQuery>(remote: &R, windows: Windows) -> RemoteResult<RemoteBatch> {
    let (agents, mut state, groups, interventions, feed, events, logs) = futures::try_join!(
        remote.list_agents(),
        remote.get_state(),
        remote.list_groups(),
        remote.list_interventions(windows.interventions),
        remote.list_feed(windows.feed),
        remote.list_events(windows.events),
        remote.list_logs(windows.logs),
    )?;
    if state.groups.is_empty() {
        state.groups = groups.into_iter().map(|g| (g.key.clone(), g)).collect();
    }
    Ok(RemoteBatch { state, agents, interventions, feed, events, logs })
}

/// Fetch the bounded windows plus the current tick, concurrently.
///
/// # Errors
/// Returns the first error any request produced.
pub async fn fetch_poll<R: RemoteQuery>(remote: &R, windows: Windows) -> RemoteResult<RemoteBatch> {
    let (state, interventions, feed, events, logs) = futures::try_join!(
        remote.get_state(),
        remote.list_interventions(windows.interventions),
        remote.list_feed(windows.feed),
        remote.list_events(windows.events),
        remote.list_logs(windows.logs),
    )?;
    Ok(RemoteBatch { state, agents: Vec::new(), interventions, feed, events, logs })
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// [`RemoteQuery`] over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base_url: String,
    http: Client,
    timeout_ms: u64,
}

impl HttpRemote {
    /// Create a client for `base_url` with a per-request timeout.
    ///
    /// # Errors
    /// Returns [`RemoteError::RequestFailed`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> RemoteResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| RemoteError::RequestFailed(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            timeout_ms,
        })
    }

    /// Build from the `[remote]` config section. `None` in local mode.
    ///
    /// # Errors
    /// See [`HttpRemote::new`].
    pub fn from_config(config: &worldline_core::config::RemoteConfig) -> RemoteResult<Option<Self>> {
        config
            .base_url
            .as_deref()
            .map(|url| Self::new(url, config.request_timeout_ms))
            .transpose()
    }

    /// The authority's base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{path}", self.base_url))
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> RemoteResult<reqwest::Response> {
        let start = Instant::now();
        let resp = builder.send().await.map_err(|e| match RemoteError::from(e) {
            RemoteError::Timeout(_) => RemoteError::Timeout(self.timeout_ms),
            other => other,
        })?;
        let status = resp.status();
        debug!(
            path,
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Remote call"
        );
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        warn!(path, status = status.as_u16(), body = %body, "Remote returned error");
        Err(RemoteError::Status { status: status.as_u16(), body })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, limit: Option<usize>) -> RemoteResult<T> {
        let mut builder = self.request(Method::GET, path);
        if let Some(limit) = limit {
            builder = builder.query(&[("limit", limit)]);
        }
        let resp = self.send(builder, path).await?;
        resp.json().await.map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn send_json<B: Serialize + Sync>(&self, method: Method, path: &str, body: &B) -> RemoteResult<reqwest::Response> {
        let builder = self.request(method, path).json(body);
        self.send(builder, path).await
    }
}

impl RemoteQuery for HttpRemote {
    async fn list_agents(&self) -> RemoteResult<Vec<AgentProfile>> {
        self.get_json("/api/agents", None).await
    }

    async fn get_state(&self) -> RemoteResult<RemoteWorldState> {
        self.get_json("/api/state", None).await
    }

    async fn list_groups(&self) -> RemoteResult<Vec<GroupProfile>> {
        let body: GroupsResponse = self.get_json("/api/groups", None).await?;
        Ok(body.groups)
    }

    async fn list_feed(&self, limit: usize) -> RemoteResult<Vec<FeedPost>> {
        self.get_json("/api/feed", Some(limit)).await
    }

    async fn list_events(&self, limit: usize) -> RemoteResult<Vec<TimelineEvent>> {
        self.get_json("/api/events", Some(limit)).await
    }

    async fn list_logs(&self, limit: usize) -> RemoteResult<Vec<LogLine>> {
        self.get_json("/api/logs", Some(limit)).await
    }

    async fn list_interventions(&self, limit: usize) -> RemoteResult<Vec<InterventionRecord>> {
        self.get_json("/api/interventions", Some(limit)).await
    }

    async fn apply_intervention(&self, request: InterventionRequest) -> RemoteResult<InterventionRecord> {
        let resp = match self.send_json(Method::POST, "/api/intervention", &request).await {
            Err(RemoteError::Status { status, body }) if (400..500).contains(&status) => {
                return Err(RemoteError::Rejected(body));
            }
            other => other?,
        };
        resp.json().await.map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn patch_state(&self, patch: StatePatch) -> RemoteResult<()> {
        self.send_json(Method::PATCH, "/api/state", &patch).await.map(drop)
    }

    async fn patch_config(&self, patch: ConfigPatch) -> RemoteResult<()> {
        self.send_json(Method::PATCH, "/api/config", &patch).await.map(drop)
    }

    async fn patch_agent_state(&self, agent_id: AgentId, patch: AgentStatePatch) -> RemoteResult<()> {
        let path = format!("/api/agents/{agent_id}/state");
        self.send_json(Method::PATCH, &path, &patch).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldline_core::config::RemoteConfig;

    #[test]
    fn base_url_is_normalized() {
        let remote = HttpRemote::new("http://localhost:8000/", 1000).expect("client");
        assert_eq!(remote.base_url(), "http://localhost:8000");
    }

    #[test]
    fn local_mode_has_no_client() {
        let config = RemoteConfig::default();
        assert!(HttpRemote::from_config(&config).expect("ok").is_none());
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error() {
        // Port 9 (discard) on localhost is almost never listening.
        let remote = HttpRemote::new("http://127.0.0.1:9", 500).expect("client");
        let err = remote.get_state().await.expect_err("nothing listens there");
        assert!(matches!(
            err,
            RemoteError::Unavailable(_) | RemoteError::Timeout(_) | RemoteError::RequestFailed(_)
        ));
    }
}
