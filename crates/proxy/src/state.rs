//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::UpstreamConfig;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; holds the upstream settings and one pooled
/// HTTP client.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    upstream: UpstreamConfig,
    client: reqwest::Client,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(upstream: UpstreamConfig) -> Self {
        Self::with_client(upstream, reqwest::Client::new())
    }

    /// Create a new application state around an existing client.
    #[must_use]
    pub fn with_client(upstream: UpstreamConfig, client: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(AppStateInner { upstream, client }),
        }
    }

    /// Get a reference to the upstream configuration.
    #[must_use]
    pub fn upstream(&self) -> &UpstreamConfig {
        &self.inner.upstream
    }

    /// Get a reference to the HTTP client.
    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.inner.client
    }
}
