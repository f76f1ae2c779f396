//! Channel selection and fallback.
//!
//! An operation is attempted on the proxy channel configured for the current
//! run mode (if any), then on the direct channel. The first channel that
//! answers 2xx with a JSON body wins. When every channel fails the failures
//! are folded into a single [`ApiError`].

use std::fmt;

use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::operation::EncodedRequest;
use super::transport::{HttpRequest, Transport};
use crate::config::ClientConfig;
use crate::error::ApiError;

/// Upstream bodies kept in errors are cut to this many characters.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Which path a request took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Proxy,
    Direct,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proxy => f.write_str("proxy"),
            Self::Direct => f.write_str("direct"),
        }
    }
}

/// One way of reaching the platform.
#[derive(Debug, Clone)]
pub struct Channel {
    pub kind: ChannelKind,
    pub base_url: Url,
    /// Credentials added to every request on this channel.
    pub auth: Option<(String, SecretString)>,
}

impl Channel {
    /// Resolve an encoded request against this channel's base URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidRequest` if the base URL cannot take path
    /// segments (e.g. a `data:` URL).
    pub fn url_for(&self, request: &EncodedRequest) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                ApiError::InvalidRequest(format!("{} is not a base URL", self.base_url))
            })?;
            segments.pop_if_empty();
            segments.extend(&request.segments);
        }
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }
}

/// Why a single channel attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ChannelFailure {
    /// No response.
    Network(String),
    /// Non-2xx response.
    Status { status: u16, body: String },
    /// 2xx response whose body is not JSON.
    Malformed(String),
}

impl fmt::Display for ChannelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::Status { status, .. } => write!(f, "HTTP {status}"),
            Self::Malformed(message) => write!(f, "malformed body: {message}"),
        }
    }
}

/// The ordered channels an operation is attempted on.
#[derive(Debug, Clone)]
pub struct ChannelPlan {
    primary: Option<Channel>,
    direct: Channel,
}

impl ChannelPlan {
    /// Build the plan for the configured run mode.
    ///
    /// The proxy channel never carries credentials; the proxy injects them.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        let primary = config.proxy_for_mode().map(|url| Channel {
            kind: ChannelKind::Proxy,
            base_url: url.clone(),
            auth: None,
        });
        let direct = Channel {
            kind: ChannelKind::Direct,
            base_url: config.api_url.clone(),
            auth: config
                .api_key
                .clone()
                .map(|key| (config.api_key_header.clone(), key)),
        };
        Self { primary, direct }
    }

    /// Channels in the order they are attempted.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.primary.iter().chain(std::iter::once(&self.direct))
    }

    /// Send `request` on each channel in turn until one succeeds.
    ///
    /// # Errors
    ///
    /// Returns the synthesized failure when every channel fails.
    pub async fn execute(
        &self,
        transport: &dyn Transport,
        request: &EncodedRequest,
    ) -> Result<Value, ApiError> {
        let mut failures = Vec::new();

        for channel in self.channels() {
            match attempt(transport, channel, request).await? {
                Ok(value) => {
                    debug!(channel = %channel.kind, "Request succeeded");
                    return Ok(value);
                }
                Err(failure) => {
                    warn!(
                        channel = %channel.kind,
                        url = %channel.base_url,
                        error = %failure,
                        "Channel attempt failed"
                    );
                    failures.push(failure);
                }
            }
        }

        Err(synthesize(failures))
    }
}

/// Make one attempt. The outer error is for requests that cannot be built at
/// all; the inner one is a channel failure eligible for fallback.
async fn attempt(
    transport: &dyn Transport,
    channel: &Channel,
    request: &EncodedRequest,
) -> Result<Result<Value, ChannelFailure>, ApiError> {
    let url = channel.url_for(request)?;
    let http = HttpRequest {
        method: request.method.clone(),
        url,
        auth: channel.auth.clone(),
        body: request.body.clone(),
    };

    let response = match transport.send(http).await {
        Ok(response) => response,
        Err(e) => return Ok(Err(ChannelFailure::Network(e.0))),
    };

    if !response.is_success() {
        return Ok(Err(ChannelFailure::Status {
            status: response.status,
            body: truncate(&response.body),
        }));
    }

    Ok(serde_json::from_str(&response.body)
        .map_err(|e| ChannelFailure::Malformed(e.to_string())))
}

/// Fold per-channel failures into the error surfaced to the caller.
///
/// An upstream status beats a malformed body, which beats a network failure:
/// the most informative failure the platform actually produced wins.
fn synthesize(failures: Vec<ChannelFailure>) -> ApiError {
    let mut status = None;
    let mut malformed = None;
    let mut network = None;

    for failure in failures {
        match failure {
            ChannelFailure::Status { status: code, body } => status = Some((code, body)),
            ChannelFailure::Malformed(message) => malformed = Some(message),
            ChannelFailure::Network(message) => network = Some(message),
        }
    }

    if let Some((status, body)) = status {
        ApiError::Status { status, body }
    } else if let Some(message) = malformed {
        ApiError::UnexpectedShape(format!("response body is not JSON: {message}"))
    } else {
        ApiError::Network {
            message: network.unwrap_or_else(|| "no channel configured".to_string()),
        }
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_string()
    } else {
        let mut cut: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        cut.push_str("...");
        cut
    }
}
