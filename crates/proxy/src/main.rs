//! Market Lane proxy binary.
//!
//! Serves the forwarding proxy on port 8787 by default. See
//! [`market_lane_proxy::config`] for the environment it reads.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use market_lane_proxy::{AppState, ProxyConfig};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry for the proxy and return the guard that must be kept alive.
///
/// Events never carry the injected platform key: the configured auth header
/// is stripped from captured request data before sending.
fn init_sentry(config: &ProxyConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;
    let auth_header = config.upstream.auth_header.as_str().to_owned();

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            server_name: Some("market-lane-proxy".into()),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            before_send: Some(Arc::new(move |event| {
                Some(scrub_auth_header(event, &auth_header))
            })),
            ..Default::default()
        },
    ));

    tracing::info!(
        sample_rate = config.sentry_sample_rate,
        traces_sample_rate = config.sentry_traces_sample_rate,
        "Sentry initialized for proxy"
    );
    Some(guard)
}

/// Drop `auth_header` from the request data attached to an event.
fn scrub_auth_header(
    mut event: sentry::protocol::Event<'static>,
    auth_header: &str,
) -> sentry::protocol::Event<'static> {
    if let Some(request) = event.request.as_mut() {
        request
            .headers
            .retain(|name, _| !name.eq_ignore_ascii_case(auth_header));
    }
    event
}

/// Errors become Sentry events; warnings and request logs become breadcrumbs.
///
/// Debug output (per-request `tower_http` detail) stays out of Sentry.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let config = ProxyConfig::from_env().expect("Failed to load configuration");

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "market_lane_proxy=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    tracing::info!(
        upstream = %config.upstream.base_url,
        webhook = config.upstream.webhook_url.is_some(),
        "Forwarding configured"
    );

    let app = market_lane_proxy::app(AppState::new(config.upstream.clone()))
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!(%addr, "Proxy listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Resolve on Ctrl+C or SIGTERM so in-flight forwards can drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        () = ctrl_c => "ctrl-c",
        () = terminate => "SIGTERM",
    };

    tracing::info!(signal, "Proxy shutting down, draining in-flight forwards");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scrub_removes_only_the_auth_header() {
        let mut request = sentry::protocol::Request::default();
        request
            .headers
            .insert("X-Api-Key".to_string(), "pk_live_secret".to_string());
        request
            .headers
            .insert("content-type".to_string(), "application/json".to_string());
        let event = sentry::protocol::Event {
            request: Some(request),
            ..Default::default()
        };

        let scrubbed = scrub_auth_header(event, "x-api-key");
        let headers = scrubbed.request.unwrap().headers;
        assert!(!headers.contains_key("X-Api-Key"));
        assert_eq!(headers.get("content-type").map(String::as_str), Some("application/json"));
    }

    #[test]
    fn test_scrub_without_request_is_noop() {
        let event = sentry::protocol::Event::default();
        assert!(scrub_auth_header(event, "x-api-key").request.is_none());
    }
}
