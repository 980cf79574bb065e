use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, label, products};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(products::router())
        .merge(label::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

// A handful of fallback ports in case the configured one is taken.
const PORT_RETRIES: u16 = 5;

async fn bind_with_fallback(host: &str, port: u16) -> anyhow::Result<tokio::net::TcpListener> {
    let mut last_err = None;
    for candidate in port..=port.saturating_add(PORT_RETRIES) {
        let addr: SocketAddr = format!("{}:{}", host, candidate).parse()?;
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                tracing::warn!(%addr, error = %e, "bind failed, trying next port");
                last_err = Some(e);
            }
        }
    }
    Err(anyhow::anyhow!(
        "no free port in {}..={}: {:?}",
        port,
        port.saturating_add(PORT_RETRIES),
        last_err
    ))
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = bind_with_fallback(host, port).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
