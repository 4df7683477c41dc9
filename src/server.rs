// src/server.rs
use crate::core::status::SharedStatus;
use anyhow::Result;
use hyper::service::{make_service_fn, service_fn};
use hyper::{header, Body, Method, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing::info;

/// Serves `/health` and `/status` on the container's `http` port until shutdown.
pub async fn serve(
    addr: SocketAddr,
    status: SharedStatus,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let make_svc = make_service_fn(move |_conn| {
        let status = status.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let status = status.clone();
                async move { Ok::<_, Infallible>(route(req, status).await) }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    info!("HTTP server listening on {}", addr);

    server
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

pub async fn route(req: Request<Body>, status: SharedStatus) -> Response<Body> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => text(StatusCode::OK, "ok"),
        (&Method::GET, "/status") => {
            let snapshot = status.read().await.clone();
            match serde_json::to_string_pretty(&snapshot) {
                Ok(body) => Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap_or_else(|_| text(StatusCode::INTERNAL_SERVER_ERROR, "error")),
                Err(_) => text(StatusCode::INTERNAL_SERVER_ERROR, "error"),
            }
        }
        _ => text(StatusCode::NOT_FOUND, "not found"),
    }
}

fn text(code: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = code;
    response
}
