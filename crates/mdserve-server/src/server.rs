//! HTTP server implementation.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use percent_encoding::percent_decode_str;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use mdserve_page::{
    is_document_path, PageError, PageRequest, PageResponse, Site, SiteIdentity,
    HTML_CONTENT_TYPE,
};

use crate::watcher::{FileWatcher, WatchEvent};

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Watch the document root and drop cached pages on change
    pub watch: bool,

    /// Header whose presence allows the remote content fallback
    pub remote_marker: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7777,
            watch: true,
            remote_marker: "x-remote-timestamp".to_string(),
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),
}

/// Shared server state.
struct ServerState {
    site: Arc<Site>,
    remote_marker: String,
}

/// Serves a site over HTTP.
pub struct MdServer {
    config: ServerConfig,
    site: Arc<Site>,
}

impl MdServer {
    pub fn new(config: ServerConfig, site: Arc<Site>) -> Self {
        Self { config, site }
    }

    /// Router handling every path: documents through the page pipeline,
    /// anything else as a static file from the root.
    pub fn router(&self) -> Router {
        let state = Arc::new(ServerState {
            site: Arc::clone(&self.site),
            remote_marker: self.config.remote_marker.to_ascii_lowercase(),
        });

        Router::new().fallback(page_handler).with_state(state)
    }

    /// Start the server.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|_| {
                ServerError::InvalidAddress(format!("{}:{}", self.config.host, self.config.port))
            })?;

        if self.config.watch {
            self.spawn_watcher()?;
        }

        let app = self.router();

        tracing::info!(
            "Serving {} at http://{}",
            self.site.root().display(),
            addr
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }

    fn spawn_watcher(&self) -> Result<(), ServerError> {
        let (watcher, mut rx) = FileWatcher::new(&[self.site.root().to_path_buf()])
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let site = Arc::clone(&self.site);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handle_watch_event(&site, &event);
            }
            // Keep watcher alive
            drop(watcher);
        });

        Ok(())
    }
}

/// Drop every cached page that depends on the changed path.
fn handle_watch_event(site: &Site, event: &WatchEvent) -> usize {
    let dropped = site.cache().invalidate_path(event.path());
    if dropped > 0 {
        tracing::info!(
            "{} changed, dropped {} cached page(s)",
            event.path().display(),
            dropped
        );
    }
    dropped
}

/// A pipeline error turned into an HTTP status.
#[derive(Debug)]
pub struct PageFailure(pub PageError);

impl IntoResponse for PageFailure {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PageError::NotFound(_) => StatusCode::NOT_FOUND,
            PageError::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("{}", self.0);
        } else {
            tracing::debug!("{}", self.0);
        }

        (status, status.canonical_reason().unwrap_or_default()).into_response()
    }
}

async fn page_handler(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<HashMap<String, String>>,
    req: Request,
) -> Response {
    let Ok(path) = percent_decode_str(req.uri().path()).decode_utf8() else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let path = path.into_owned();

    if !is_document_path(&path) {
        if state.site.is_private_path(&path) {
            return StatusCode::NOT_FOUND.into_response();
        }
        return serve_static(state.site.root(), req).await;
    }

    let site = request_site(&req);
    let request = PageRequest {
        remote_fallback: site.is_some() && req.headers().contains_key(state.remote_marker.as_str()),
        site,
        download: params.get("download").is_some_and(|v| !v.is_empty()),
        path,
    };

    let pipeline = Arc::clone(&state.site);
    match tokio::task::spawn_blocking(move || pipeline.respond(&request)).await {
        Ok(Ok(response)) => page_response(response),
        Ok(Err(e)) => PageFailure(e).into_response(),
        Err(e) => {
            tracing::error!("Render task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn serve_static(root: &Path, req: Request) -> Response {
    match ServeDir::new(root).oneshot(req).await {
        Ok(res) => res.into_response(),
        Err(never) => match never {},
    }
}

/// Site the request was addressed to, from the URI or the `Host` header.
fn request_site(req: &Request) -> Option<SiteIdentity> {
    let scheme = req.uri().scheme_str().unwrap_or("http");
    let authority = match req.uri().authority() {
        Some(authority) => authority.as_str(),
        None => req.headers().get(header::HOST)?.to_str().ok()?,
    };
    Some(SiteIdentity::new(scheme, authority))
}

fn page_response(response: PageResponse) -> Response {
    match response {
        PageResponse::Html(html) => ([(header::CONTENT_TYPE, HTML_CONTENT_TYPE)], html).into_response(),
        PageResponse::Download(download) => (
            [
                (header::CONTENT_TYPE, download.content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename={}", download.file_name),
                ),
            ],
            download.body,
        )
            .into_response(),
    }
}
