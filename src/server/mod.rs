//! HTTP server for the blog

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::content::ContentSource;
use crate::{Blog, BlogError};

/// Build the router for a blog. Blog routes live under `site.root`.
pub fn router<S: ContentSource>(blog: Arc<Blog<S>>) -> Router {
    let root = blog.config.root.trim_matches('/');
    let prefix = if root.is_empty() {
        String::new()
    } else {
        format!("/{}", root)
    };

    let mut app = Router::new()
        .route(&format!("{}/", prefix), get(index_handler::<S>))
        .route(&format!("{}/posts/:slug", prefix), get(post_handler::<S>))
        .route(
            &format!("{}/api/posts/:slug/metadata", prefix),
            get(metadata_handler::<S>),
        );
    if !prefix.is_empty() {
        app = app.route(&prefix, get(index_handler::<S>));
    }

    app.route("/healthz", get(health_handler))
        .fallback(not_found_handler::<S>)
        .layer(TraceLayer::new_for_http())
        .with_state(blog)
}

/// Start the server and run until Ctrl+C or SIGTERM
pub async fn start<S: ContentSource>(blog: Blog<S>, ip: &str, port: u16) -> Result<()> {
    let app = router(Arc::new(blog));

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Server running at http://{}:{}", ip, port);
    println!("Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn index_handler<S: ContentSource>(State(blog): State<Arc<Blog<S>>>) -> Response {
    match blog.render_index_page().await {
        Ok(html) => Html(html).into_response(),
        Err(e) => error_response(&blog, e),
    }
}

async fn post_handler<S: ContentSource>(
    State(blog): State<Arc<Blog<S>>>,
    Path(slug): Path<String>,
) -> Response {
    match blog.render_post_page(&slug).await {
        Ok(Some(html)) => Html(html).into_response(),
        Ok(None) => {
            tracing::debug!(%slug, "Post not found");
            not_found_response(&blog)
        }
        Err(e) => error_response(&blog, e),
    }
}

/// Head metadata for a slug. Unknown slugs still answer 200 with the
/// not-found pair so that callers can always fill a document head.
async fn metadata_handler<S: ContentSource>(
    State(blog): State<Arc<Blog<S>>>,
    Path(slug): Path<String>,
) -> Response {
    match blog.generate_metadata(&slug).await {
        Ok(meta) => Json(meta).into_response(),
        Err(e) => {
            tracing::error!(%slug, "Failed to load post metadata: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "internal server error" })),
            )
                .into_response()
        }
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn not_found_handler<S: ContentSource>(State(blog): State<Arc<Blog<S>>>) -> Response {
    not_found_response(&blog)
}

fn not_found_response<S: ContentSource>(blog: &Blog<S>) -> Response {
    match blog.render_not_found_page() {
        Ok(html) => (StatusCode::NOT_FOUND, Html(html)).into_response(),
        Err(e) => error_response(blog, e),
    }
}

/// Log a fault and answer with the generic error page
fn error_response<S: ContentSource>(blog: &Blog<S>, err: BlogError) -> Response {
    tracing::error!("Request failed: {}", err);
    match blog.render_error_page() {
        Ok(html) => (StatusCode::INTERNAL_SERVER_ERROR, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("Failed to render error page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}
