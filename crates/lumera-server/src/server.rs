use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use lumera_booking::client::BookingClient;
use lumera_cms::client::CmsClient;
use lumera_core::cache::{CacheKey, ResponseCache};
use lumera_core::error::Result;

use crate::{config::AppConfig, handlers, middleware as app_middleware};

/// Shared state handed to every handler: the two upstream clients and the
/// response cache they populate.
#[derive(Clone)]
pub struct AppState {
    pub cms: Arc<CmsClient>,
    pub booking: Arc<BookingClient>,
    pub cache: Arc<ResponseCache>,
    pub franchises_ttl: Duration,
}

impl AppState {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let cache = Arc::new(ResponseCache::new());
        let cms = Arc::new(CmsClient::new(
            cfg.cms.to_cms_config(),
            cfg.cms.retry_policy(),
            Arc::clone(&cache),
        ));
        let booking = Arc::new(BookingClient::new(
            cfg.booking.to_booking_config(),
            cfg.booking.retry_policy(),
        ));
        Self {
            cms,
            booking,
            cache,
            franchises_ttl: cfg.booking.franchises_cache_ttl(),
        }
    }

    /// The raw franchise listing, read through the shared cache. The geo
    /// directory derived from it is rebuilt per request and never cached.
    pub async fn cached_franchises(&self) -> Result<Value> {
        let key = CacheKey::new("booking.franchises");
        self.cache
            .get_or_compute(&key, self.franchises_ttl, || async move {
                self.booking.franchises().await
            })
            .await
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        // Content endpoints
        .route("/api/cms/locations", get(handlers::list_locations))
        .route(
            "/api/cms/locations/by-external-id/{external_id}",
            get(handlers::location_by_external_id),
        )
        .route("/api/cms/blog/posts", get(handlers::blog_posts))
        .route("/api/cms/blog/posts/{slug}", get(handlers::blog_post_by_slug))
        .route("/api/cms/cache/clear", post(handlers::clear_cache))
        .route("/api/cms/{schema}", get(handlers::latest_content))
        .route("/api/cms/{schema}/resolve", post(handlers::resolve_by_ids))
        // Booking endpoints
        .route("/api/franchises", get(handlers::franchises))
        .route(
            "/api/franchises/{franchise_id}/schedule/hours",
            get(handlers::schedule_hours),
        )
        .route(
            "/api/franchises/{franchise_id}/schedule",
            post(handlers::create_schedule),
        )
        .route("/api/leads", post(handlers::create_lead))
        // Middleware stack
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct GatewayServer {
    addr: SocketAddr,
    app: Router,
}

impl GatewayServer {
    pub fn new(cfg: &AppConfig) -> Self {
        Self {
            addr: cfg.addr(),
            app: build_app(AppState::from_config(cfg)),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %self.addr, "gateway listening");
        axum::serve(listener, self.app).await?;
        Ok(())
    }
}
