use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use lumera_booking::directory::GeoDirectory;
use lumera_booking::model::{LeadRequest, ScheduleRequest};
use lumera_cms::client::{ListOptions, ResolveOptions};
use lumera_core::page::{Listing, Page};

use crate::api::{ApiError, ApiResult};
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "Lumera Content Gateway",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// GET /api/cms/{schema}: the newest document of a schema. An empty
/// schema yields `{}` so callers never have to special-case missing content.
pub async fn latest_content(
    State(state): State<AppState>,
    Path(schema): Path<String>,
) -> ApiResult<Json<Value>> {
    let content = state.cms.latest(&schema).await?;
    Ok(Json(content.unwrap_or_else(|| json!({}))))
}

/// GET /api/cms/locations/by-external-id/{external_id}
pub async fn location_by_external_id(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> ApiResult<Json<Value>> {
    match state.cms.location_by_external_id(&external_id).await? {
        Some(item) => Ok(Json(item)),
        None => Err(ApiError::not_found(format!(
            "no location with external id '{external_id}'"
        ))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLocationsParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    /// Restrict the listing to locations known to the booking backend and
    /// overlay their geocoordinates.
    #[serde(default)]
    pub only_with_geo: bool,
    pub search: Option<String>,
}

/// GET /api/cms/locations
pub async fn list_locations(
    State(state): State<AppState>,
    Query(params): Query<ListLocationsParams>,
) -> ApiResult<Json<Listing>> {
    let mut opts = ListOptions {
        page: params.page,
        page_size: params.page_size,
        search: params.search,
        ..ListOptions::default()
    };

    if params.only_with_geo {
        let payload = state.cached_franchises().await?;
        let directory = GeoDirectory::from_franchises(&payload)?;
        opts.allowed_ids = Some(directory.allowed_ids);
        opts.geo = Some(directory.points);
    }

    Ok(Json(state.cms.list_locations(opts).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostsParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    pub search: Option<String>,
}

fn default_page() -> u32 {
    1
}
fn default_page_size() -> u32 {
    10
}

/// GET /api/cms/blog/posts
pub async fn blog_posts(
    State(state): State<AppState>,
    Query(params): Query<BlogPostsParams>,
) -> ApiResult<Json<Page>> {
    let page = state
        .cms
        .blog_posts(params.page, params.page_size, params.search.as_deref())
        .await?;
    Ok(Json(page))
}

/// GET /api/cms/blog/posts/{slug}
pub async fn blog_post_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Value>> {
    match state.cms.blog_post_by_slug(&slug).await? {
        Some(post) => Ok(Json(post)),
        None => Err(ApiError::not_found(format!("no blog post with slug '{slug}'"))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveParams {
    #[serde(default)]
    pub data_only: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveBody {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default = "default_true")]
    pub resolve_asset_urls: bool,
    #[serde(default = "default_true")]
    pub flatten: bool,
}

fn default_true() -> bool {
    true
}

/// POST /api/cms/{schema}/resolve: resolves an id set. An empty set is an
/// empty array, not an error.
pub async fn resolve_by_ids(
    State(state): State<AppState>,
    Path(schema): Path<String>,
    Query(params): Query<ResolveParams>,
    Json(body): Json<ResolveBody>,
) -> ApiResult<Json<Value>> {
    let items = state
        .cms
        .resolve_by_ids(
            &schema,
            &body.ids,
            ResolveOptions {
                resolve_asset_urls: body.resolve_asset_urls,
                flatten: body.flatten,
                data_only: params.data_only,
            },
        )
        .await?;
    Ok(Json(Value::Array(items)))
}

/// POST /api/cms/cache/clear: drops every cached response.
pub async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.cache.clear();
    StatusCode::NO_CONTENT
}

/// GET /api/franchises: booking passthrough.
pub async fn franchises(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(state.booking.franchises().await?))
}

/// POST /api/leads
pub async fn create_lead(
    State(state): State<AppState>,
    Json(lead): Json<LeadRequest>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.booking.create_lead(lead).await?))
}

/// GET /api/franchises/{franchise_id}/schedule/hours?date=dd/MM/yyyy
///
/// Every query parameter other than `date` is forwarded to the booking
/// backend verbatim.
pub async fn schedule_hours(
    State(state): State<AppState>,
    Path(franchise_id): Path<u32>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let date = params
        .get("date")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("query param 'date' is required (dd/MM/yyyy)"))?
        .to_string();

    let extras: Vec<(String, String)> = params
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case("date"))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    let hours = state
        .booking
        .schedule_hours(franchise_id, &date, &extras)
        .await?;
    Ok(Json(hours))
}

/// POST /api/franchises/{franchise_id}/schedule
pub async fn create_schedule(
    State(state): State<AppState>,
    Path(franchise_id): Path<u32>,
    Json(body): Json<ScheduleRequest>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.booking.create_schedule(franchise_id, body).await?))
}
