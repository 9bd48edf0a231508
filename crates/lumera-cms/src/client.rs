//! Read-through client for the content backend.
//!
//! Every operation checks the shared [`ResponseCache`] first and populates
//! it on miss; the bearer token is only consulted inside the compute path,
//! so a cache hit performs no network traffic at all.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{StreamExt, TryStreamExt, stream};
use serde::Deserialize;
use serde_json::{Value, json};

use lumera_core::cache::{CacheKey, ResponseCache};
use lumera_core::error::{GatewayError, Result, UpstreamError};
use lumera_core::geo::GeoPoint;
use lumera_core::page::{Listing, Page};
use lumera_core::transport::{RetryPolicy, send_with_retry};

use crate::config::CmsConfig;
use crate::enrich::overlay_coordinates;
use crate::query::{EXTERNAL_ID_PATH, StructuredQuery, odata_eq, odata_in};
use crate::token::TokenManager;

const SERVICE: &str = "cms";

/// Paged envelope returned by the content backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ContentEnvelope {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub items: Vec<Value>,
}

/// Options for id-set resolution.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    pub resolve_asset_urls: bool,
    pub flatten: bool,
    /// Project each item down to its `data` document.
    pub data_only: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            resolve_asset_urls: true,
            flatten: true,
            data_only: false,
        }
    }
}

/// Parameters for the location listing.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    /// Restrict results to these external ids.
    pub allowed_ids: Option<BTreeSet<String>>,
    /// Geocoordinates to overlay, keyed by external id.
    pub geo: Option<HashMap<String, GeoPoint>>,
    pub search: Option<String>,
}

/// Client for the headless content backend.
pub struct CmsClient {
    http: reqwest::Client,
    config: CmsConfig,
    policy: RetryPolicy,
    tokens: TokenManager,
    cache: Arc<ResponseCache>,
}

impl CmsClient {
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// practice).
    pub fn new(config: CmsConfig, policy: RetryPolicy, cache: Arc<ResponseCache>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");
        let tokens = TokenManager::new(http.clone(), &config, policy.clone());
        Self {
            http,
            config,
            policy,
            tokens,
            cache,
        }
    }

    fn ttl(&self) -> Duration {
        self.config.cache_ttl
    }

    /// The most recently modified document of a schema, projected to its
    /// `data` payload. `None` when the schema holds no published content.
    pub async fn latest(&self, schema: &str) -> Result<Option<Value>> {
        let key = CacheKey::new("content.latest").push(schema).render();
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Some(hit));
        }

        let token = self.tokens.bearer_token().await?;
        let request = self
            .http
            .get(self.config.content_url(schema))
            .query(&[("$top", "1"), ("$orderby", "lastModified desc")])
            .bearer_auth(&token)
            .header("X-Flatten", "true")
            .header("X-Resolve-Urls", "*");
        let response = send_with_retry(SERVICE, &self.policy, request).await?;
        let envelope: ContentEnvelope = decode(response).await?;

        let Some(first) = envelope.items.into_iter().next() else {
            return Ok(None);
        };
        match first.get("data") {
            Some(data) => {
                self.cache.insert(key, data.clone(), self.ttl());
                Ok(Some(data.clone()))
            }
            None => Ok(None),
        }
    }

    /// Looks up a single location record by its external id. A 404 or an
    /// empty result is a first-class `None`, never an error.
    pub async fn location_by_external_id(&self, external_id: &str) -> Result<Option<Value>> {
        let key = CacheKey::new("location.byExternalId")
            .push(external_id)
            .render();
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Some(hit));
        }

        let token = self.tokens.bearer_token().await?;
        let filter = odata_eq(EXTERNAL_ID_PATH, external_id);
        let request = self
            .http
            .get(self.config.content_url(&self.config.location_schema))
            .query(&[("$filter", filter.as_str()), ("$top", "1")])
            .bearer_auth(&token)
            .header("X-Flatten", "true");

        let response = match send_with_retry(SERVICE, &self.policy, request).await {
            Ok(response) => response,
            Err(GatewayError::Upstream(err)) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        let envelope: ContentEnvelope = decode(response).await?;

        match envelope.items.into_iter().next() {
            Some(item) => {
                self.cache.insert(key, item.clone(), self.ttl());
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    /// Resolves an arbitrary id set against a schema.
    ///
    /// Ids are deduplicated (ordinal) before both the upstream call and the
    /// cache key, so the result is invariant under permutation and
    /// duplication of the input. An empty set short-circuits to an empty
    /// result without touching the cache or the network.
    pub async fn resolve_by_ids(
        &self,
        schema: &str,
        ids: &[String],
        opts: ResolveOptions,
    ) -> Result<Vec<Value>> {
        let ids = dedup_ordinal(ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let op = if opts.data_only {
            "content.resolve.data"
        } else {
            "content.resolve"
        };
        let key = CacheKey::new(op).push(schema).push_ids(&ids);

        let cached = self
            .cache
            .get_or_compute(&key, self.ttl(), || async move {
                let token = self.tokens.bearer_token().await?;
                let take = ids.len();
                let body = json!({ "ids": ids, "take": take });
                let mut request = self
                    .http
                    .post(format!("{}/query", self.config.content_url(schema)))
                    .bearer_auth(&token)
                    .json(&body);
                if opts.flatten {
                    request = request.header("X-Flatten", "true");
                }
                if opts.resolve_asset_urls {
                    request = request.header("X-Resolve-Urls", "*");
                }
                let response = send_with_retry(SERVICE, &self.policy, request).await?;
                let envelope: ContentEnvelope = decode(response).await?;
                let items = if opts.data_only {
                    envelope
                        .items
                        .into_iter()
                        .map(|item| item.get("data").cloned().unwrap_or_else(|| json!({})))
                        .collect()
                } else {
                    envelope.items
                };
                Ok(Value::Array(items))
            })
            .await?;
        Ok(into_array(cached))
    }

    /// Lists location records with optional pagination, free-text search,
    /// external-id allow-list and geo enrichment.
    pub async fn list_locations(&self, opts: ListOptions) -> Result<Listing> {
        match (opts.page, opts.page_size) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(GatewayError::validation(
                    "page and pageSize must be provided together, or not at all",
                ));
            }
            (Some(0), _) | (_, Some(0)) => {
                return Err(GatewayError::validation("page and pageSize must be > 0"));
            }
            _ => {}
        }

        let allowed = opts.allowed_ids.filter(|ids| !ids.is_empty());
        let search = opts
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        // With a search term, pagination is mandatory and the query runs
        // server-side with the allow-list folded into the filter.
        if let Some(search) = search {
            let page = opts.page.unwrap_or(1);
            let page_size = opts.page_size.unwrap_or(10);
            let skip = (page as u64 - 1) * page_size as u64;
            let envelope = self
                .fetch_query_page(skip, page_size, Some(search), allowed.as_ref())
                .await?;
            let items = overlay(envelope.items, &opts.geo);
            return Ok(Listing::Paged(Page::new(
                envelope.total,
                page,
                page_size,
                items,
            )));
        }

        // Allow-list without search: the upstream caps `in` filters, so the
        // whole set is resolved in chunks and paginated in memory.
        if let Some(allowed) = allowed {
            let all = self.fetch_by_external_ids(&allowed).await?;
            let all = overlay(all, &opts.geo);
            return Ok(match (opts.page, opts.page_size) {
                (Some(page), Some(page_size)) => {
                    let total = all.len() as u64;
                    let skip = (page as u64 - 1) * page_size as u64;
                    let items = all
                        .into_iter()
                        .skip(skip as usize)
                        .take(page_size as usize)
                        .collect();
                    Listing::Paged(Page::new(total, page, page_size, items))
                }
                _ => Listing::All(all),
            });
        }

        if let (Some(page), Some(page_size)) = (opts.page, opts.page_size) {
            let skip = (page as u64 - 1) * page_size as u64;
            let envelope = self.fetch_page(skip, page_size).await?;
            let items = overlay(envelope.items, &opts.geo);
            return Ok(Listing::Paged(Page::new(
                envelope.total,
                page,
                page_size,
                items,
            )));
        }

        let all = overlay(self.fetch_all().await?, &opts.geo);
        Ok(Listing::All(all))
    }

    /// A page of blog posts, items projected to their `data` documents.
    pub async fn blog_posts(
        &self,
        page: u32,
        page_size: u32,
        search: Option<&str>,
    ) -> Result<Page> {
        if page == 0 || page_size == 0 {
            return Err(GatewayError::validation("page and pageSize must be > 0"));
        }

        let key = CacheKey::new("blog.posts")
            .push(page)
            .push(page_size)
            .push_opt(search.map(str::trim).filter(|s| !s.is_empty()));
        let cached = self
            .cache
            .get_or_compute(&key, self.ttl(), || async move {
                let skip = (page as u64 - 1) * page_size as u64;
                let query = StructuredQuery::page(skip, page_size).with_full_text(search);
                let token = self.tokens.bearer_token().await?;
                let request = self
                    .http
                    .get(self.config.content_url(&self.config.blog_schema))
                    .query(&[("q", query.to_param())])
                    .bearer_auth(&token)
                    .header("X-Flatten", "true");
                let response = send_with_retry(SERVICE, &self.policy, request).await?;
                let envelope: ContentEnvelope = decode(response).await?;

                let items = envelope
                    .items
                    .into_iter()
                    .filter_map(|item| item.get("data").cloned())
                    .collect();
                let wrapped = Page::new(envelope.total, page, page_size, items);
                serde_json::to_value(&wrapped).map_err(|e| GatewayError::internal(e.to_string()))
            })
            .await?;
        serde_json::from_value(cached).map_err(|e| GatewayError::internal(e.to_string()))
    }

    /// Looks up a blog post by slug, projected to its `data` document.
    pub async fn blog_post_by_slug(&self, slug: &str) -> Result<Option<Value>> {
        let key = CacheKey::new("blog.slug").push(slug).render();
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Some(hit));
        }

        let token = self.tokens.bearer_token().await?;
        let filter = odata_eq("data/slug/iv", slug);
        let request = self
            .http
            .get(self.config.content_url(&self.config.blog_schema))
            .query(&[("$filter", filter.as_str()), ("$top", "1")])
            .bearer_auth(&token)
            .header("X-Flatten", "true");

        let response = match send_with_retry(SERVICE, &self.policy, request).await {
            Ok(response) => response,
            Err(GatewayError::Upstream(err)) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        let envelope: ContentEnvelope = decode(response).await?;

        match envelope.items.into_iter().next().and_then(|item| item.get("data").cloned()) {
            Some(data) => {
                self.cache.insert(key, data.clone(), self.ttl());
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// One `$top`/`$skip` page of the location schema, cached by skip/take.
    async fn fetch_page(&self, skip: u64, top: u32) -> Result<ContentEnvelope> {
        let key = CacheKey::new("location.page").push(skip).push(top);
        let cached = self
            .cache
            .get_or_compute(&key, self.ttl(), || async move {
                let token = self.tokens.bearer_token().await?;
                let request = self
                    .http
                    .get(self.config.content_url(&self.config.location_schema))
                    .query(&[("$top", top.to_string()), ("$skip", skip.to_string())])
                    .bearer_auth(&token)
                    .header("X-Flatten", "true");
                let response = send_with_retry(SERVICE, &self.policy, request).await?;
                response
                    .json()
                    .await
                    .map_err(|e| UpstreamError::payload(SERVICE, e.to_string()).into())
            })
            .await?;
        serde_json::from_value(cached)
            .map_err(|e| UpstreamError::payload(SERVICE, e.to_string()).into())
    }

    /// One structured-query page (search and/or id filter), cached by the
    /// full parameter set.
    async fn fetch_query_page(
        &self,
        skip: u64,
        take: u32,
        full_text: Option<&str>,
        allowed_ids: Option<&BTreeSet<String>>,
    ) -> Result<ContentEnvelope> {
        let mut key = CacheKey::new("location.query")
            .push(skip)
            .push(take)
            .push_opt(full_text);
        key = match allowed_ids {
            Some(ids) => key.push_ids(ids),
            None => key.push_opt(None::<&str>),
        };

        let cached = self
            .cache
            .get_or_compute(&key, self.ttl(), || async move {
                let query = StructuredQuery::page(skip, take)
                    .with_full_text(full_text)
                    .with_id_allow_list(allowed_ids);
                let token = self.tokens.bearer_token().await?;
                let request = self
                    .http
                    .get(self.config.content_url(&self.config.location_schema))
                    .query(&[("q", query.to_param())])
                    .bearer_auth(&token)
                    .header("X-Flatten", "true")
                    .header("X-Resolve-Urls", "*");
                let response = send_with_retry(SERVICE, &self.policy, request).await?;
                response
                    .json()
                    .await
                    .map_err(|e| UpstreamError::payload(SERVICE, e.to_string()).into())
            })
            .await?;
        serde_json::from_value(cached)
            .map_err(|e| UpstreamError::payload(SERVICE, e.to_string()).into())
    }

    /// Fetches every location record: one page to learn the total, then the
    /// remaining pages concurrently. Pages are reassembled in skip order
    /// regardless of completion order.
    async fn fetch_all(&self) -> Result<Vec<Value>> {
        let top = self.config.full_page_size;
        let first = self.fetch_page(0, top).await?;
        let total_pages = first.total.div_ceil(top as u64);
        let mut items = first.items;

        if total_pages > 1 {
            tracing::debug!(total = first.total, total_pages, "fanning out page fetches");
            let pages: Vec<ContentEnvelope> =
                stream::iter((1..total_pages).map(|page| self.fetch_page(page * top as u64, top)))
                    .buffered(self.config.fan_out)
                    .try_collect()
                    .await?;
            for page in pages {
                items.extend(page.items);
            }
        }
        Ok(items)
    }

    /// Resolves an external-id set in bounded chunks, one upstream call per
    /// chunk, executed concurrently and concatenated in chunk order. Each
    /// chunk is cached under its own sorted id list.
    async fn fetch_by_external_ids(&self, ids: &BTreeSet<String>) -> Result<Vec<Value>> {
        let sorted: Vec<String> = ids.iter().cloned().collect();
        let chunks: Vec<Vec<String>> = sorted
            .chunks(self.config.chunk_size.max(1))
            .map(<[String]>::to_vec)
            .collect();

        let results: Vec<Vec<Value>> =
            stream::iter(chunks.into_iter().map(|chunk| self.fetch_chunk(chunk)))
                .buffered(self.config.fan_out)
                .try_collect()
                .await?;
        Ok(results.into_iter().flatten().collect())
    }

    async fn fetch_chunk(&self, chunk: Vec<String>) -> Result<Vec<Value>> {
        let key = CacheKey::new("location.chunk").push_ids(&chunk);
        let cached = self
            .cache
            .get_or_compute(&key, self.ttl(), || async move {
                let token = self.tokens.bearer_token().await?;
                let filter = odata_in(EXTERNAL_ID_PATH, &chunk);
                let request = self
                    .http
                    .get(self.config.content_url(&self.config.location_schema))
                    .query(&[("$filter", filter.as_str()), ("$top", "200")])
                    .bearer_auth(&token)
                    .header("X-Flatten", "true");
                let response = send_with_retry(SERVICE, &self.policy, request).await?;
                let envelope: ContentEnvelope = decode(response).await?;
                Ok(Value::Array(envelope.items))
            })
            .await?;
        Ok(into_array(cached))
    }
}

impl std::fmt::Debug for CmsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmsClient")
            .field("base_url", &self.config.base_url)
            .field("app_name", &self.config.app_name)
            .finish_non_exhaustive()
    }
}

async fn decode(response: reqwest::Response) -> Result<ContentEnvelope> {
    response
        .json()
        .await
        .map_err(|e| UpstreamError::payload(SERVICE, e.to_string()).into())
}

/// Drops blank ids and ordinal duplicates, preserving first-seen order.
fn dedup_ordinal(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| !id.trim().is_empty())
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

fn into_array(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

fn overlay(items: Vec<Value>, geo: &Option<HashMap<String, GeoPoint>>) -> Vec<Value> {
    match geo {
        Some(map) if !map.is_empty() => overlay_coordinates(items, map),
        _ => items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> CmsClient {
        let config = CmsConfig::new("http://cms.invalid", "app", "id", "secret");
        CmsClient::new(config, RetryPolicy::default(), Arc::new(ResponseCache::new()))
    }

    #[test]
    fn dedup_preserves_first_seen_order() {
        let ids = vec![
            "b".to_string(),
            "a".to_string(),
            "".to_string(),
            "b".to_string(),
            "  ".to_string(),
            "A".to_string(),
        ];
        // Ordinal comparison: "a" and "A" are distinct.
        assert_eq!(dedup_ordinal(&ids), vec!["b", "a", "A"]);
    }

    #[tokio::test]
    async fn mismatched_pagination_is_rejected_before_any_network_call() {
        let err = client()
            .list_locations(ListOptions {
                page: Some(1),
                ..ListOptions::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[tokio::test]
    async fn zero_page_is_rejected() {
        let err = client()
            .list_locations(ListOptions {
                page: Some(0),
                page_size: Some(10),
                ..ListOptions::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));

        let err = client().blog_posts(1, 0, None).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[tokio::test]
    async fn empty_id_set_short_circuits() {
        let items = client()
            .resolve_by_ids("location", &[], ResolveOptions::default())
            .await
            .unwrap();
        assert!(items.is_empty());

        let items = client()
            .resolve_by_ids(
                "location",
                &["".to_string(), "   ".to_string()],
                ResolveOptions::default(),
            )
            .await
            .unwrap();
        assert!(items.is_empty());
    }
}
