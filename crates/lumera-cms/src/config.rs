use std::time::Duration;

/// Settings for the content-backend integration.
#[derive(Debug, Clone)]
pub struct CmsConfig {
    /// Base URL of the content backend, without a trailing slash.
    pub base_url: String,
    /// Application name used in content paths.
    pub app_name: String,
    pub client_id: String,
    pub client_secret: String,
    /// OAuth scope requested during the client-credentials exchange.
    pub scope: String,
    /// Schema holding location records.
    pub location_schema: String,
    /// Schema holding blog posts.
    pub blog_schema: String,
    /// Lifetime of a cached bearer token.
    pub token_ttl: Duration,
    /// TTL for every cached content response.
    pub cache_ttl: Duration,
    /// Page size used when fetching the full location set.
    pub full_page_size: u32,
    /// Maximum ids per upstream call when resolving by external id.
    pub chunk_size: usize,
    /// Concurrency bound for page and chunk fan-out.
    pub fan_out: usize,
}

impl CmsConfig {
    pub fn new(
        base_url: impl Into<String>,
        app_name: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: trim_trailing_slash(base_url.into()),
            app_name: app_name.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: "squidex-api".to_string(),
            location_schema: "location".to_string(),
            blog_schema: "blog".to_string(),
            token_ttl: Duration::from_secs(3600),
            cache_ttl: Duration::from_secs(3600),
            full_page_size: 200,
            chunk_size: 50,
            fan_out: 8,
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    #[must_use]
    pub fn with_schemas(
        mut self,
        location_schema: impl Into<String>,
        blog_schema: impl Into<String>,
    ) -> Self {
        self.location_schema = location_schema.into();
        self.blog_schema = blog_schema.into();
        self
    }

    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_full_page_size(mut self, size: u32) -> Self {
        self.full_page_size = size;
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// URL of the token endpoint.
    pub fn token_url(&self) -> String {
        format!("{}/identity-server/connect/token", self.base_url)
    }

    /// URL of a schema's content collection.
    pub fn content_url(&self, schema: &str) -> String {
        format!("{}/api/content/{}/{}", self.base_url, self.app_name, schema)
    }
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_composed_from_base() {
        let config = CmsConfig::new("https://cms.example.com/", "lumera", "id", "secret");
        assert_eq!(
            config.token_url(),
            "https://cms.example.com/identity-server/connect/token"
        );
        assert_eq!(
            config.content_url("blog"),
            "https://cms.example.com/api/content/lumera/blog"
        );
    }

    #[test]
    fn defaults() {
        let config = CmsConfig::new("https://cms.example.com", "lumera", "id", "secret");
        assert_eq!(config.scope, "squidex-api");
        assert_eq!(config.full_page_size, 200);
        assert_eq!(config.chunk_size, 50);
        assert_eq!(config.token_ttl, Duration::from_secs(3600));
    }
}
