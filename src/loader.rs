//! Spec sources and the per-engine spec cache

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

use crate::error::{ExtractError, Result};
use crate::spec::ExtractionSpec;

/// Where spec JSON for a document type comes from
pub trait SpecSource: Send + Sync {
    /// Raw JSON for `doc_type`, or `SpecNotFound`
    fn fetch<'a>(&'a self, doc_type: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// Reads `<dir>/<doc_type>.json`
#[derive(Debug, Clone)]
pub struct DirSpecSource {
    dir: PathBuf,
}

impl DirSpecSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SpecSource for DirSpecSource {
    fn fetch<'a>(&'a self, doc_type: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let path = self.dir.join(format!("{doc_type}.json"));
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| {
                    ExtractError::spec_not_found(doc_type, format!("{}: {e}", path.display()))
                })
        })
    }
}

/// GETs `<base>/<doc_type>.json`
#[derive(Debug, Clone)]
pub struct HttpSpecSource {
    client: reqwest::Client,
    base: Url,
}

impl HttpSpecSource {
    pub fn new(base: &str) -> std::result::Result<Self, url::ParseError> {
        Self::with_client(reqwest::Client::new(), base)
    }

    pub fn with_client(
        client: reqwest::Client,
        base: &str,
    ) -> std::result::Result<Self, url::ParseError> {
        // join() replaces the last segment unless the base ends in a slash
        let base = if base.ends_with('/') {
            Url::parse(base)?
        } else {
            Url::parse(&format!("{base}/"))?
        };
        Ok(Self { client, base })
    }

    pub fn spec_url(&self, doc_type: &str) -> std::result::Result<Url, url::ParseError> {
        self.base.join(&format!("{doc_type}.json"))
    }
}

impl SpecSource for HttpSpecSource {
    fn fetch<'a>(&'a self, doc_type: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let not_found = |reason: String| ExtractError::spec_not_found(doc_type, reason);
            let url = self.spec_url(doc_type).map_err(|e| not_found(e.to_string()))?;

            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| not_found(format!("request to {url} failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                return Err(not_found(format!("{url} returned {status}")));
            }
            response.text().await.map_err(|e| not_found(e.to_string()))
        })
    }
}

#[derive(Debug)]
struct CachedSpec {
    spec: Arc<ExtractionSpec>,
    fetched_at: Instant,
}

/// Loaded specs keyed by document type. Entries expire after `ttl`; callers
/// can drop one entry or all of them at any time.
#[derive(Debug)]
pub struct SpecCache {
    cache: RwLock<HashMap<String, CachedSpec>>,
    ttl: Duration,
}

impl SpecCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn get(&self, doc_type: &str) -> Option<Arc<ExtractionSpec>> {
        let cache = self.cache.read().ok()?;
        let cached = cache.get(doc_type)?;
        (cached.fetched_at.elapsed() < self.ttl).then(|| Arc::clone(&cached.spec))
    }

    pub fn insert(&self, doc_type: &str, spec: Arc<ExtractionSpec>) {
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(
                doc_type.to_string(),
                CachedSpec {
                    spec,
                    fetched_at: Instant::now(),
                },
            );
        }
    }

    /// Forget one document type; the next load fetches it again
    pub fn invalidate(&self, doc_type: &str) -> bool {
        self.cache
            .write()
            .map(|mut cache| cache.remove(doc_type).is_some())
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }
}

/// Fetches, parses and caches specs
pub struct SpecLoader {
    source: Arc<dyn SpecSource>,
    cache: SpecCache,
}

impl SpecLoader {
    pub fn new(source: Arc<dyn SpecSource>, ttl: Duration) -> Self {
        Self {
            source,
            cache: SpecCache::new(ttl),
        }
    }

    pub fn cache(&self) -> &SpecCache {
        &self.cache
    }

    pub async fn load(&self, doc_type: &str) -> Result<Arc<ExtractionSpec>> {
        validate_doc_type(doc_type)?;

        if let Some(spec) = self.cache.get(doc_type) {
            debug!(doc_type, "spec served from cache");
            return Ok(spec);
        }

        let json = self.source.fetch(doc_type).await?;
        let spec = ExtractionSpec::from_json(&json).map_err(|e| {
            ExtractError::spec_not_found(doc_type, format!("invalid spec JSON: {e}"))
        })?;
        info!(
            doc_type,
            fields = spec.fields.len(),
            table = spec.table.is_some(),
            actions = spec.actions.len(),
            "spec loaded"
        );

        let spec = Arc::new(spec);
        self.cache.insert(doc_type, Arc::clone(&spec));
        Ok(spec)
    }
}

/// Document type keys name a file or URL segment, so only `[A-Za-z0-9_-]`
pub fn validate_doc_type(doc_type: &str) -> Result<()> {
    let valid = !doc_type.is_empty()
        && doc_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ExtractError::spec_not_found(doc_type, "invalid document type key"))
    }
}
