//! Object store client shared by the S3 and GCS adapters
//!
//! Both providers expose the same XML REST surface and sign it with the
//! header HMAC scheme; only the signer, endpoint and listing pagination
//! differ.

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{AdapterError, AdapterResult, StorageAdapter, StorageConfig};
use crate::config::MAX_LIST_PAGES;
use crate::dispatch::{BatchExecutor, RequestDescriptor, RequestOutcome};
use crate::signing::{canonical_resource, pct_encode, pct_encode_path, RequestSigner, Secret, SigningContext, SigningScheme};

static KEY_PATTERN: Lazy<Regex> = Lazy::new(|| compile(r"(?i)<key>([^<]+)</key>"));
static TRUNCATED_PATTERN: Lazy<Regex> = Lazy::new(|| compile(r"(?i)<istruncated>\s*true\s*</istruncated>"));
static NEXT_MARKER_PATTERN: Lazy<Regex> = Lazy::new(|| compile(r"(?i)<nextmarker>([^<]+)</nextmarker>"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("FATAL: invalid listing pattern {}: {}", pattern, e))
}

/// Where requests are sent
#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    /// `https://<container>.<host>/<object>`
    VirtualHost(String),
    /// `<base>/<container>/<object>`
    Path(String),
}

/// One page of a container listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub keys: Vec<String>,
    /// Marker for the follow-up request when the listing was truncated
    pub next_marker: Option<String>,
}

/// Parse an XML bucket listing.
///
/// When the listing is truncated and carries no `NextMarker`, the last key is
/// the marker.
pub fn parse_listing(body: &str) -> ListingPage {
    let keys: Vec<String> = KEY_PATTERN
        .captures_iter(body)
        .map(|c| unescape_xml(&c[1]))
        .collect();
    let next_marker = if TRUNCATED_PATTERN.is_match(body) {
        NEXT_MARKER_PATTERN
            .captures(body)
            .map(|c| unescape_xml(&c[1]))
            .or_else(|| keys.last().cloned())
    } else {
        None
    };
    ListingPage { keys, next_marker }
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// HMAC-signed XML object store
pub struct HmacObjectStore {
    api: &'static str,
    signer: Box<dyn RequestSigner>,
    key: String,
    secret: Secret,
    container: String,
    region: String,
    endpoint: Endpoint,
    paginated: bool,
    executor: Arc<BatchExecutor>,
}

impl HmacObjectStore {
    /// Create a store for `api`, signed with the scheme registered for it.
    ///
    /// `host` is the provider endpoint used for virtual-host URLs; a
    /// `base_url` in the config replaces it with path-style URLs.
    pub fn new(
        api: &'static str,
        config: StorageConfig,
        default_region: &str,
        host: String,
        paginated: bool,
        executor: Arc<BatchExecutor>,
    ) -> AdapterResult<Self> {
        if config.container.is_empty() {
            return Err(AdapterError::Config(format!("{} storage container is required", api)));
        }
        let signer = SigningScheme::for_service(api)?.signer();
        let endpoint = match config.base_url {
            Some(base) => Endpoint::Path(base.trim_end_matches('/').to_string()),
            None => Endpoint::VirtualHost(host),
        };
        let region = config
            .region
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| default_region.to_string());
        info!(api = api, region = %region, endpoint = ?endpoint, "Initialized storage adapter");
        Ok(Self {
            api,
            signer,
            key: config.key,
            secret: config.secret,
            container: config.container,
            region,
            endpoint,
            paginated,
            executor,
        })
    }

    fn url(&self, container: Option<&str>, object: Option<&str>, query: &[(&str, &str)]) -> String {
        let object_path = object
            .filter(|o| !o.is_empty())
            .map(|o| format!("/{}", pct_encode_path(o.trim_start_matches('/'))))
            .unwrap_or_default();
        let mut url = match (&self.endpoint, container) {
            (Endpoint::VirtualHost(host), Some(container)) => {
                format!("https://{}.{}{}", container, host, object_path)
            }
            (Endpoint::VirtualHost(host), None) => format!("https://{}/", host),
            (Endpoint::Path(base), Some(container)) => format!("{}/{}{}", base, container, object_path),
            (Endpoint::Path(base), None) => format!("{}/", base),
        };
        if container.is_some() && object_path.is_empty() && matches!(self.endpoint, Endpoint::VirtualHost(_)) {
            url.push('/');
        }
        for (i, (name, value)) in query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(name);
            if !value.is_empty() {
                url.push('=');
                url.push_str(&pct_encode(value));
            }
        }
        url
    }

    fn signed(
        &self,
        method: &str,
        container: Option<&str>,
        object: Option<&str>,
        query: &[(&str, &str)],
    ) -> AdapterResult<RequestDescriptor> {
        let (date_name, date) = self.signer.date_header(Utc::now());
        let mut ctx = SigningContext::new(
            self.key.clone(),
            self.secret.clone(),
            self.region.clone(),
            method,
            canonical_resource(container, object, method),
        )
        .header(date_name, date.clone());
        for (name, value) in query {
            ctx = ctx.query(*name, *value);
        }
        let authorization = self.signer.authorization(&ctx)?;
        Ok(RequestDescriptor::new(method, self.url(container, object, query))
            .header(date_name, date)
            .header("authorization", authorization))
    }

    async fn send(&self, request: RequestDescriptor, capture_body: bool) -> AdapterResult<RequestOutcome> {
        let result = self.executor.execute(std::slice::from_ref(&request), capture_body).await?;
        Ok(result.outcomes.into_iter().next().unwrap_or_default())
    }

    async fn list_page(&self, container: &str, prefix: Option<&str>, marker: Option<&str>) -> AdapterResult<ListingPage> {
        let mut query = Vec::new();
        if let Some(marker) = marker {
            query.push(("marker", marker));
        }
        if let Some(prefix) = prefix {
            query.push(("prefix", prefix));
        }
        let request = self.signed("GET", Some(container), None, &query)?;
        let outcome = self.send(request, true).await?;
        if outcome.status != 200 {
            warn!(api = self.api, container = %container, status = outcome.status, "GET bucket request failed");
            return Err(AdapterError::Status {
                operation: format!("list {}", container),
                status: outcome.status,
            });
        }
        Ok(parse_listing(outcome.body_text()))
    }
}

#[async_trait]
impl StorageAdapter for HmacObjectStore {
    fn api(&self) -> &'static str {
        self.api
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn container(&self) -> &str {
        &self.container
    }

    async fn authenticate(&self) -> bool {
        let request = match self.signed("GET", None, None, &[]) {
            Ok(request) => request,
            Err(e) => {
                warn!(api = self.api, error = %e, "Unable to sign authentication request");
                return false;
            }
        };
        match self.send(request, false).await {
            Ok(outcome) => {
                let ok = matches!(outcome.status, 200 | 404);
                info!(api = self.api, status = outcome.status, authenticated = ok, "GET service request completed");
                ok
            }
            Err(e) => {
                warn!(api = self.api, error = %e, "GET service request failed");
                false
            }
        }
    }

    async fn container_exists(&self, container: &str) -> AdapterResult<bool> {
        let outcome = self.send(self.signed("HEAD", Some(container), None, &[])?, false).await?;
        debug!(api = self.api, container = %container, status = outcome.status, "HEAD bucket request completed");
        Ok(outcome.status == 200)
    }

    async fn delete_object(&self, container: &str, object: &str) -> AdapterResult<bool> {
        let outcome = self.send(self.signed("DELETE", Some(container), Some(object), &[])?, false).await?;
        let deleted = outcome.status == 204;
        if deleted {
            debug!(api = self.api, object = %object, "Deleted object");
        } else {
            warn!(api = self.api, object = %object, status = outcome.status, "DELETE object request failed");
        }
        Ok(deleted)
    }

    async fn object_size(&self, container: &str, object: &str) -> AdapterResult<Option<u64>> {
        let outcome = self.send(self.signed("HEAD", Some(container), Some(object), &[])?, false).await?;
        Ok(size_from(&outcome))
    }

    async fn object_sizes(&self, container: &str, objects: &[String]) -> AdapterResult<Vec<Option<u64>>> {
        if objects.is_empty() {
            return Ok(Vec::new());
        }
        let requests = objects
            .iter()
            .map(|object| self.signed("HEAD", Some(container), Some(object), &[]))
            .collect::<AdapterResult<Vec<_>>>()?;
        let result = self.executor.execute(&requests, false).await?;
        Ok(result.outcomes.iter().map(size_from).collect())
    }

    async fn list_container(&self, container: &str, prefix: Option<&str>) -> AdapterResult<Vec<String>> {
        let mut page = self.list_page(container, prefix, None).await?;
        let mut objects = std::mem::take(&mut page.keys);
        let mut pages = 1;

        while self.paginated {
            let Some(marker) = page.next_marker.take() else {
                break;
            };
            if pages >= MAX_LIST_PAGES {
                warn!(api = self.api, container = %container, pages = pages, "Listing still truncated, stopping");
                break;
            }
            debug!(api = self.api, container = %container, marker = %marker, "Listing truncated, requesting next page");
            page = self.list_page(container, prefix, Some(&marker)).await?;
            objects.extend(page.keys.drain(..).filter(|key| *key != marker));
            pages += 1;
        }

        debug!(api = self.api, container = %container, prefix = ?prefix, objects = objects.len(), "Listed container");
        Ok(objects)
    }

    async fn object_exists(&self, container: &str, object: &str) -> AdapterResult<bool> {
        let outcome = self.send(self.signed("HEAD", Some(container), Some(object), &[])?, false).await?;
        Ok(outcome.status == 200)
    }

    fn object_url(&self, object: &str) -> String {
        self.url(Some(&self.container), Some(object), &[])
    }
}

fn size_from(outcome: &RequestOutcome) -> Option<u64> {
    if outcome.status != 200 {
        return None;
    }
    outcome.header("content-length").and_then(|v| v.trim().parse().ok())
}
