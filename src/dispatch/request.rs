//! HTTP request descriptors accepted by the batch executor

use bytes::Bytes;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Source of a request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Literal bytes sent as-is
    Bytes(Bytes),
    /// Local file streamed as the body
    File(PathBuf),
}

/// One HTTP request in a batch.
///
/// Header names are stored lowercased; lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// HTTP method, uppercased
    pub method: String,
    /// Absolute URL
    pub url: String,
    /// Request headers keyed by lowercase name
    pub headers: BTreeMap<String, String>,
    /// Optional body
    pub body: Option<RequestBody>,
    /// Optional byte range (`start-end`)
    pub range: Option<String>,
    /// Optional multipart form fields, sent in order
    pub form: Vec<(String, String)>,
}

impl RequestDescriptor {
    /// Create a request with the given method and URL
    pub fn new(method: impl AsRef<str>, url: impl Into<String>) -> Self {
        Self {
            method: method.as_ref().to_uppercase(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            range: None,
            form: Vec::new(),
        }
    }

    /// GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// HEAD request
    pub fn head(url: impl Into<String>) -> Self {
        Self::new("HEAD", url)
    }

    /// Add a header (name is lowercased)
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_lowercase(), value.into());
        self
    }

    /// Add several headers (names are lowercased)
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.headers
                .insert(name.as_ref().to_lowercase(), value.into());
        }
        self
    }

    /// Set a literal body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(RequestBody::Bytes(body.into()));
        self
    }

    /// Stream the body from a local file
    pub fn body_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.body = Some(RequestBody::File(path.into()));
        self
    }

    /// Request a byte range, e.g. `0-1023`
    pub fn range(mut self, range: impl Into<String>) -> Self {
        self.range = Some(range.into());
        self
    }

    /// Append a multipart form field
    pub fn form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    /// Look up a header value by name, ignoring case
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}
