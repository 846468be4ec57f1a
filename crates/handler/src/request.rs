//! The request as seen by extractors and handlers.
//!
//! [`RequestContext`] bundles the request head, the matched route pattern with its resolved
//! path parameters, the take-once body and the configuration in effect. It is cheap to clone,
//! which is how handlers asking for the raw request receive it.

use crate::body::OptionReqBody;
use crate::config::{self, Config};
use crate::BoxError;
use bytes::Bytes;
use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Uri, Version};
use http_body::Body as HttpBody;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RequestContext {
    head: Arc<Parts>,
    pattern: Arc<str>,
    path_params: Arc<[(String, String)]>,
    body: OptionReqBody,
    config: Arc<Config>,
}

impl RequestContext {
    /// Creates a context reading the process-wide configuration.
    pub fn new(head: Parts, body: OptionReqBody) -> Self {
        Self { head: Arc::new(head), pattern: Arc::from(""), path_params: Arc::from([]), body, config: config::current() }
    }

    /// Splits an `http::Request` into its head and a shared body handle.
    pub fn from_request<B>(req: http::Request<B>) -> Self
    where
        B: HttpBody + Send + Sync + 'static,
        B::Data: Into<Bytes>,
        B::Error: Into<BoxError>,
    {
        let (head, body) = req.into_parts();
        Self::new(head, OptionReqBody::from_body(body))
    }

    /// Sets the route pattern the request matched, e.g. `/users/{id}`.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<Arc<str>>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Sets the path parameter values resolved by the router.
    #[must_use]
    pub fn with_path_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.path_params = params.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: Arc<Config>) -> Self {
        self.config = config;
        self
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    pub fn version(&self) -> Version {
        self.head.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn extensions(&self) -> &Extensions {
        &self.head.extensions
    }

    /// The matched route pattern, empty when the request was not routed.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The value of the path parameter `name`, a leading `*` of catch-all names is ignored.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        let name = name.strip_prefix('*').unwrap_or(name);
        self.path_params.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn path_params(&self) -> &[(String, String)] {
        &self.path_params
    }

    pub fn body(&self) -> &OptionReqBody {
        &self.body
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn config_handle(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }
}
