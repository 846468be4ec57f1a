//! A small `matchit` backed router that feeds matched requests to [`RequestHandler`]s.
//!
//! Routing itself stays minimal: a route is a pattern plus a list of method bound handlers.
//! The router resolves the pattern and its parameters and hands both to the handler through
//! the [`RequestContext`].

use crate::body::ResponseBody;
use crate::config;
use crate::error::{handle_error, HttpError};
use crate::handler::RequestHandler;
use crate::writer::ResponseWriter;
use crate::{BoxError, RequestContext};
use bytes::Bytes;
use http::header::ALLOW;
use http::{HeaderValue, Method, Response};
use http_body::Body as HttpBody;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

type InnerRouter<T> = matchit::Router<T>;

/// Main router structure that handles HTTP request routing
pub struct Router {
    inner_router: InnerRouter<Route>,
}

struct Route {
    pattern: Arc<str>,
    items: Vec<RouterItem>,
}

/// A handler together with the method it answers to
pub struct RouterItem {
    method: Option<Method>,
    handler: Box<dyn RequestHandler>,
}

impl Router {
    /// Creates a new, empty router builder
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Routes `req` to its handler and returns the finished response.
    ///
    /// Unknown paths answer with a 404 `not_found` envelope, known paths without a handler for
    /// the request method with a 405 `method_not_allowed` envelope.
    pub async fn handle<B>(&self, req: http::Request<B>) -> Response<ResponseBody>
    where
        B: HttpBody + Send + Sync + 'static,
        B::Data: Into<Bytes>,
        B::Error: Into<BoxError>,
    {
        let path = req.uri().path().to_owned();
        let matched = match self.inner_router.at(&path) {
            Ok(matched) => matched,
            Err(e) => {
                debug!(path, cause = %e, "no route matched");
                return error_response(HttpError::not_found(format!("no route for {path}")), None);
            }
        };

        let route = matched.value;
        let Some(item) = route.items.iter().find(|item| item.matches(req.method())) else {
            let message = format!("method {} not allowed for {}", req.method(), route.pattern);
            return error_response(HttpError::new(405, "method_not_allowed").with_message(message), route.allow());
        };

        let ctx = RequestContext::from_request(req)
            .with_pattern(Arc::clone(&route.pattern))
            .with_path_params(matched.params.iter());

        item.handler.invoke(ctx).await
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").finish_non_exhaustive()
    }
}

impl Route {
    fn allow(&self) -> Option<HeaderValue> {
        if self.items.iter().any(|item| item.method.is_none()) {
            return None;
        }
        let methods = self.items.iter().filter_map(|item| item.method.as_ref().map(Method::as_str)).collect::<Vec<_>>();
        HeaderValue::from_str(&methods.join(", ")).ok()
    }
}

impl RouterItem {
    /// Returns true if this item answers requests with `method`
    pub fn matches(&self, method: &Method) -> bool {
        self.method.as_ref().is_none_or(|m| m == method)
    }
}

impl fmt::Debug for RouterItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterItem").field("method", &self.method).finish_non_exhaustive()
    }
}

fn error_response(http_error: HttpError, allow: Option<HeaderValue>) -> Response<ResponseBody> {
    let config = config::current();
    let writer = ResponseWriter::new(Arc::clone(&config));
    if let Some(allow) = allow {
        writer.insert_header(ALLOW, allow);
    }
    if let Err(e) = handle_error(&writer, Box::new(http_error)) {
        config.log(|| error!(cause = %e, "failed to write error response"));
    }
    writer.into_response()
}

#[derive(Default)]
pub struct RouterBuilder {
    data: HashMap<String, Vec<RouterItem>>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Adds `item` under `route`, a `matchit` pattern such as `/users/{id}` or `/files/{*rest}`
    #[must_use]
    pub fn route(mut self, route: impl Into<String>, item: RouterItem) -> Self {
        self.data.entry(route.into()).or_default().push(item);
        self
    }

    /// Builds the router from the accumulated routes
    ///
    /// # Panics
    ///
    /// Panics when a route pattern is invalid or conflicts with another one.
    pub fn build(self) -> Router {
        let mut inner_router = InnerRouter::new();

        for (path, items) in self.data {
            let route = Route { pattern: Arc::from(path.as_str()), items };
            if let Err(e) = inner_router.insert(path.as_str(), route) {
                panic!("router: invalid route {path:?}: {e}");
            }
        }

        Router { inner_router }
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder").field("routes", &self.data.keys().collect::<Vec<_>>()).finish()
    }
}

macro_rules! method_router_item {
    ($method:ident, $http_method:ident) => {
        pub fn $method<H: RequestHandler + 'static>(handler: H) -> RouterItem {
            RouterItem { method: Some(Method::$http_method), handler: Box::new(handler) }
        }
    };
}

method_router_item!(get, GET);
method_router_item!(post, POST);
method_router_item!(put, PUT);
method_router_item!(delete, DELETE);
method_router_item!(head, HEAD);
method_router_item!(options, OPTIONS);
method_router_item!(patch, PATCH);

/// Answers every method
pub fn any<H: RequestHandler + 'static>(handler: H) -> RouterItem {
    RouterItem { method: None, handler: Box::new(handler) }
}

#[cfg(test)]
mod tests {
    use super::{any, get, post, Router};
    use crate::config::Config;
    use crate::error::HttpError;
    use crate::extract::{Json, Path};
    use crate::{handler_fn, RequestContext};
    use bytes::Bytes;
    use http::{Method, Request, StatusCode};
    use http_body_util::Full;
    use std::sync::Arc;

    async fn hello() -> &'static str {
        "hello world"
    }

    async fn echo(body: Json<Vec<u32>>) -> Json<Vec<u32>> {
        body
    }

    async fn file(rest: Path<String>) -> String {
        rest.into_inner()
    }

    async fn describe(req: RequestContext) -> String {
        format!("{} {:?}", req.pattern(), req.path_params())
    }

    fn router() -> Router {
        let config = Arc::new(Config::default());
        Router::builder()
            .route("/", get(handler_fn(hello).with_config(Arc::clone(&config))))
            .route("/", post(handler_fn(echo).with_config(Arc::clone(&config))))
            .route("/files/{*rest}", get(handler_fn(file).with_config(Arc::clone(&config))))
            .route("/people/{name}", get(handler_fn(file).with_config(Arc::clone(&config))))
            .route("/users/{id}/posts/{post}", any(handler_fn(describe).with_config(config)))
            .build()
    }

    fn request(method: Method, uri: &str, body: &'static [u8]) -> Request<Full<Bytes>> {
        Request::builder().method(method).uri(uri).body(Full::new(Bytes::from_static(body))).unwrap()
    }

    #[tokio::test]
    async fn test_route_by_method() {
        let router = router();

        let response = router.handle(request(Method::GET, "/", b"")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_bytes(), b"hello world");

        let response = router.handle(request(Method::POST, "/", b"[1,2,3]")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_bytes(), b"[1,2,3]\n");
    }

    #[tokio::test]
    async fn test_not_found() {
        let response = router().handle(request(Method::GET, "/missing", b"")).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: HttpError = serde_json::from_slice(response.body().as_bytes()).unwrap();
        assert_eq!(body.error, "not_found");
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let response = router().handle(request(Method::DELETE, "/", b"")).await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let allow = response.headers()[http::header::ALLOW].to_str().unwrap();
        assert!(allow.contains("GET") && allow.contains("POST"), "{allow}");
        let body: HttpError = serde_json::from_slice(response.body().as_bytes()).unwrap();
        assert_eq!(body.error, "method_not_allowed");
    }

    #[tokio::test]
    async fn test_catch_all_param() {
        let response = router().handle(request(Method::GET, "/files/a/b.txt", b"")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_bytes(), b"a/b.txt");
    }

    #[tokio::test]
    async fn test_escaped_path_param() {
        let response = router().handle(request(Method::GET, "/people/ann%20lee", b"")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_bytes(), b"ann lee");

        let response = router().handle(request(Method::GET, "/people/%FF", b"")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: HttpError = serde_json::from_slice(response.body().as_bytes()).unwrap();
        assert_eq!(body.error, "invalid_path_parameter");
    }

    #[tokio::test]
    async fn test_pattern_and_params_reach_handler() {
        let response = router().handle(request(Method::PATCH, "/users/7/posts/12", b"")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.body().as_bytes(),
            br#"/users/{id}/posts/{post} [("id", "7"), ("post", "12")]"#
        );
    }

    #[test]
    #[should_panic(expected = "router: invalid route")]
    fn test_conflicting_routes() {
        let _ = Router::builder()
            .route("/users/{id}", get(handler_fn(hello)))
            .route("/users/{name}", get(handler_fn(hello)))
            .build();
    }
}
