use crate::error::handle_error;
use crate::responder::{Reply, ReplyKind};
use crate::writer::{write_headers, ResponseWriter};
use crate::{BoxError, RequestContext};
use async_trait::async_trait;
use http::header::IntoHeaderName;
use http::{HeaderMap, HeaderValue};
use std::fmt;

/// A result envelope carrying an optional status, extra headers and either data or an error.
///
/// When written, the headers go out first, then the status (if one was set), then the error
/// envelope when `err` is set, the data otherwise.
///
/// ```no_run
/// # use micro_handler::{HttpError, Outcome};
/// # use micro_handler::extract::Json;
/// async fn create() -> Outcome<Json<u64>> {
///     Outcome::ok(Json(7)).with_code(201).with_header(http::header::LOCATION, "/users/7".parse().unwrap())
/// }
///
/// async fn fail() -> Outcome<Json<u64>> {
///     Outcome::err(409, HttpError::new(409, "conflict"))
/// }
/// ```
pub struct Outcome<T> {
    pub code: u16,
    pub headers: Option<HeaderMap>,
    pub data: T,
    pub err: Option<BoxError>,
}

impl<T> Outcome<T> {
    pub fn ok(data: T) -> Self {
        Self { code: 0, headers: None, data, err: None }
    }

    pub fn err(code: u16, err: impl Into<BoxError>) -> Self
    where
        T: Default,
    {
        Self { code, headers: None, data: T::default(), err: Some(err.into()) }
    }

    #[must_use]
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    #[must_use]
    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.get_or_insert_with(HeaderMap::new).append(name, value);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        match &mut self.headers {
            Some(existing) => {
                for (name, value) in &headers {
                    existing.append(name.clone(), value.clone());
                }
            }
            None => self.headers = Some(headers),
        }
        self
    }
}

impl<T: fmt::Debug> fmt::Debug for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outcome")
            .field("code", &self.code)
            .field("headers", &self.headers)
            .field("data", &self.data)
            .field("err", &self.err.as_ref().map(ToString::to_string))
            .finish()
    }
}

#[async_trait]
impl<T: Reply> Reply for Outcome<T> {
    const KIND: ReplyKind = ReplyKind::Envelope;

    async fn reply(self, writer: &ResponseWriter, req: &RequestContext) -> Result<(), BoxError> {
        if let Some(headers) = &self.headers {
            write_headers(writer, headers);
        }

        if self.code != 0 {
            writer.write_status(self.code);
        }

        match self.err {
            Some(err) => handle_error(writer, err),
            None => self.data.reply(writer, req).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Outcome;
    use crate::config::Config;
    use crate::error::HttpError;
    use crate::extract::Json;
    use crate::responder::Reply;
    use crate::{RequestContext, ResponseWriter};
    use bytes::Bytes;
    use http::{HeaderMap, HeaderValue, Response, StatusCode};
    use http_body_util::Empty;
    use std::sync::Arc;

    async fn render<R: Reply>(value: R) -> Response<crate::ResponseBody> {
        let config = Arc::new(Config::default());
        let req = RequestContext::from_request(http::Request::new(Empty::<Bytes>::new())).with_config(Arc::clone(&config));
        let writer = ResponseWriter::new(config);
        value.reply(&writer, &req).await.unwrap();
        writer.into_response()
    }

    #[tokio::test]
    async fn test_ok_with_code_and_headers() {
        let mut extra = HeaderMap::new();
        extra.append("x-trace", HeaderValue::from_static("a"));
        extra.append("x-trace", HeaderValue::from_static("b"));

        let outcome = Outcome::ok(Json(vec![1, 2]))
            .with_code(201)
            .with_header(http::header::LOCATION, HeaderValue::from_static("/items/1"))
            .with_headers(extra);

        let response = render(outcome).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[http::header::LOCATION], "/items/1");
        assert_eq!(response.headers().get_all("x-trace").iter().count(), 2);
        assert_eq!(response.body().as_bytes(), b"[1,2]\n");
    }

    #[tokio::test]
    async fn test_ok_without_code_is_200() {
        let response = render(Outcome::ok("done")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_bytes(), b"done");
    }

    #[tokio::test]
    async fn test_err_keeps_envelope_code() {
        let outcome = Outcome::<Json<Vec<u8>>>::err(400, "name is required");
        let response = render(outcome).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: HttpError = serde_json::from_slice(response.body().as_bytes()).unwrap();
        assert_eq!(body, HttpError::new(500, "internal_error"));
    }

    #[tokio::test]
    async fn test_err_branch_wins_over_data() {
        let outcome = Outcome { code: 0, headers: None, data: "ignored", err: Some("user not found".into()) };
        let response = render(outcome).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!String::from_utf8_lossy(response.body().as_bytes()).contains("ignored"));
    }
}
