//! Extractors reading the request url: the query string and path parameters.
//!
//! # Example
//! ```no_run
//! # use serde::Deserialize;
//! # use micro_handler::extract::{Path, Query};
//! # use micro_handler::Validate;
//! #[derive(Deserialize)]
//! struct Paging {
//!     page: u32,
//!     limit: u32,
//! }
//!
//! impl Validate for Paging {}
//!
//! // routed as `/items/{category}/{id}`
//! async fn item(category: Path<String>, id: Path<u64>, Query(paging): Query<Paging>) -> String {
//!     format!("{} #{} page {} of {}", *category, *id, paging.page, paging.limit)
//! }
//! ```

use crate::extract::extract_body::validate_payload;
use crate::extract::{ExtractError, Extractor, Path, Query};
use crate::schema::parse_bool;
use crate::validate::Validate;
use crate::{BoxError, RequestContext};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use thiserror::Error;

#[async_trait]
impl<T> Extractor for Query<T>
where
    T: DeserializeOwned + Validate + Send,
{
    async fn extract(req: &RequestContext, _key: Option<String>) -> Result<Self, BoxError> {
        let query = req.uri().query().unwrap_or_default();
        let payload: T = req.config().schema_decoder().decode_str(query)?;
        validate_payload(req, &payload)?;
        Ok(Query(payload))
    }
}

/// A failed [`PathValue::parse`].
#[derive(Debug)]
pub enum PathValueError {
    /// The type has no text representation.
    Unsupported,
    Invalid(BoxError),
}

/// A type a path parameter can be converted into.
///
/// Implemented for `String`, the integer types and `f64` (base 10) and `bool`.
pub trait PathValue: Sized + Send {
    /// The type name reported when a conversion fails.
    const TYPE_NAME: &'static str;

    fn parse(raw: &str) -> Result<Self, PathValueError> {
        let _ = raw;
        Err(PathValueError::Unsupported)
    }
}

impl PathValue for String {
    const TYPE_NAME: &'static str = "string";

    fn parse(raw: &str) -> Result<Self, PathValueError> {
        Ok(raw.to_string())
    }
}

impl PathValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn parse(raw: &str) -> Result<Self, PathValueError> {
        parse_bool(raw).map_err(|e| PathValueError::Invalid(e.into()))
    }
}

macro_rules! impl_path_value_from_str {
    ($($ty:ty),*) => {
        $(
            impl PathValue for $ty {
                const TYPE_NAME: &'static str = stringify!($ty);

                fn parse(raw: &str) -> Result<Self, PathValueError> {
                    raw.parse::<$ty>().map_err(|e| PathValueError::Invalid(e.into()))
                }
            }
        )*
    };
}

impl_path_value_from_str!(i32, i64, isize, u32, u64, usize, f64);

#[derive(Debug, Error)]
enum PathDecodeError {
    #[error("invalid percent escape at byte {0}")]
    InvalidEscape(usize),
    #[error("decoded path parameter is not valid utf-8")]
    NotUtf8(#[source] std::string::FromUtf8Error),
}

/// Decodes the `%XX` escapes of a raw path segment. `+` is kept as is.
fn percent_decode(raw: &str) -> Result<Cow<'_, str>, PathDecodeError> {
    if !raw.contains('%') {
        return Ok(Cow::Borrowed(raw));
    }

    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let byte = bytes
                .get(i + 1..i + 3)
                .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or(PathDecodeError::InvalidEscape(i))?;
            decoded.push(byte);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(decoded).map(Cow::Owned).map_err(PathDecodeError::NotUtf8)
}

#[async_trait]
impl<T: PathValue> Extractor for Path<T> {
    const KEYED: bool = true;

    async fn extract(req: &RequestContext, key: Option<String>) -> Result<Self, BoxError> {
        let key = key.unwrap_or_default();
        let raw = match req.path_param(&key) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Err(ExtractError::missing_path(&key).into()),
        };

        let decoded =
            percent_decode(raw).map_err(|e| ExtractError::path_conversion(&key, raw, T::TYPE_NAME, e))?;

        match T::parse(&decoded) {
            Ok(value) => Ok(Path { value, key }),
            Err(PathValueError::Invalid(e)) => {
                Err(ExtractError::path_conversion(&key, &decoded, T::TYPE_NAME, e).into())
            }
            Err(PathValueError::Unsupported) => Err(ExtractError::unsupported_type(&key, T::TYPE_NAME).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PathValue, PathValueError};
    use crate::config::Config;
    use crate::error::to_http_error;
    use crate::extract::{ExtractError, ExtractErrorKind, Extractor, Path, Query};
    use crate::schema::SchemaDecoder;
    use crate::validate::Validate;
    use crate::{BoxError, RequestContext};
    use http_body_util::Empty;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Search {
        q: String,
        page: i32,
    }

    impl Validate for Search {}

    #[derive(Debug)]
    struct Coordinates;

    impl PathValue for Coordinates {
        const TYPE_NAME: &'static str = "Coordinates";
    }

    fn request(uri: &str, pattern: &str, params: &[(&str, &str)]) -> RequestContext {
        let req = http::Request::builder().uri(uri).body(Empty::<bytes::Bytes>::new()).unwrap();
        RequestContext::from_request(req)
            .with_config(Arc::new(Config::default()))
            .with_pattern(pattern)
            .with_path_params(params.iter().copied())
    }

    fn kind(err: &BoxError) -> ExtractErrorKind {
        err.downcast_ref::<ExtractError>().map(|e| e.kind().clone()).expect("an extraction error")
    }

    #[tokio::test]
    async fn test_query_payload() {
        let req = request("/search?q=rust&page=2&extra=1", "/search", &[]);
        let Query(search) = Query::<Search>::extract(&req, None).await.unwrap();
        assert_eq!(search, Search { q: "rust".into(), page: 2 });
    }

    #[tokio::test]
    async fn test_query_absent_keys_are_zero() {
        let req = request("/search", "/search", &[]);
        let Query(search) = Query::<Search>::extract(&req, None).await.unwrap();
        assert_eq!(search, Search { q: String::new(), page: 0 });
    }

    #[tokio::test]
    async fn test_query_conversion_error() {
        let req = request("/search?page=two", "/search", &[]);
        let err = Query::<Search>::extract(&req, None).await.unwrap_err();
        assert_eq!(to_http_error(err.as_ref()).error, "conversion_failed");
    }

    #[tokio::test]
    async fn test_query_strict_decoder() {
        let config = Config::default().with_schema_decoder(SchemaDecoder::new().with_ignore_unknown_keys(false));
        let req = request("/search?q=a&debug=1", "/search", &[]).with_config(Arc::new(config));
        let err = Query::<Search>::extract(&req, None).await.unwrap_err();
        assert_eq!(to_http_error(err.as_ref()).error, "unknown_field");
    }

    #[tokio::test]
    async fn test_path_values() {
        let req = request("/users/42/active/true", "/users/{id}/active/{flag}", &[("id", "42"), ("flag", "true")]);

        let id = Path::<i64>::extract(&req, Some("id".into())).await.unwrap();
        assert_eq!((id.value, id.key.as_str()), (42, "id"));

        let flag = Path::<bool>::extract(&req, Some("flag".into())).await.unwrap();
        assert!(flag.value);

        let raw = Path::<String>::extract(&req, Some("id".into())).await.unwrap();
        assert_eq!(raw.into_inner(), "42");
    }

    #[tokio::test]
    async fn test_path_conversion_error() {
        let req = request("/users/abc", "/users/{id}", &[("id", "abc")]);
        let err = Path::<i32>::extract(&req, Some("id".into())).await.unwrap_err();

        assert_eq!(kind(&err), ExtractErrorKind::PathConversion);
        let extract_error = err.downcast_ref::<ExtractError>().unwrap();
        assert_eq!(extract_error.value(), Some("abc"));
        assert_eq!(to_http_error(err.as_ref()).message, r#"invalid path parameter "id": cannot convert "abc" to i32"#);
    }

    #[tokio::test]
    async fn test_path_values_are_percent_decoded() {
        let req = request("/users/ann%20lee", "/users/{name}", &[("name", "ann%20lee"), ("tag", "a+b%2Fc")]);

        let name = Path::<String>::extract(&req, Some("name".into())).await.unwrap();
        assert_eq!(*name, "ann lee");

        let tag = Path::<String>::extract(&req, Some("tag".into())).await.unwrap();
        assert_eq!(*tag, "a+b/c");
    }

    #[tokio::test]
    async fn test_path_undecodable_value() {
        let req = request("/users/x", "/users/{name}", &[("bad_utf8", "%FF%FE"), ("bad_escape", "100%"), ("hex", "%+1")]);

        for key in ["bad_utf8", "bad_escape", "hex"] {
            let err = Path::<String>::extract(&req, Some(key.into())).await.unwrap_err();
            assert_eq!(kind(&err), ExtractErrorKind::PathConversion, "{key}");
            assert_eq!(to_http_error(err.as_ref()).error, "invalid_path_parameter", "{key}");
        }
    }

    #[tokio::test]
    async fn test_path_missing_or_empty() {
        let req = request("/users/", "/users/{id}", &[("id", "")]);
        let err = Path::<u64>::extract(&req, Some("id".into())).await.unwrap_err();
        assert_eq!(kind(&err), ExtractErrorKind::MissingPath);

        let err = Path::<u64>::extract(&req, Some("slug".into())).await.unwrap_err();
        assert_eq!(to_http_error(err.as_ref()).message, "missing required path parameter: slug");
    }

    #[tokio::test]
    async fn test_path_catch_all() {
        let req = request("/files/a/b", "/files/{*rest}", &[("rest", "a/b")]);
        let rest = Path::<String>::extract(&req, Some("*rest".into())).await.unwrap();
        assert_eq!(*rest, "a/b");
    }

    #[tokio::test]
    async fn test_path_unsupported_type() {
        assert!(matches!(Coordinates::parse("1,2"), Err(PathValueError::Unsupported)));

        let req = request("/map/1,2", "/map/{at}", &[("at", "1,2")]);
        let err = Path::<Coordinates>::extract(&req, Some("at".into())).await.unwrap_err();
        let http_error = to_http_error(err.as_ref());
        assert_eq!((http_error.code, http_error.error.as_str()), (400, "unsupported_type"));
    }

    #[test]
    fn test_bool_literals() {
        assert!(bool::parse("T").unwrap());
        assert!(!bool::parse("False").unwrap());
        assert!(matches!(bool::parse("yes"), Err(PathValueError::Invalid(_))));
        assert!(matches!(u32::parse("-1"), Err(PathValueError::Invalid(_))));
    }
}
