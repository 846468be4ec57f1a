//! Extractors reading the request body.

use crate::extract::{ExtractError, Extractor, Form, Json};
use crate::validate::Validate;
use crate::{BoxError, RequestContext};
use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::Method;
use http_body_util::LengthLimitError;
use mime::Mime;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// The largest url encoded body a [`Form`] reads.
pub const MAX_FORM_BODY_SIZE: usize = 10 << 20;

#[derive(Debug, Error)]
enum FormBodyError {
    #[error("form body larger than {MAX_FORM_BODY_SIZE} bytes")]
    TooLarge,
    #[error("form body is not valid utf-8")]
    NotUtf8(#[source] std::str::Utf8Error),
    #[error("invalid percent escape at byte {0}")]
    InvalidEscape(usize),
}

/// Runs the configured validator, wrapping its failure as a validation error.
pub(crate) fn validate_payload<T: Validate>(req: &RequestContext, payload: &T) -> Result<(), BoxError> {
    req.config().validate(payload).map_err(|e| ExtractError::validation(e).into())
}

#[async_trait]
impl<T> Extractor for Json<T>
where
    T: DeserializeOwned + Validate + Send,
{
    async fn extract(req: &RequestContext, _key: Option<String>) -> Result<Self, BoxError> {
        let body = req.body().read_all().await.map_err(ExtractError::body_read)?;
        if body.is_empty() {
            return Err(ExtractError::empty_body().into());
        }

        let payload: T = req.config().json_unmarshal(&body)?;
        validate_payload(req, &payload)?;
        Ok(Json(payload))
    }
}

#[async_trait]
impl<T> Extractor for Form<T>
where
    T: DeserializeOwned + Validate + Send,
{
    async fn extract(req: &RequestContext, _key: Option<String>) -> Result<Self, BoxError> {
        let mut pairs = Vec::new();

        if reads_form_body(req) {
            let body = req.body().read_all_limited(MAX_FORM_BODY_SIZE).await.map_err(|e| {
                if e.is::<LengthLimitError>() {
                    ExtractError::form_parse(FormBodyError::TooLarge)
                } else {
                    ExtractError::body_read(e)
                }
            })?;
            let body = std::str::from_utf8(&body).map_err(|e| ExtractError::form_parse(FormBodyError::NotUtf8(e)))?;
            pairs.extend(parse_pairs(body)?);
        }

        if let Some(query) = req.uri().query() {
            pairs.extend(parse_pairs(query)?);
        }

        let payload: T = req.config().schema_decoder().decode(pairs)?;
        validate_payload(req, &payload)?;
        Ok(Form(payload))
    }
}

fn reads_form_body(req: &RequestContext) -> bool {
    if !matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH) {
        return false;
    }

    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Mime>().ok())
        .is_some_and(|mime| mime.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str())
}

fn parse_pairs(encoded: &str) -> Result<Vec<(String, String)>, BoxError> {
    check_escapes(encoded).map_err(ExtractError::form_parse)?;
    serde_urlencoded::from_str::<Vec<(String, String)>>(encoded).map_err(|e| ExtractError::form_parse(e).into())
}

/// Rejects `%` not followed by two hex digits, the url decoder would keep them verbatim.
fn check_escapes(encoded: &str) -> Result<(), FormBodyError> {
    let bytes = encoded.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.get(i + 1..i + 3).is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(FormBodyError::InvalidEscape(i));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}
