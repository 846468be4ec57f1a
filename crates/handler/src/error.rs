//! The uniform error envelope and the logic that turns arbitrary failures into it.
//!
//! Resolution order for a failure handed to [`handle_error`]:
//!
//! 1. a custom error hook installed in the [`Config`](crate::Config) takes over completely
//! 2. an [`HttpError`] anywhere in the `source()` chain is used as is
//! 3. an [`ExtractError`] anywhere in the chain maps its kind to a fixed status and tag
//! 4. decode failures of the JSON codec and the [`SchemaDecoder`](crate::SchemaDecoder) map to 400
//! 5. anything else gets a status inferred from its message

use crate::extract::{ExtractError, ExtractErrorKind};
use crate::schema::SchemaError;
use crate::writer::{APPLICATION_JSON_UTF_8, ResponseWriter};
use crate::BoxError;
use http::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use std::error::Error;
use std::fmt;

/// The uniform error envelope written as `{"code": .., "error": "..", "message": ".."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpError {
    pub code: u16,
    pub error: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl HttpError {
    pub fn new(code: u16, error: impl Into<String>) -> Self {
        Self { code, error: error.into(), message: String::new() }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, "bad_request").with_message(message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, "not_found").with_message(message)
    }

    /// The human readable message, falling back to the tag when none was given.
    pub fn effective_message(&self) -> &str {
        if self.message.is_empty() { &self.error } else { &self.message }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.effective_message())
    }
}

impl Error for HttpError {}

/// Writes `err` to `writer` as an error response.
///
/// The status is only committed when nothing has been committed yet, the body is always the
/// JSON envelope. Returns the error of the underlying write, if any.
pub fn handle_error(writer: &ResponseWriter, err: BoxError) -> Result<(), BoxError> {
    let config = writer.config();
    if let Some(hook) = config.error_handler() {
        hook(writer, &err);
        return Ok(());
    }

    let status_written = writer.is_committed();
    let http_error = to_http_error(err.as_ref());

    writer.insert_header(CONTENT_TYPE, APPLICATION_JSON_UTF_8);
    if !status_written {
        writer.write_status(http_error.code);
    }

    config.json_encode(&mut writer.clone(), &http_error)
}

/// Classifies an arbitrary failure into an [`HttpError`].
pub fn to_http_error(err: &(dyn Error + Send + Sync + 'static)) -> HttpError {
    if let Some(http_error) = find_in_chain::<HttpError>(err) {
        return http_error.clone();
    }

    if let Some(extract_error) = find_in_chain::<ExtractError>(err) {
        return from_extract_error(extract_error);
    }

    if let Some(json_error) = find_in_chain::<serde_json::Error>(err) {
        return from_json_error(json_error);
    }

    if let Some(schema_error) = find_in_chain::<SchemaError>(err) {
        return from_schema_error(schema_error);
    }

    let code = infer_status_code(&err.to_string());
    HttpError::new(code, infer_error_tag(code))
}

/// Walks `err` and its `source()` chain looking for a `T`.
pub fn find_in_chain<'a, T: Error + 'static>(err: &'a (dyn Error + Send + Sync + 'static)) -> Option<&'a T> {
    let err: &'a (dyn Error + 'static) = err;
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<T>() {
            return Some(found);
        }
        current = e.source();
    }
    None
}

fn from_extract_error(err: &ExtractError) -> HttpError {
    match err.kind() {
        ExtractErrorKind::BodyRead => {
            HttpError::new(500, "internal_server_error").with_message("unable to process request")
        }
        ExtractErrorKind::EmptyBody => HttpError::new(400, "empty_body").with_message(err.message()),
        ExtractErrorKind::FormParse => HttpError::new(400, "invalid_form").with_message(err.message()),
        ExtractErrorKind::PathConversion => HttpError::new(400, "invalid_path_parameter").with_message(err.message()),
        ExtractErrorKind::MissingPath => HttpError::new(400, "missing_path_parameter").with_message(err.message()),
        ExtractErrorKind::Validation => HttpError::new(400, "validation_failed").with_message(err.message()),
        ExtractErrorKind::Other(kind) => HttpError::new(400, kind.to_string()).with_message(err.message()),
    }
}

fn from_json_error(err: &serde_json::Error) -> HttpError {
    match err.classify() {
        Category::Data => HttpError::new(400, "invalid_json_type").with_message(format!(
            "{} (line {}, column {})",
            json_error_description(err),
            err.line(),
            err.column()
        )),
        Category::Syntax | Category::Eof | Category::Io => {
            HttpError::new(400, "invalid_json_syntax").with_message("invalid JSON syntax")
        }
    }
}

// serde_json appends " at line X column Y" to its message, strip it so the position can be
// rendered once.
fn json_error_description(err: &serde_json::Error) -> String {
    let full = err.to_string();
    match full.rfind(" at line ") {
        Some(idx) => full[..idx].to_string(),
        None => full,
    }
}

fn from_schema_error(err: &SchemaError) -> HttpError {
    match err {
        SchemaError::Multi(errors) => {
            let messages =
                errors.iter().map(|(field, field_err)| format!("{field}: {field_err}")).collect::<Vec<_>>();
            HttpError::new(400, "validation_failed").with_message(messages.join("; "))
        }
        SchemaError::Conversion { key, .. } => {
            HttpError::new(400, "conversion_failed").with_message(format!("cannot convert field {key:?}"))
        }
        SchemaError::UnknownKey { key } => {
            HttpError::new(400, "unknown_field").with_message(format!("unknown field: {key}"))
        }
        SchemaError::Custom(message) => HttpError::new(400, "invalid_parameters").with_message(message.clone()),
    }
}

/// Guesses a status code from the wording of an error message.
pub fn infer_status_code(message: &str) -> u16 {
    let lower = message.to_lowercase();
    if lower.contains("not found") {
        404
    } else if lower.contains("unauthorized") {
        401
    } else if lower.contains("forbidden") {
        403
    } else if lower.contains("timeout") {
        408
    } else if lower.contains("bad request") || lower.contains("invalid") {
        400
    } else {
        500
    }
}

/// The canonical tag for a status code produced by [`infer_status_code`].
pub fn infer_error_tag(code: u16) -> &'static str {
    match code {
        400 => "bad_request",
        401 => "unauthorized",
        403 => "forbidden",
        404 => "not_found",
        408 => "timeout",
        _ => "internal_error",
    }
}
