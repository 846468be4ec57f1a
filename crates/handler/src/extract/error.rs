//! Failures raised while extracting handler parameters from a request.

use crate::BoxError;
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// The kind of an [`ExtractError`].
///
/// The built-in kinds map to fixed status/tag pairs when the error is turned into a response,
/// [`ExtractErrorKind::Other`] lets custom extractors pick their own tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractErrorKind {
    BodyRead,
    EmptyBody,
    FormParse,
    PathConversion,
    MissingPath,
    Validation,
    Other(Cow<'static, str>),
}

impl ExtractErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::BodyRead => "body_read_error",
            Self::EmptyBody => "empty_body",
            Self::FormParse => "form_parse_error",
            Self::PathConversion => "path_conversion_error",
            Self::MissingPath => "missing_path_value",
            Self::Validation => "validation_error",
            Self::Other(kind) => kind,
        }
    }
}

impl fmt::Display for ExtractErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExtractError {
    kind: ExtractErrorKind,
    field: Option<String>,
    value: Option<String>,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ExtractError {
    /// Creates a failure of an arbitrary kind, mostly useful for custom extractors.
    pub fn new(kind: ExtractErrorKind, message: impl Into<String>) -> Self {
        Self { kind, field: None, value: None, message: message.into(), source: None }
    }

    pub fn other(kind: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self::new(ExtractErrorKind::Other(kind.into()), message)
    }

    pub fn body_read(source: impl Into<BoxError>) -> Self {
        Self::new(ExtractErrorKind::BodyRead, "failed to read request body").with_source(source)
    }

    pub fn empty_body() -> Self {
        Self::new(ExtractErrorKind::EmptyBody, "request body is required")
    }

    pub fn form_parse(source: impl Into<BoxError>) -> Self {
        Self::new(ExtractErrorKind::FormParse, "invalid form data format").with_source(source)
    }

    pub fn path_conversion(field: &str, value: &str, target: &str, source: impl Into<BoxError>) -> Self {
        Self::new(
            ExtractErrorKind::PathConversion,
            format!("invalid path parameter {field:?}: cannot convert {value:?} to {target}"),
        )
        .with_field(field)
        .with_value(value)
        .with_source(source)
    }

    pub fn missing_path(field: &str) -> Self {
        Self::new(ExtractErrorKind::MissingPath, format!("missing required path parameter: {field}")).with_field(field)
    }

    /// Wraps a validation engine failure, rendering field errors into a readable message.
    pub fn validation(source: BoxError) -> Self {
        let message = crate::validate::format_validation_error(source.as_ref());
        Self { kind: ExtractErrorKind::Validation, field: None, value: None, message, source: Some(source) }
    }

    pub fn unsupported_type(field: &str, type_name: &str) -> Self {
        Self::other("unsupported_type", format!("unsupported path parameter type: {type_name}")).with_field(field)
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> &ExtractErrorKind {
        &self.kind
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::{ExtractError, ExtractErrorKind};
    use std::error::Error;

    #[test]
    fn test_path_conversion_carries_details() {
        let cause = "abc".parse::<i32>().unwrap_err();
        let err = ExtractError::path_conversion("id", "abc", "int", cause);

        assert_eq!(err.kind(), &ExtractErrorKind::PathConversion);
        assert_eq!(err.field(), Some("id"));
        assert_eq!(err.value(), Some("abc"));
        assert_eq!(err.to_string(), r#"invalid path parameter "id": cannot convert "abc" to int"#);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_missing_path_message() {
        let err = ExtractError::missing_path("slug");
        assert_eq!(err.kind().as_str(), "missing_path_value");
        assert_eq!(err.message(), "missing required path parameter: slug");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_other_kind_keeps_tag() {
        let err = ExtractError::other("token_expired", "token has expired");
        assert_eq!(err.kind(), &ExtractErrorKind::Other("token_expired".into()));
        assert_eq!(err.kind().to_string(), "token_expired");
    }
}
