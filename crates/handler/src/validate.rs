//! Payload validation.
//!
//! Payload types describe their own rules by implementing [`Validate`], usually through
//! [`ValidationErrors::check`]. The [`Validator`] installed in the [`Config`](crate::Config)
//! decides how those rules run; [`DefaultValidator`] simply calls [`Validate::validate`].

use crate::error::find_in_chain;
use crate::BoxError;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Field level rules of a payload type.
///
/// The default implementation accepts every value, so types without rules only need an empty
/// `impl Validate for T {}`.
pub trait Validate: Any {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }
}

macro_rules! impl_validate_noop {
    ($($ty:ty),* $(,)?) => {
        $(impl Validate for $ty {})*
    };
}

impl_validate_noop!(
    (), bool, char, String, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    serde_json::Value,
);

impl<T: Validate> Validate for Option<T> {
    fn validate(&self) -> Result<(), ValidationErrors> {
        self.as_ref().map_or(Ok(()), Validate::validate)
    }
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for item in self {
            if let Err(e) = item.validate() {
                errors.extend(e);
            }
        }
        errors.into_result()
    }
}

impl<K: 'static, V: 'static> Validate for HashMap<K, V> {}
impl<K: 'static, V: 'static> Validate for BTreeMap<K, V> {}

/// One violated rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    name: Option<String>,
    struct_field: String,
    tag: String,
    param: Option<String>,
}

impl FieldError {
    /// A violation of rule `tag` on the declared field `struct_field`.
    pub fn new(struct_field: impl Into<String>, tag: impl Into<String>) -> Self {
        Self { name: None, struct_field: struct_field.into(), tag: tag.into(), param: None }
    }

    /// Sets the external facing name of the field, e.g. its JSON or form key.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the rule parameter, e.g. `3` for `min=3`.
    #[must_use]
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    /// The name used in messages, the external name when one was given.
    pub fn field(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.struct_field,
        }
    }

    pub fn struct_field(&self) -> &str {
        &self.struct_field
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn param(&self) -> &str {
        self.param.as_deref().unwrap_or_default()
    }

    /// The human readable message of this violation.
    pub fn message(&self) -> String {
        let field = self.field();
        let param = self.param();
        match self.tag.as_str() {
            "required" => format!("{field} is required"),
            "email" => format!("{field} must be a valid email address"),
            "min" => format!("{field} must be at least {param}"),
            "max" => format!("{field} must be at most {param}"),
            "len" => format!("{field} must be {param} characters long"),
            "gt" => format!("{field} must be greater than {param}"),
            "gte" => format!("{field} must be greater than or equal to {param}"),
            "lt" => format!("{field} must be less than {param}"),
            "lte" => format!("{field} must be less than or equal to {param}"),
            "oneof" => format!("{field} must be one of [{param}]"),
            "url" => format!("{field} must be a valid URL"),
            "uri" => format!("{field} must be a valid URI"),
            "alpha" => format!("{field} must contain only letters"),
            "alphanum" => format!("{field} must contain only letters and numbers"),
            "numeric" => format!("{field} must be numeric"),
            "uuid" => format!("{field} must be a valid UUID"),
            tag => format!("{field} failed validation ({tag})"),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// The violations found in one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", format_field_errors(.0))]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    /// Records `error` unless `valid` holds.
    pub fn check(&mut self, valid: bool, error: FieldError) -> &mut Self {
        if !valid {
            self.push(error);
        }
        self
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<Vec<FieldError>> for ValidationErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    if errors.is_empty() {
        return "validation failed".to_string();
    }
    errors.iter().map(FieldError::message).collect::<Vec<_>>().join("; ")
}

/// The engine that runs validation rules over decoded payloads.
#[cfg_attr(test, mockall::automock)]
pub trait Validator: Send + Sync {
    fn validate(&self, value: &dyn Validate) -> Result<(), BoxError>;
}

/// Runs the rules each payload type declares through [`Validate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidator;

impl Validator for DefaultValidator {
    fn validate(&self, value: &dyn Validate) -> Result<(), BoxError> {
        value.validate().map_err(Into::into)
    }
}

/// Renders a validation engine failure as a message.
///
/// Field level errors are rendered per rule and joined with `"; "`, any other failure uses its
/// `Display` output.
pub(crate) fn format_validation_error(err: &(dyn Error + Send + Sync + 'static)) -> String {
    match find_in_chain::<ValidationErrors>(err) {
        Some(errors) => format_field_errors(&errors.0),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        format_validation_error, DefaultValidator, FieldError, MockValidator, Validate, ValidationErrors, Validator,
    };
    use crate::config::Config;
    use crate::BoxError;
    use std::any::Any;

    #[derive(Debug)]
    struct CreateUser {
        name: String,
        age: u32,
    }

    impl Validate for CreateUser {
        fn validate(&self) -> Result<(), ValidationErrors> {
            let mut errors = ValidationErrors::new();
            errors
                .check(!self.name.is_empty(), FieldError::new("Name", "required").with_name("name"))
                .check(self.age >= 18, FieldError::new("Age", "gte").with_name("age").with_param("18"));
            errors.into_result()
        }
    }

    fn render(err: impl Into<BoxError>) -> String {
        let err: BoxError = err.into();
        format_validation_error(err.as_ref())
    }

    #[test]
    fn test_messages_per_tag() {
        let cases = [
            (FieldError::new("Email", "required"), "Email is required"),
            (FieldError::new("Email", "email"), "Email must be a valid email address"),
            (FieldError::new("Name", "min").with_param("3"), "Name must be at least 3"),
            (FieldError::new("Name", "max").with_param("9"), "Name must be at most 9"),
            (FieldError::new("Pin", "len").with_param("4"), "Pin must be 4 characters long"),
            (FieldError::new("Age", "gt").with_param("0"), "Age must be greater than 0"),
            (FieldError::new("Age", "lte").with_param("130"), "Age must be less than or equal to 130"),
            (FieldError::new("Role", "oneof").with_param("admin user"), "Role must be one of [admin user]"),
            (FieldError::new("Site", "url"), "Site must be a valid URL"),
            (FieldError::new("Code", "alphanum"), "Code must contain only letters and numbers"),
            (FieldError::new("Id", "uuid"), "Id must be a valid UUID"),
            (FieldError::new("Zip", "postcode"), "Zip failed validation (postcode)"),
        ];

        for (error, expected) in cases {
            assert_eq!(error.message(), expected);
        }
    }

    #[test]
    fn test_external_name_preferred() {
        let error = FieldError::new("UserName", "required").with_name("user_name");
        assert_eq!(error.field(), "user_name");
        assert_eq!(error.struct_field(), "UserName");

        let error = FieldError::new("UserName", "required").with_name("");
        assert_eq!(error.field(), "UserName");
    }

    #[test]
    fn test_format_joins_fields() {
        let err = CreateUser { name: String::new(), age: 3 }.validate().unwrap_err();
        assert_eq!(render(err), "name is required; age must be greater than or equal to 18");
    }

    #[test]
    fn test_format_empty_and_foreign_errors() {
        assert_eq!(render(ValidationErrors::new()), "validation failed");
        assert_eq!(render("rule engine crashed"), "rule engine crashed");
    }

    #[test]
    fn test_containers_validate_elements() {
        let users = vec![CreateUser { name: "ann".into(), age: 30 }, CreateUser { name: String::new(), age: 30 }];
        let err = users.validate().unwrap_err();
        assert_eq!(err.errors().len(), 1);

        assert!(None::<CreateUser>.validate().is_ok());
        assert!(42_i64.validate().is_ok());
    }

    #[test]
    fn test_default_validator() {
        assert!(DefaultValidator.validate(&CreateUser { name: "ann".into(), age: 30 }).is_ok());
        assert!(DefaultValidator.validate(&CreateUser { name: "ann".into(), age: 3 }).is_err());
    }

    #[test]
    fn test_custom_validator_can_downcast() {
        let mut validator = MockValidator::new();
        validator.expect_validate().times(1).returning(|value: &dyn Validate| {
            let any: &dyn Any = value;
            match any.downcast_ref::<CreateUser>() {
                Some(user) if user.name == "root" => Err("reserved name".into()),
                _ => Ok(()),
            }
        });

        let config = Config::default().with_validator(validator);
        let err = config.validate(&CreateUser { name: "root".into(), age: 40 }).unwrap_err();
        assert_eq!(err.to_string(), "reserved name");
    }
}
