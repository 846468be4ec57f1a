//! Typed extraction of handler parameters.
//!
//! Every handler parameter implements [`FromRequest`]. Most of them are [`Extractor`]s: types
//! that decode themselves from the request, such as [`Json`], [`Query`], [`Form`] and [`Path`].
//! The other two parameter kinds hand over the raw capabilities, the
//! [`ResponseWriter`](crate::ResponseWriter) and the [`RequestContext`].
//!
//! # Example
//! ```no_run
//! # use serde::Deserialize;
//! # use micro_handler::extract::{Json, Path};
//! # use micro_handler::Validate;
//! #[derive(Deserialize)]
//! struct Rename {
//!     name: String,
//! }
//!
//! impl Validate for Rename {}
//!
//! async fn rename(id: Path<u64>, Json(body): Json<Rename>) -> String {
//!     format!("renamed {} to {}", id.value, body.name)
//! }
//! ```

mod error;
mod extract_body;
mod extract_tuple;
mod extract_url;
mod from_request;

pub use error::{ExtractError, ExtractErrorKind};
pub use extract_body::MAX_FORM_BODY_SIZE;
pub use extract_tuple::{HandlerArgs, PathKeys};
pub use extract_url::{PathValue, PathValueError};
pub use from_request::{FromRequest, ParamKind};

use crate::{BoxError, RequestContext};
use async_trait::async_trait;

/// A parameter that decodes itself from the request.
///
/// Extractors are created per request and per parameter, in parameter order. The first failing
/// extractor stops the request: its error is written as the response and the handler is not
/// called.
#[async_trait]
pub trait Extractor: Sized + Send {
    /// Whether this extractor consumes a path parameter name.
    ///
    /// Keyed extractors receive the names of the matched route pattern positionally: the first
    /// keyed parameter gets the first name, the second one the second name and so on.
    const KEYED: bool = false;

    /// Decodes the extractor, `key` is set for keyed extractors only.
    async fn extract(req: &RequestContext, key: Option<String>) -> Result<Self, BoxError>;
}

/// The request body as JSON.
///
/// An empty body is rejected, the payload is validated when validation is enabled.
///
/// # Example
/// ```
/// # use serde::Deserialize;
/// # use micro_handler::extract::Json;
/// # use micro_handler::Validate;
/// # #[allow(dead_code, reason = "doc example")]
/// #[derive(Deserialize, Debug)]
/// struct Params {
///     name: String,
///     zip: String,
/// }
///
/// impl Validate for Params {}
///
/// pub async fn handle(Json(params): Json<Params>) -> String {
///     format!("received params: {:?}", params)
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Json<T>(pub T);

/// The url query, decoded by the configured [`SchemaDecoder`](crate::SchemaDecoder).
///
/// Absent keys leave the zero value of their field, unknown keys are ignored by default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query<T>(pub T);

/// Form data: an url encoded body followed by the url query.
///
/// The body is only read for `POST`, `PUT` and `PATCH` requests sent as
/// `application/x-www-form-urlencoded`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Form<T>(pub T);

/// A path parameter of the matched route.
///
/// The parameter is not looked up by the field name but positionally, see
/// [`Extractor::KEYED`]. `key` holds the name it was bound to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path<T> {
    pub value: T,
    pub key: String,
}

macro_rules! impl_into_inner {
    ($($ty:ident),*) => {
        $(
            impl<T> $ty<T> {
                pub fn into_inner(self) -> T {
                    self.0
                }
            }

            impl<T> std::ops::Deref for $ty<T> {
                type Target = T;

                fn deref(&self) -> &T {
                    &self.0
                }
            }
        )*
    };
}

impl_into_inner!(Json, Query, Form);

impl<T> Path<T> {
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> std::ops::Deref for Path<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}
