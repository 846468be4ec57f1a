//! Turn plain async functions into HTTP handlers.
//!
//! Parameters are typed extractors ([`extract::Json`], [`extract::Query`], [`extract::Form`],
//! [`extract::Path`]) or the raw [`ResponseWriter`] / [`RequestContext`]. Return values are
//! written according to their type: text, HTML, bytes, JSON, a status code, a stream, an
//! [`Outcome`] envelope, or an error that becomes an [`HttpError`] envelope.
//!
//! ```no_run
//! use micro_handler::extract::{Json, Path};
//! use micro_handler::router::{get, post};
//! use micro_handler::{handler_fn, HttpError, Outcome, Router, Validate};
//!
//! #[derive(serde::Deserialize, serde::Serialize)]
//! struct User {
//!     name: String,
//! }
//!
//! impl Validate for User {}
//!
//! async fn get_user(id: Path<u64>) -> Result<Json<User>, HttpError> {
//!     Err(HttpError::not_found(format!("user {} not found", *id)))
//! }
//!
//! async fn create_user(user: Json<User>) -> Outcome<Json<User>> {
//!     Outcome::ok(user).with_code(201)
//! }
//!
//! let router = Router::builder()
//!     .route("/users/{id}", get(handler_fn(get_user)))
//!     .route("/users", post(handler_fn(create_user)))
//!     .build();
//! ```

mod body;
mod error;
mod fn_trait;
mod handler;
mod request;
mod responder;
mod schema;
mod validate;
mod writer;

pub mod config;
pub mod extract;
pub mod router;

/// The error type failures travel as between extractors, handlers and the error envelope.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use body::OptionReqBody;
pub use body::ResponseBody;
pub use config::Config;
pub use error::{find_in_chain, handle_error, infer_error_tag, infer_status_code, to_http_error, HttpError};
pub use fn_trait::FnTrait;
pub use handler::{extract_pattern_names, handler_fn, FnHandler, HandlerDescriptor, RequestHandler};
pub use request::RequestContext;
pub use responder::{Html, Outcome, Reader, Reply, ReplyKind, Respond, ReturnShape};
pub use router::Router;
pub use schema::{SchemaDecoder, SchemaError};
pub use validate::{DefaultValidator, FieldError, Validate, ValidationErrors, Validator};
pub use writer::{write_headers, ResponseWriter};
