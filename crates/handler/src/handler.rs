//! Adapts plain async functions into request handlers.
//!
//! [`handler_fn`] inspects the parameter and return types of a function once, when it is wrapped.
//! Each request then extracts the parameters left to right, calls the function and writes
//! whatever it returned:
//!
//! ```no_run
//! # use micro_handler::extract::{Json, Path};
//! # use micro_handler::{handler_fn, HttpError};
//! # #[derive(serde::Serialize)]
//! # struct User { id: i64 }
//! async fn get_user(id: Path<i64>) -> Result<Json<User>, HttpError> {
//!     match *id {
//!         999 => Err(HttpError::not_found("no such user")),
//!         id => Ok(Json(User { id })),
//!     }
//! }
//!
//! let handler = handler_fn(get_user);
//! ```

mod descriptor;
mod pattern;

pub use descriptor::HandlerDescriptor;
pub use pattern::extract_pattern_names;

use crate::body::ResponseBody;
use crate::config::Config;
use crate::error::handle_error;
use crate::extract::{HandlerArgs, PathKeys};
use crate::fn_trait::FnTrait;
use crate::responder::Reply;
use crate::writer::ResponseWriter;
use crate::RequestContext;
use async_trait::async_trait;
use http::Response;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error};

#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, req: RequestContext) -> Response<ResponseBody>;
}

/// a `FnTrait` holder which represents any async Fn, together with its descriptor
pub struct FnHandler<F, Args> {
    f: F,
    descriptor: HandlerDescriptor,
    config: Option<Arc<Config>>,
    _phantom: PhantomData<fn(Args)>,
}

impl<F, Args> FnHandler<F, Args>
where
    F: FnTrait<Args>,
    Args: HandlerArgs,
    F::Output: Reply,
{
    fn new(f: F) -> Self {
        let descriptor = HandlerDescriptor::of::<Args, F::Output>();
        descriptor.validate();
        crate::config::current().log(|| {
            debug!(params = ?descriptor.params(), returns = ?descriptor.returns(), "wrapped handler function");
        });
        Self { f, descriptor, config: None, _phantom: PhantomData }
    }
}

impl<F, Args> FnHandler<F, Args> {
    /// Pins `config` for this handler instead of reading the process-wide one per request.
    #[must_use]
    pub fn with_config(mut self, config: Arc<Config>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }
}

impl<F, Args> fmt::Debug for FnHandler<F, Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler")
            .field("handler", &std::any::type_name::<F>())
            .field("descriptor", &self.descriptor)
            .field("config", &self.config)
            .finish()
    }
}

/// Wraps an async function into a [`RequestHandler`].
///
/// # Panics
///
/// Panics when the return type is a `Result` whose data slot is an error, an
/// [`Outcome`](crate::Outcome) or another `Result`.
pub fn handler_fn<F, Args>(f: F) -> FnHandler<F, Args>
where
    F: FnTrait<Args>,
    Args: HandlerArgs,
    F::Output: Reply,
{
    FnHandler::new(f)
}

#[async_trait]
impl<F, Args> RequestHandler for FnHandler<F, Args>
where
    F: FnTrait<Args>,
    Args: HandlerArgs,
    F::Output: Reply,
{
    async fn invoke(&self, req: RequestContext) -> Response<ResponseBody> {
        let req = match &self.config {
            Some(config) => req.with_config(Arc::clone(config)),
            None => req,
        };
        let config = req.config_handle();
        let writer = ResponseWriter::new(Arc::clone(&config));

        let names = extract_pattern_names(req.pattern(), &config);
        let mut keys = PathKeys::new(req.pattern(), names);

        let args = match Args::extract(&req, &writer, &mut keys).await {
            Ok(args) => args,
            Err(e) => {
                if let Err(write_err) = handle_error(&writer, e) {
                    config.log(|| error!(cause = %write_err, "failed to write error response"));
                }
                return writer.into_response();
            }
        };

        let output = self.f.call(args).await;
        if let Err(e) = output.reply(&writer, &req).await {
            config.log(|| error!(cause = %e, "failed to write response"));
        }

        writer.into_response()
    }
}
