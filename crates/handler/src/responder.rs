//! Response handling module that routes handler return values into the response.
//!
//! The [`Reply`] trait decides how a returned value is written:
//!
//! * `()` and `None` write nothing
//! * types implementing [`Respond`] write the response themselves
//! * errors ([`HttpError`], [`BoxError`]) become the JSON error envelope
//! * an [`Outcome`] applies its headers and status, then writes its error or its data
//! * `Result<T, E>` writes the error when there is one and `T` otherwise
//! * plain data picks a content type: text for strings, HTML for [`Html`], binary for byte
//!   buffers, the raw stream for a [`Reader`], JSON for [`Json`] and `serde_json::Value`
//!
//! A bare [`StatusCode`] only commits the status.

mod outcome;

pub use outcome::Outcome;

use crate::error::{handle_error, HttpError};
use crate::extract::Json;
use crate::writer::{
    ResponseWriter, APPLICATION_JSON_UTF_8, APPLICATION_OCTET_STREAM, TEXT_HTML_UTF_8, TEXT_PLAIN_UTF_8,
};
use crate::{BoxError, RequestContext};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use serde::Serialize;
use std::borrow::Cow;
use tokio::io::{AsyncRead, AsyncReadExt};

/// The category of a returned value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Nothing to write.
    Empty,
    /// Success data picked up by the content type rules.
    Data,
    /// A failure written as the error envelope.
    Error,
    /// An [`Outcome`].
    Envelope,
    /// A value that writes the response itself, see [`Respond`].
    Delegate,
    /// A byte stream copied verbatim.
    Reader,
    /// A `Result`, data and error slot.
    Pair,
}

/// The number and kinds of values a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    None,
    Single(ReplyKind),
    Pair { data: ReplyKind },
}

/// A value a handler can return.
#[async_trait]
pub trait Reply: Sized + Send {
    const KIND: ReplyKind;

    fn shape() -> ReturnShape {
        ReturnShape::Single(Self::KIND)
    }

    /// Writes `self` into the response.
    async fn reply(self, writer: &ResponseWriter, req: &RequestContext) -> Result<(), BoxError>;
}

/// A value that writes the whole response on its own.
///
/// Content type rules are skipped entirely for such values.
#[async_trait]
pub trait Respond: Send {
    async fn respond(self, writer: &ResponseWriter, req: &RequestContext);
}

#[async_trait]
impl<R: Respond> Reply for R {
    const KIND: ReplyKind = ReplyKind::Delegate;

    async fn reply(self, writer: &ResponseWriter, req: &RequestContext) -> Result<(), BoxError> {
        self.respond(writer, req).await;
        Ok(())
    }
}

#[async_trait]
impl Reply for () {
    const KIND: ReplyKind = ReplyKind::Empty;

    fn shape() -> ReturnShape {
        ReturnShape::None
    }

    async fn reply(self, _writer: &ResponseWriter, _req: &RequestContext) -> Result<(), BoxError> {
        Ok(())
    }
}

#[async_trait]
impl<T: Reply> Reply for Option<T> {
    const KIND: ReplyKind = T::KIND;

    async fn reply(self, writer: &ResponseWriter, req: &RequestContext) -> Result<(), BoxError> {
        match self {
            Some(value) => value.reply(writer, req).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<T, E> Reply for Result<T, E>
where
    T: Reply,
    E: Into<BoxError> + Send,
{
    const KIND: ReplyKind = ReplyKind::Pair;

    fn shape() -> ReturnShape {
        ReturnShape::Pair { data: T::KIND }
    }

    async fn reply(self, writer: &ResponseWriter, req: &RequestContext) -> Result<(), BoxError> {
        match self {
            Ok(data) => data.reply(writer, req).await,
            Err(err) => handle_error(writer, err.into()),
        }
    }
}

#[async_trait]
impl Reply for HttpError {
    const KIND: ReplyKind = ReplyKind::Error;

    async fn reply(self, writer: &ResponseWriter, _req: &RequestContext) -> Result<(), BoxError> {
        handle_error(writer, Box::new(self))
    }
}

#[async_trait]
impl Reply for BoxError {
    const KIND: ReplyKind = ReplyKind::Error;

    async fn reply(self, writer: &ResponseWriter, _req: &RequestContext) -> Result<(), BoxError> {
        handle_error(writer, self)
    }
}

#[async_trait]
impl Reply for StatusCode {
    const KIND: ReplyKind = ReplyKind::Data;

    async fn reply(self, writer: &ResponseWriter, _req: &RequestContext) -> Result<(), BoxError> {
        writer.write_status(self.as_u16());
        Ok(())
    }
}

fn write_with_type(writer: &ResponseWriter, content_type: HeaderValue, body: &[u8]) -> Result<(), BoxError> {
    writer.insert_header(CONTENT_TYPE, content_type);
    writer.write_body(body)?;
    Ok(())
}

macro_rules! impl_reply_with_type {
    ($content_type:expr, $view:ty => $($ty:ty),*) => {
        $(
            #[async_trait]
            impl Reply for $ty {
                const KIND: ReplyKind = ReplyKind::Data;

                async fn reply(self, writer: &ResponseWriter, _req: &RequestContext) -> Result<(), BoxError> {
                    let body: &$view = self.as_ref();
                    write_with_type(writer, $content_type, body.as_ref())
                }
            }
        )*
    };
}

impl_reply_with_type!(TEXT_PLAIN_UTF_8, str => String, &'static str, Cow<'static, str>);
impl_reply_with_type!(APPLICATION_OCTET_STREAM, [u8] => Bytes, Vec<u8>, &'static [u8]);

/// Marks text as HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Html<T>(pub T);

#[async_trait]
impl<T: AsRef<str> + Send> Reply for Html<T> {
    const KIND: ReplyKind = ReplyKind::Data;

    async fn reply(self, writer: &ResponseWriter, _req: &RequestContext) -> Result<(), BoxError> {
        write_with_type(writer, TEXT_HTML_UTF_8, self.0.as_ref().as_bytes())
    }
}

/// A byte stream copied into the body as is, no content type is set.
#[derive(Debug)]
pub struct Reader<R>(pub R);

#[async_trait]
impl<R: AsyncRead + Send + Unpin> Reply for Reader<R> {
    const KIND: ReplyKind = ReplyKind::Reader;

    async fn reply(self, writer: &ResponseWriter, _req: &RequestContext) -> Result<(), BoxError> {
        let Reader(mut reader) = self;
        let mut buf = [0u8; 8 * 1024];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            writer.write_body(&buf[..n])?;
        }
    }
}

fn write_json<T: Serialize + ?Sized>(writer: &ResponseWriter, value: &T) -> Result<(), BoxError> {
    writer.insert_header(CONTENT_TYPE, APPLICATION_JSON_UTF_8);
    writer.config().json_encode(&mut writer.clone(), value)
}

#[async_trait]
impl<T: Serialize + Send> Reply for Json<T> {
    const KIND: ReplyKind = ReplyKind::Data;

    async fn reply(self, writer: &ResponseWriter, _req: &RequestContext) -> Result<(), BoxError> {
        write_json(writer, &self.0)
    }
}

#[async_trait]
impl Reply for serde_json::Value {
    const KIND: ReplyKind = ReplyKind::Data;

    async fn reply(self, writer: &ResponseWriter, _req: &RequestContext) -> Result<(), BoxError> {
        write_json(writer, &self)
    }
}
