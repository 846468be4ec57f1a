use crate::extract::Extractor;
use crate::writer::ResponseWriter;
use crate::{BoxError, RequestContext};
use async_trait::async_trait;

/// How a handler parameter is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Decoded by an [`Extractor`], `keyed` ones consume a path parameter name.
    Extractor { keyed: bool },
    /// The response writer of the request.
    ResponseWriter,
    /// The raw request.
    Request,
}

/// Everything a handler can take as a parameter.
#[async_trait]
pub trait FromRequest: Sized + Send {
    const KIND: ParamKind;

    async fn from_request(req: &RequestContext, writer: &ResponseWriter, key: Option<String>) -> Result<Self, BoxError>;
}

#[async_trait]
impl<E: Extractor> FromRequest for E {
    const KIND: ParamKind = ParamKind::Extractor { keyed: E::KEYED };

    async fn from_request(req: &RequestContext, _writer: &ResponseWriter, key: Option<String>) -> Result<Self, BoxError> {
        E::extract(req, key).await
    }
}

#[async_trait]
impl FromRequest for ResponseWriter {
    const KIND: ParamKind = ParamKind::ResponseWriter;

    async fn from_request(_req: &RequestContext, writer: &ResponseWriter, _key: Option<String>) -> Result<Self, BoxError> {
        Ok(writer.clone())
    }
}

#[async_trait]
impl FromRequest for RequestContext {
    const KIND: ParamKind = ParamKind::Request;

    async fn from_request(req: &RequestContext, _writer: &ResponseWriter, _key: Option<String>) -> Result<Self, BoxError> {
        Ok(req.clone())
    }
}
