//! Response writing primitives.
//!
//! [`RawResponse`] is the buffering transport writer: a status line, a header map and a body
//! buffer that turn into an `http::Response` once the request is done. [`ResponseWriter`]
//! decorates it and remembers which status was committed, so that a second attempt to set a
//! status can neither overwrite nor corrupt the first one.

use crate::body::ResponseBody;
use crate::config::Config;
use bytes::BytesMut;
use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

pub const APPLICATION_JSON_UTF_8: HeaderValue = HeaderValue::from_static("application/json; charset=utf-8");
pub const TEXT_PLAIN_UTF_8: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
pub const TEXT_HTML_UTF_8: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");
pub const APPLICATION_OCTET_STREAM: HeaderValue = HeaderValue::from_static("application/octet-stream");

/// The raw, buffering response writer of the transport.
#[derive(Debug, Default)]
pub struct RawResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl RawResponse {
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn write_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    pub fn write(&mut self, buf: &[u8]) {
        self.body.extend_from_slice(buf);
    }

    pub fn into_response(self) -> Response<ResponseBody> {
        let mut response = Response::new(ResponseBody::once(self.body.freeze()));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

#[derive(Debug, Default)]
struct WriterState {
    raw: RawResponse,
    status: u16,
    committed: bool,
}

/// A shared handle over the response of one request.
///
/// Clones refer to the same response, which lets a handler take the writer as a parameter while
/// the adapter keeps its own handle to finish the response afterwards.
#[derive(Clone)]
pub struct ResponseWriter {
    inner: Arc<Mutex<WriterState>>,
    config: Arc<Config>,
}

impl ResponseWriter {
    pub fn new(config: Arc<Config>) -> Self {
        Self { inner: Arc::new(Mutex::new(WriterState::default())), config }
    }

    /// The configuration in effect for the request this writer belongs to.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn config_handle(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Whether a status has been committed, explicitly or by a body write.
    pub fn is_committed(&self) -> bool {
        self.lock().committed
    }

    /// The committed status, `None` until the first commit.
    pub fn status(&self) -> Option<u16> {
        let state = self.lock();
        state.committed.then_some(state.status)
    }

    /// Commits `code` as the response status.
    ///
    /// Only the first commit counts, later calls are logged and ignored. `0` means 200.
    pub fn write_status(&self, code: u16) {
        let mut state = self.lock();
        if state.committed {
            let original = state.status;
            drop(state);
            self.config.log(|| {
                warn!(original, new = code, "multiple calls to write_status, keeping the first committed status");
            });
            return;
        }
        self.commit(&mut state, code);
    }

    /// Appends `buf` to the body, committing 200 first when no status was set yet.
    pub fn write_body(&self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if !state.committed {
            self.commit(&mut state, 200);
        }
        state.raw.write(buf);
        Ok(buf.len())
    }

    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        self.lock().raw.headers_mut().insert(name, value);
    }

    pub fn append_header(&self, name: HeaderName, value: HeaderValue) {
        self.lock().raw.headers_mut().append(name, value);
    }

    /// Runs `f` against the response headers.
    pub fn with_headers<R>(&self, f: impl FnOnce(&mut HeaderMap) -> R) -> R {
        f(self.lock().raw.headers_mut())
    }

    /// Finishes the response, leaving an empty one behind for any stray clone.
    pub fn into_response(self) -> Response<ResponseBody> {
        let state = std::mem::take(&mut *self.lock());
        state.raw.into_response()
    }

    fn commit(&self, state: &mut WriterState, code: u16) {
        let status = self.normalize(code);
        state.status = status.as_u16();
        state.committed = true;
        state.raw.write_status(status);
    }

    fn normalize(&self, code: u16) -> StatusCode {
        if code == 0 {
            return StatusCode::OK;
        }
        match StatusCode::from_u16(code) {
            Ok(status) => status,
            Err(e) => {
                self.config.log(|| warn!(code, cause = %e, "invalid status code, using 500 instead"));
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, WriterState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_body(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ResponseWriter").field("status", &state.status).field("committed", &state.committed).finish()
    }
}

/// Appends every value of `headers` to the response.
pub fn write_headers(writer: &ResponseWriter, headers: &HeaderMap) {
    writer.with_headers(|target| {
        for (name, value) in headers {
            target.append(name.clone(), value.clone());
        }
    });
}
