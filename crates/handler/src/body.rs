use crate::BoxError;
use bytes::Bytes;
use http_body::Body as HttpBody;
use http_body::{Frame, SizeHint};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Collected, Limited};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::Mutex;

/// The type-erased request body handed over by the transport.
pub type ReqBody = BoxBody<Bytes, BoxError>;

/// A shared, take-once handle over the request body.
///
/// Every extractor of a request sees the same handle; the first one that reads the body
/// drains it, later readers observe an empty body.
#[derive(Clone)]
pub struct OptionReqBody {
    inner: Arc<Mutex<Option<ReqBody>>>,
}

impl std::fmt::Debug for OptionReqBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionReqBody").finish_non_exhaustive()
    }
}

impl From<ReqBody> for OptionReqBody {
    fn from(body: ReqBody) -> Self {
        OptionReqBody { inner: Arc::new(Mutex::new(Some(body))) }
    }
}

impl OptionReqBody {
    /// Wraps any `http_body::Body` whose data and error types can be erased.
    pub fn from_body<B>(body: B) -> Self
    where
        B: HttpBody + Send + Sync + 'static,
        B::Data: Into<Bytes>,
        B::Error: Into<BoxError>,
    {
        let body: ReqBody = body.map_frame(|frame| frame.map_data(Into::into)).map_err(Into::into).boxed();
        Self::from(body)
    }

    /// Reads the whole body into memory.
    ///
    /// A body already drained by an earlier reader yields empty bytes.
    pub async fn read_all(&self) -> Result<Bytes, BoxError> {
        let mut guard = self.inner.lock().await;
        match guard.take() {
            Some(body) => Ok(body.collect().await?.to_bytes()),
            None => Ok(Bytes::new()),
        }
    }

    /// Reads the whole body into memory, failing with a [`LengthLimitError`] as soon as more
    /// than `limit` bytes arrive.
    ///
    /// [`LengthLimitError`]: http_body_util::LengthLimitError
    pub async fn read_all_limited(&self, limit: usize) -> Result<Bytes, BoxError> {
        let mut guard = self.inner.lock().await;
        match guard.take() {
            Some(body) => {
                let collect: Pin<Box<dyn Future<Output = Result<Collected<Bytes>, BoxError>> + Send>> =
                    Box::pin(Limited::new(body, limit).collect());
                Ok(collect.await?.to_bytes())
            }
            None => Ok(Bytes::new()),
        }
    }
}

/// The body of a response produced by the adapter.
#[derive(Debug)]
pub struct ResponseBody {
    inner: Option<Bytes>,
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { inner: None }
    }

    pub fn once(bytes: Bytes) -> Self {
        if bytes.is_empty() { Self::empty() } else { Self { inner: Some(bytes) } }
    }

    /// Returns the buffered bytes without consuming the body as a stream.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_deref().unwrap_or_default()
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Poll::Ready(self.get_mut().inner.take().map(|bytes| Ok(Frame::data(bytes))))
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            None => SizeHint::with_exact(0),
            Some(bytes) => SizeHint::with_exact(bytes.len() as u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::body::{OptionReqBody, ResponseBody};
    use bytes::Bytes;
    use http_body::Body as HttpBody;
    use futures::StreamExt;
    use http_body::Frame;
    use http_body_util::{BodyExt, Full, LengthLimitError, StreamBody};
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn check_send<T: Send>() {}

    #[test]
    fn is_send() {
        check_send::<ResponseBody>();
        check_send::<OptionReqBody>();
    }

    #[tokio::test]
    async fn test_string_body() {
        let s = "Hello world".to_string();
        let len = s.len() as u64;

        let mut body = ResponseBody::once(Bytes::from(s));

        assert_eq!(body.size_hint().exact(), Some(len));
        assert!(!body.is_end_stream());

        let bytes = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(bytes, Bytes::from("Hello world"));

        assert!(body.is_end_stream());
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_body() {
        let mut body = ResponseBody::once(Bytes::new());

        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));

        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn test_req_body_is_drained_once() {
        let body = OptionReqBody::from_body(Full::new(Bytes::from_static(b"payload")));
        let other = body.clone();

        assert_eq!(body.read_all().await.unwrap(), Bytes::from_static(b"payload"));
        assert!(other.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_limited_read() {
        let body = OptionReqBody::from_body(Full::new(Bytes::from_static(b"0123456789")));
        assert_eq!(body.read_all_limited(10).await.unwrap(), Bytes::from_static(b"0123456789"));

        let body = OptionReqBody::from_body(Full::new(Bytes::from_static(b"0123456789")));
        let err = body.read_all_limited(9).await.unwrap_err();
        assert!(err.is::<LengthLimitError>(), "{err}");
    }

    #[tokio::test]
    async fn test_limited_read_stops_early() {
        let chunks = (0..1024).map(|_| Ok::<_, Infallible>(Frame::data(Bytes::from(vec![b'a'; 1024]))));
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let stream = futures::stream::iter(chunks).inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let body = OptionReqBody::from_body(StreamBody::new(stream));

        let err = body.read_all_limited(4 * 1024).await.unwrap_err();
        assert!(err.is::<LengthLimitError>(), "{err}");
        assert!(pulled.load(Ordering::SeqCst) <= 5, "{}", pulled.load(Ordering::SeqCst));
    }
}
