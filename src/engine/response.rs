use crate::common::{
    data::{HttpRequest, MockResponse},
    error::{Error, InjectedError},
    runtime,
    util::{read_file, resolve_resource_path, Join},
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::future::{self, BoxFuture, Either, FutureExt};
use serde_json::Value;
use std::{
    fmt,
    future::Future,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::oneshot;

const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

// ************************************************************************************************
// ReplyBody
// ************************************************************************************************
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Empty,
    Text(String),
    Binary(Bytes),
    /// Serialized on delivery. Adds `Content-Type: application/json` unless a content type is set.
    Json(Value),
}

impl ReplyBody {
    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        BASE64
            .decode(encoded)
            .map(|bytes| ReplyBody::Binary(Bytes::from(bytes)))
    }

    pub fn to_bytes(&self) -> Bytes {
        match self {
            ReplyBody::Empty => Bytes::new(),
            ReplyBody::Text(text) => Bytes::from(text.clone()),
            ReplyBody::Binary(bytes) => bytes.clone(),
            ReplyBody::Json(value) => Bytes::from(value.to_string()),
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, ReplyBody::Json(_))
    }
}

impl Default for ReplyBody {
    fn default() -> Self {
        ReplyBody::Empty
    }
}

impl From<()> for ReplyBody {
    fn from(_: ()) -> Self {
        ReplyBody::Empty
    }
}

impl From<&str> for ReplyBody {
    fn from(value: &str) -> Self {
        ReplyBody::Text(value.to_string())
    }
}

impl From<String> for ReplyBody {
    fn from(value: String) -> Self {
        ReplyBody::Text(value)
    }
}

impl From<&String> for ReplyBody {
    fn from(value: &String) -> Self {
        ReplyBody::Text(value.clone())
    }
}

impl From<Vec<u8>> for ReplyBody {
    fn from(value: Vec<u8>) -> Self {
        ReplyBody::Binary(Bytes::from(value))
    }
}

impl From<&[u8]> for ReplyBody {
    fn from(value: &[u8]) -> Self {
        ReplyBody::Binary(Bytes::copy_from_slice(value))
    }
}

impl From<Bytes> for ReplyBody {
    fn from(value: Bytes) -> Self {
        ReplyBody::Binary(value)
    }
}

impl From<Value> for ReplyBody {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => ReplyBody::Text(text),
            other => ReplyBody::Json(other),
        }
    }
}

// ************************************************************************************************
// HeaderValueSource
// ************************************************************************************************
pub type HeaderFn = Arc<dyn Fn(&HttpRequest, &[u8]) -> String + Send + Sync>;

/// A reply header value, either fixed or computed from the request and the final response body.
#[derive(Clone)]
pub enum HeaderValueSource {
    Static(String),
    Dynamic(HeaderFn),
}

impl HeaderValueSource {
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&HttpRequest, &[u8]) -> String + Send + Sync + 'static,
    {
        HeaderValueSource::Dynamic(Arc::new(f))
    }

    pub(crate) fn evaluate(&self, req: &HttpRequest, body: &[u8]) -> String {
        match self {
            HeaderValueSource::Static(value) => value.clone(),
            HeaderValueSource::Dynamic(f) => f(req, body),
        }
    }
}

impl fmt::Debug for HeaderValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValueSource::Static(value) => f.debug_tuple("Static").field(value).finish(),
            HeaderValueSource::Dynamic(_) => f.write_str("Dynamic"),
        }
    }
}

impl From<&str> for HeaderValueSource {
    fn from(value: &str) -> Self {
        HeaderValueSource::Static(value.to_string())
    }
}

impl From<String> for HeaderValueSource {
    fn from(value: String) -> Self {
        HeaderValueSource::Static(value)
    }
}

impl From<&String> for HeaderValueSource {
    fn from(value: &String) -> Self {
        HeaderValueSource::Static(value.clone())
    }
}

pub(crate) type HeaderList = Vec<(String, HeaderValueSource)>;

pub(crate) fn header_list<I, K, V>(headers: I) -> HeaderList
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<HeaderValueSource>,
{
    headers
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

// ************************************************************************************************
// Reply
// ************************************************************************************************
/// A status, body and header list produced by an interceptor.
#[derive(Debug, Clone)]
pub struct Reply {
    pub(crate) status: u16,
    pub(crate) body: ReplyBody,
    pub(crate) headers: HeaderList,
}

impl Reply {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            body: ReplyBody::Empty,
            headers: Vec::new(),
        }
    }

    pub fn body<B: Into<ReplyBody>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    pub fn header<K: Into<String>, V: Into<HeaderValueSource>>(mut self, name: K, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<HeaderValueSource>,
    {
        self.headers.extend(header_list(headers));
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }
}

// ************************************************************************************************
// ReplyCallback
// ************************************************************************************************
/// Completion handle passed to callback style reply functions. Dropping it without calling
/// [`reply`](Self::reply) or [`error`](Self::error) fails the request.
pub struct ReplyCallback {
    sender: oneshot::Sender<Result<Reply, InjectedError>>,
}

impl ReplyCallback {
    pub fn reply(self, reply: Reply) {
        self.send(Ok(reply));
    }

    pub fn error<E: Into<InjectedError>>(self, err: E) {
        self.send(Err(err.into()));
    }

    pub fn send(self, result: Result<Reply, InjectedError>) {
        // The receiver is gone when the request was aborted in the meantime.
        let _ = self.sender.send(result);
    }
}

// ************************************************************************************************
// ResponseSpec
// ************************************************************************************************
pub type SyncReplyFn = Arc<dyn Fn(&HttpRequest) -> Reply + Send + Sync>;
pub type CallbackReplyFn = Arc<dyn Fn(&HttpRequest, ReplyCallback) + Send + Sync>;
pub type BodyFn = Arc<dyn Fn(&HttpRequest) -> ReplyBody + Send + Sync>;

#[derive(Clone)]
pub(crate) enum ResponseSpec {
    Static(Reply),
    Function(SyncReplyFn),
    Callback(CallbackReplyFn),
    BodyFunction {
        status: u16,
        body: BodyFn,
        headers: HeaderList,
    },
    /// Read lazily on delivery.
    File {
        status: u16,
        path: PathBuf,
        headers: HeaderList,
    },
    Error(InjectedError),
}

impl ResponseSpec {
    /// Brings every calling convention into one shape: a future resolving to the reply.
    pub(crate) fn produce(&self, req: &HttpRequest) -> BoxFuture<'static, Result<Reply, Error>> {
        match self {
            ResponseSpec::Static(reply) => future::ready(Ok(reply.clone())).boxed(),
            ResponseSpec::Function(f) => future::ready(Ok(f(req))).boxed(),
            ResponseSpec::BodyFunction {
                status,
                body,
                headers,
            } => future::ready(Ok(Reply {
                status: *status,
                body: body(req),
                headers: headers.clone(),
            }))
            .boxed(),
            ResponseSpec::Callback(f) => {
                let (sender, receiver) = oneshot::channel();
                f(req, ReplyCallback { sender });
                async move {
                    match receiver.await {
                        Ok(result) => result.map_err(Error::Injected),
                        Err(_) => Err(Error::ResponseBuild(
                            "reply callback was dropped without responding".to_string(),
                        )),
                    }
                }
                .boxed()
            }
            ResponseSpec::File {
                status,
                path,
                headers,
            } => {
                let result = resolve_resource_path(path)
                    .and_then(|path| {
                        read_file(&path)
                            .map_err(|e| format!("cannot read {}: {}", path.display(), e))
                    })
                    .map(|content| Reply {
                        status: *status,
                        body: ReplyBody::Binary(Bytes::from(content)),
                        headers: headers.clone(),
                    })
                    .map_err(Error::ResponseBuild);
                future::ready(result).boxed()
            }
            ResponseSpec::Error(err) => future::ready(Err(Error::Injected(err.clone()))).boxed(),
        }
    }
}

impl fmt::Debug for ResponseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseSpec::Static(reply) => f.debug_tuple("Static").field(reply).finish(),
            ResponseSpec::Function(_) => f.write_str("Function"),
            ResponseSpec::Callback(_) => f.write_str("Callback"),
            ResponseSpec::BodyFunction { status, .. } => {
                f.debug_struct("BodyFunction").field("status", status).finish()
            }
            ResponseSpec::File { status, path, .. } => f
                .debug_struct("File")
                .field("status", status)
                .field("path", path)
                .finish(),
            ResponseSpec::Error(err) => f.debug_tuple("Error").field(err).finish(),
        }
    }
}

// ************************************************************************************************
// Delay
// ************************************************************************************************
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Delay {
    /// Before the response is produced.
    pub connection: Option<Duration>,
    /// Between producing the response and delivering it.
    pub response: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ReplyDate {
    Now,
    Fixed(DateTime<Utc>),
}

impl ReplyDate {
    fn render(&self) -> String {
        let date = match self {
            ReplyDate::Now => Utc::now(),
            ReplyDate::Fixed(date) => *date,
        };
        date.format(DATE_FORMAT).to_string()
    }
}

// ************************************************************************************************
// ResponseTemplate
// ************************************************************************************************
/// Everything needed to deliver a response, snapshotted from the interceptor and its scope at
/// match time.
#[derive(Debug, Clone)]
pub(crate) struct ResponseTemplate {
    pub spec: ResponseSpec,
    pub default_headers: HeaderList,
    pub content_length: bool,
    pub date: Option<ReplyDate>,
    pub delay: Delay,
}

impl ResponseTemplate {
    /// Header precedence, lowest first: scope defaults, reply headers, `Content-Length`, `Date`.
    pub(crate) fn finalize(&self, reply: Reply, req: &HttpRequest) -> MockResponse {
        let body = reply.body.to_bytes();

        let reply_headers: Vec<(String, String)> = reply
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.evaluate(req, &body)))
            .collect();

        let mut headers: Vec<(String, String)> = self
            .default_headers
            .iter()
            .filter(|(name, _)| !reply_headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name)))
            .map(|(k, v)| (k.clone(), v.evaluate(req, &body)))
            .collect();
        headers.extend(reply_headers);

        if reply.body.is_json() && !has_header(&headers, "content-type") {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        if self.content_length {
            set_header(&mut headers, "Content-Length", body.len().to_string());
        }

        if let Some(date) = &self.date {
            set_header(&mut headers, "Date", date.render());
        }

        MockResponse {
            status: reply.status,
            headers,
            body,
        }
    }
}

fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    headers.push((name.to_string(), value));
}

// ************************************************************************************************
// PendingResponse
// ************************************************************************************************
/// Identifies the abort generation a response was issued in.
#[derive(Debug, Clone)]
pub(crate) struct Liveness {
    generation: Arc<AtomicUsize>,
    issued: usize,
}

impl Liveness {
    pub(crate) fn new(generation: Arc<AtomicUsize>) -> Self {
        let issued = generation.load(Ordering::SeqCst);
        Self { generation, issued }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.issued
    }
}

/// A response that has been matched and will be delivered once its delays elapse.
///
/// Resolution order: connection delay, build the reply, response delay, deliver. If pending
/// requests are aborted during any wait, resolution ends with [`Error::Aborted`] and nothing is
/// delivered.
#[derive(Debug)]
pub struct PendingResponse {
    request: HttpRequest,
    template: ResponseTemplate,
    liveness: Liveness,
}

impl PendingResponse {
    pub(crate) fn new(request: HttpRequest, template: ResponseTemplate, liveness: Liveness) -> Self {
        Self {
            request,
            template,
            liveness,
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn delay(&self) -> Delay {
        self.template.delay
    }

    pub async fn resolve(self) -> Result<MockResponse, Error> {
        runtime::sleep_opt(self.template.delay.connection).await;
        self.ensure_alive()?;

        let reply = self.template.spec.produce(&self.request).await;

        // Injected errors are delayed like regular responses.
        runtime::sleep_opt(self.template.delay.response).await;
        self.ensure_alive()?;

        let reply = reply?;
        tracing::debug!(
            "delivering {} response for {} {}",
            reply.status,
            self.request.method_str(),
            self.request.url()
        );
        Ok(self.template.finalize(reply, &self.request))
    }

    /// Resolves unless `abort` completes first, in which case [`Error::Aborted`] is returned.
    pub async fn resolve_until<F>(self, abort: F) -> Result<MockResponse, Error>
    where
        F: Future<Output = ()> + Send,
    {
        let resolution = self.resolve().boxed();
        let abort = abort.boxed();
        match future::select(resolution, abort).await {
            Either::Left((result, _)) => result,
            Either::Right(_) => Err(Error::Aborted),
        }
    }

    pub fn resolve_blocking(self) -> Result<MockResponse, Error> {
        self.resolve().join()
    }

    fn ensure_alive(&self) -> Result<(), Error> {
        match self.liveness.is_alive() {
            true => Ok(()),
            false => Err(Error::Aborted),
        }
    }
}
