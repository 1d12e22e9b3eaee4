use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use httpnock::{InterceptingClient, Transport, TransportError};
use std::sync::{Arc, Mutex, MutexGuard};

lazy_static! {
    static ref TEST_LOCK: Mutex<()> = Mutex::new(());
}

/// The registry is process-wide, so tests touching it run one at a time. The returned guard
/// must be held for the whole test.
pub fn setup() -> MutexGuard<'static, ()> {
    let guard = TEST_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    let _ = env_logger::try_init();

    httpnock::recorder::stop();
    httpnock::recorder::clear();
    httpnock::clean_all();
    httpnock::enable_net_connect();
    httpnock::activate();

    guard
}

/// Stands in for the network. Answers every request with the same response and remembers what
/// it was asked for.
pub struct FakeNetwork {
    status: u16,
    body: String,
    calls: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub fn new(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            status,
            body: body.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeNetwork {
    async fn send(&self, req: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", req.method(), req.uri()));

        Response::builder()
            .status(self.status)
            .header("x-served-by", "network")
            .body(Bytes::from(self.body.clone()))
            .map_err(|err| TransportError::Other(err.to_string()))
    }
}

pub fn client(network: &Arc<FakeNetwork>) -> InterceptingClient<Arc<FakeNetwork>> {
    InterceptingClient::with_transport(network.clone())
}

pub fn get(url: &str) -> Request<Bytes> {
    request("GET", url, &[], "")
}

pub fn request(method: &str, url: &str, headers: &[(&str, &str)], body: &str) -> Request<Bytes> {
    let mut builder = Request::builder().method(method).uri(url);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Bytes::from(body.to_string())).unwrap()
}

pub fn body_string(res: &Response<Bytes>) -> String {
    String::from_utf8(res.body().to_vec()).unwrap()
}
