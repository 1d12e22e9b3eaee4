use crate::{
    common::{
        data::{HttpRequest, MockResponse},
        error::Error,
        http::{HyperTransport, Transport},
        runtime,
    },
    engine::{
        state::{Interception, StateManager},
        REGISTRY,
    },
};
use bytes::Bytes;
use http::{Request, Response};
use std::{convert::TryFrom, sync::Arc};

/// Hands a request to the process-wide registry and returns its decision.
///
/// This is the interception hook transports call before touching the network. Most code uses
/// [`InterceptingClient`] instead.
pub fn intercept(req: HttpRequest) -> Interception {
    REGISTRY.intercept(req)
}

/// An HTTP client whose requests pass through the interception engine before reaching the
/// wrapped [`Transport`].
///
/// Matched requests are answered by their interceptor, rejected requests fail with the
/// rejection [`Error`], and everything else is sent through the transport. While recording is
/// in effect, passthrough exchanges are captured.
pub struct InterceptingClient<T: Transport = HyperTransport> {
    transport: Arc<T>,
}

impl<T: Transport> Clone for InterceptingClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
        }
    }
}

impl InterceptingClient<HyperTransport> {
    pub fn new() -> Self {
        Self::with_transport(HyperTransport::default())
    }
}

impl Default for InterceptingClient<HyperTransport> {
    fn default() -> Self {
        InterceptingClient::new()
    }
}

impl<T: Transport> InterceptingClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn send(&self, req: Request<Bytes>) -> Result<Response<Bytes>, Error> {
        let request = HttpRequest::try_from(&req)?;

        match intercept(request.clone()) {
            Interception::Responded(pending) => pending.resolve().await?.into_http_response(),
            Interception::Rejected(err) => Err(err),
            Interception::Passthrough => {
                let res = self.transport.send(req).await?;
                if REGISTRY.is_recording() {
                    REGISTRY.record(&request, &MockResponse::try_from(&res)?);
                }
                Ok(res)
            }
        }
    }

    /// Blocking version of [`send`](Self::send) for tests without an async runtime.
    pub fn send_blocking(&self, req: Request<Bytes>) -> Result<Response<Bytes>, Error> {
        runtime::block_on_current_thread(self.send(req))
    }
}
