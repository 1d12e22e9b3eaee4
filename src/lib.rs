//! `httpnock` intercepts outgoing HTTP requests in tests and answers them from declared
//! expectations, from recorded fixtures, or lets them through to the network.
//!
//! Requests are routed through an [`InterceptingClient`] (or handed to [`intercept`] directly by
//! a custom transport). The process-wide registry looks for a [`Scope`] whose host matches the
//! request and, within it, for the first interceptor whose method, path, query, headers and body
//! match. The matched interceptor produces the response and is consumed; unmatched requests are
//! rejected or passed through according to the net connect policy.
//!
//! # Getting Started
//! ```rust
//! use httpnock::prelude::*;
//!
//! let scope = nock("http://api.example.com")
//!     .get("/users/1")
//!     .reply(200, serde_json::json!({"id": 1, "name": "Ada"}));
//!
//! let client = InterceptingClient::new();
//! let req = http::Request::get("http://api.example.com/users/1")
//!     .body(bytes::Bytes::new())
//!     .unwrap();
//! let res = client.send_blocking(req).unwrap();
//!
//! assert_eq!(res.status(), 200);
//! assert_eq!(res.headers()["content-type"], "application/json");
//! scope.done();
//! ```
//!
//! # Matching
//! * Scopes are searched in registration order, interceptors in insertion order, and the first
//!   match wins.
//! * An interceptor matches once by default. Use [`Interceptor::times`] for more, or
//!   [`Interceptor::persist`] / [`Scope::persist`] for unlimited matches.
//! * Paths, query values and header values accept literals, [`Regex`]es or predicates
//!   ([`ValueMatcher`]). A `?` in a literal path defines the expected query.
//! * Request bodies are matched literally, structurally as JSON (form-encoded bodies included),
//!   by regex or by predicate ([`BodyMatcher`]).
//!
//! # Unmatched requests
//! * A request to a host without any scope passes through while net connect is enabled.
//! * [`disable_net_connect`] rejects every unmatched request with
//!   [`Error::NetConnectNotAllowed`]; [`enable_net_connect_for`] re-allows single hosts.
//! * A request to a mocked host that matches nothing fails with [`Error::NoMatch`], unless the
//!   scope was created with [`NockOptions::allow_unmocked`].
//!
//! # Verifying
//! Scopes stay registered until [`clean_all`] is called. [`Scope::done`] and [`is_done`] check
//! that every non-persistent, non-optional interceptor was used; [`pending_mocks`] lists those
//! that were not.
//!
//! # Recording and fixtures
//! The [`recorder`] captures real traffic as [`FixtureDefinition`]s, [`define`] and [`load`]
//! turn definitions (or fixture files) back into scopes, and [`back`] combines both into
//! record-once, replay-forever sessions.
//!
//! # Configuration
//! * `NOCK_OFF=true` starts with interception detached (see [`restore`] and [`activate`]).
//! * `NOCK_BACK_MODE` and `NOCK_BACK_FIXTURES` set the initial [`back`] mode and fixtures
//!   directory.
//! * The `https` feature lets the default transport reach HTTPS hosts on passthrough.
#[macro_use]
extern crate lazy_static;

mod api;
mod common;
mod engine;

use crate::engine::{state::StateManager, REGISTRY};

pub use crate::{
    api::{
        back, define, intercept, load, load_defs, nock, nock_with_options, recorder,
        InterceptingClient, Interceptor, Scope,
    },
    common::{
        data::{
            FixtureDefinition, FixtureHeaderValue, HttpRequest, MockResponse, NetLocation,
            NockRegex,
        },
        error::{Error, InjectedError},
        http::{HyperTransport, Transport, TransportError},
        util::Join,
    },
    engine::{
        definition::{HostSpec, NockOptions},
        matchers::{
            transformers::RequestFilter,
            values::{BodyMatcher, QueryMatcher, ValueMatcher},
        },
        response::{Delay, HeaderValueSource, PendingResponse, Reply, ReplyBody, ReplyCallback},
        state::{Interception, InterceptorSelector},
    },
};
pub use regex::Regex;

/// Rejects every request that matches no interceptor, including requests to hosts without any
/// scope.
pub fn disable_net_connect() {
    tracing::debug!("Disabling net connect");
    REGISTRY.disable_net_connect();
}

/// Lets unmatched requests reach the network again.
pub fn enable_net_connect() {
    tracing::debug!("Enabling net connect");
    REGISTRY.enable_net_connect(None);
}

/// Allows unmatched requests to one host while net connect stays disabled for the rest.
///
/// Literals are compared against `hostname` and `hostname:port`; regexes and predicates are
/// evaluated against `hostname:port`. Has no effect while net connect is fully enabled.
pub fn enable_net_connect_for<H: Into<ValueMatcher>>(host: H) {
    let host = host.into();
    tracing::debug!("Enabling net connect for {}", host);
    REGISTRY.enable_net_connect(Some(host));
}

/// Removes every scope and re-enables net connect.
pub fn clean_all() {
    REGISTRY.reset();
}

/// Detaches interception: every request passes through and nothing is recorded.
pub fn restore() {
    tracing::debug!("Detaching interception");
    REGISTRY.restore();
}

/// Re-attaches interception after [`restore`].
pub fn activate() {
    tracing::debug!("Attaching interception");
    REGISTRY.activate();
}

pub fn is_active() -> bool {
    REGISTRY.is_active()
}

/// `true` when no scope has pending interceptors.
pub fn is_done() -> bool {
    REGISTRY.pending_mocks().is_empty()
}

/// Descriptors (`"GET http://a.com:80/x"`) of every interceptor still expecting requests.
pub fn pending_mocks() -> Vec<String> {
    REGISTRY.pending_mocks()
}

/// Descriptors of every interceptor that can still match, persistent ones included.
pub fn active_mocks() -> Vec<String> {
    REGISTRY.active_mocks()
}

/// Removes the first interceptor selected by host, path and method. Returns whether one was removed.
pub fn remove_interceptor(selector: &InterceptorSelector) -> bool {
    REGISTRY.remove_interceptor(selector)
}

/// Fails every response that was matched but not yet delivered with [`Error::Aborted`].
pub fn abort_pending_requests() {
    REGISTRY.abort_pending();
}

pub mod prelude {
    #[doc(no_inline)]
    pub use crate::{
        clean_all, disable_net_connect, enable_net_connect, enable_net_connect_for, nock,
        nock_with_options, BodyMatcher, Error, HttpRequest, InterceptingClient, Interception,
        NockOptions, QueryMatcher, Regex, Reply, ReplyBody, Scope, ValueMatcher,
    };
}
