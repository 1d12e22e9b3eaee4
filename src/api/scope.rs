use crate::{
    api::interceptor::Interceptor,
    common::data::NockRegex,
    engine::{
        definition::{HostSpec, NockOptions, ScopeDefinition},
        matchers::{transformers::RequestFilter, values::ValueMatcher},
        response::{HeaderValueSource, ReplyDate},
        state::StateManager,
        REGISTRY,
    },
};
use chrono::{DateTime, Utc};
use std::{fmt, sync::Arc};

/// Creates a [`Scope`] for a host and registers it with the process-wide registry.
///
/// The host is a URL prefix such as `http://a.com`, `https://a.com:8443` or `a.com` (protocol
/// defaults to `http`), or a [`Regex`](regex::Regex) tested against `proto://host` and
/// `proto://host:port`.
///
/// # Panics
/// Panics if the host specifier cannot be parsed.
///
/// # Example
/// ```rust
/// use httpnock::{nock, intercept, HttpRequest, Interception};
///
/// let scope = nock("http://a.com").get("/users").reply(200, "[]");
///
/// let req = HttpRequest::new("GET", "http://a.com/users", vec![], Default::default()).unwrap();
/// match intercept(req) {
///     Interception::Responded(pending) => {
///         let res = pending.resolve_blocking().unwrap();
///         assert_eq!(res.status, 200);
///         assert_eq!(res.body_string(), "[]");
///     }
///     other => panic!("unexpected result: {:?}", other),
/// }
///
/// scope.done();
/// ```
pub fn nock<H: Into<HostSpec>>(host: H) -> Scope {
    nock_with_options(host, NockOptions::default())
}

/// Like [`nock`], with scope options such as `allow_unmocked`, `reqheaders` and `badheaders`.
pub fn nock_with_options<H: Into<HostSpec>>(host: H, options: NockOptions) -> Scope {
    let definition = ScopeDefinition::new(host.into(), options);
    let id = REGISTRY.add_scope(definition.clone());
    Scope { id, definition }
}

/// A group of interceptors sharing a base location and scope-wide options.
///
/// Scopes stay registered until [`clean_all`](crate::clean_all) is called, so leftover
/// expectations can be asserted with [`done`](Scope::done) at the end of a test. Interceptors
/// added through a handle after `clean_all` register the scope again.
#[derive(Clone)]
pub struct Scope {
    id: usize,
    definition: ScopeDefinition,
}

impl Scope {
    pub(crate) fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn definition(&self) -> &ScopeDefinition {
        &self.definition
    }

    fn update<F: FnOnce(&mut ScopeDefinition)>(mut self, f: F) -> Self {
        f(&mut self.definition);
        REGISTRY.update_scope(self.id, self.definition.clone());
        self
    }

    // ********************************************************************************************
    // Interceptors
    // ********************************************************************************************
    /// Starts an interceptor for an arbitrary method. Paths may be a literal (a `?` splits off
    /// the expected query), a [`Regex`](regex::Regex) or a [`ValueMatcher::Predicate`].
    pub fn intercept<P, M>(&self, path: P, method: M) -> Interceptor
    where
        P: Into<ValueMatcher>,
        M: AsRef<str>,
    {
        Interceptor::new(self.clone(), method.as_ref(), path.into())
    }

    pub fn get<P: Into<ValueMatcher>>(&self, path: P) -> Interceptor {
        self.intercept(path, "GET")
    }

    pub fn post<P: Into<ValueMatcher>>(&self, path: P) -> Interceptor {
        self.intercept(path, "POST")
    }

    pub fn put<P: Into<ValueMatcher>>(&self, path: P) -> Interceptor {
        self.intercept(path, "PUT")
    }

    pub fn patch<P: Into<ValueMatcher>>(&self, path: P) -> Interceptor {
        self.intercept(path, "PATCH")
    }

    pub fn head<P: Into<ValueMatcher>>(&self, path: P) -> Interceptor {
        self.intercept(path, "HEAD")
    }

    pub fn delete<P: Into<ValueMatcher>>(&self, path: P) -> Interceptor {
        self.intercept(path, "DELETE")
    }

    pub fn options<P: Into<ValueMatcher>>(&self, path: P) -> Interceptor {
        self.intercept(path, "OPTIONS")
    }

    pub fn merge<P: Into<ValueMatcher>>(&self, path: P) -> Interceptor {
        self.intercept(path, "MERGE")
    }

    // ********************************************************************************************
    // Scope configuration
    // ********************************************************************************************
    /// Makes every interceptor of this scope persistent, including those added later.
    pub fn persist(self) -> Self {
        self.persist_if(true)
    }

    pub fn persist_if(self, persist: bool) -> Self {
        self.update(|def| def.persist = persist)
    }

    /// Rewrites the request path (including the query string) before it is matched, replacing
    /// every match of `pattern` with `replacement` (`$1` style group references are expanded).
    pub fn filtering_path<P, R>(self, pattern: P, replacement: R) -> Self
    where
        P: Into<NockRegex>,
        R: Into<String>,
    {
        let filter = RequestFilter::replace(pattern, replacement);
        self.update(|def| def.path_filter = Some(filter))
    }

    pub fn filtering_path_fn<F>(self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let filter = RequestFilter::function(f);
        self.update(|def| def.path_filter = Some(filter))
    }

    /// Rewrites the request body before it is matched.
    pub fn filtering_request_body<P, R>(self, pattern: P, replacement: R) -> Self
    where
        P: Into<NockRegex>,
        R: Into<String>,
    {
        let filter = RequestFilter::replace(pattern, replacement);
        self.update(|def| def.body_filter = Some(filter))
    }

    pub fn filtering_request_body_fn<F>(self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let filter = RequestFilter::function(f);
        self.update(|def| def.body_filter = Some(filter))
    }

    /// Requires a header on every request matched by this scope.
    pub fn match_header<K: Into<String>, V: Into<ValueMatcher>>(self, name: K, value: V) -> Self {
        let header = (name.into(), value.into());
        self.update(|def| def.match_headers.push(header))
    }

    /// Headers added to every reply of this scope. Reply headers of the same name win.
    pub fn default_reply_headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<HeaderValueSource>,
    {
        let headers: Vec<(String, HeaderValueSource)> = headers
            .into_iter()
            .map(|(k, v)| (validated_header_name(k.into()), v.into()))
            .collect();
        self.update(|def| def.default_reply_headers.extend(headers))
    }

    /// Adds a computed `Content-Length` header to every reply.
    pub fn reply_content_length(self) -> Self {
        self.update(|def| def.reply_content_length = true)
    }

    /// Adds a `Date` header with the given date to every reply.
    pub fn reply_date(self, date: DateTime<Utc>) -> Self {
        self.update(|def| def.reply_date = Some(ReplyDate::Fixed(date)))
    }

    /// Adds a `Date` header with the delivery time to every reply.
    pub fn reply_date_now(self) -> Self {
        self.update(|def| def.reply_date = Some(ReplyDate::Now))
    }

    /// Receives one line per match attempt against this scope's interceptors.
    pub fn log<F>(self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let logger = Arc::new(f);
        self.update(|def| def.logger = Some(logger))
    }

    // ********************************************************************************************
    // Assertions
    // ********************************************************************************************
    /// Descriptors (`"GET http://a.com:80/x"`) of interceptors that still expect requests.
    /// Persistent and optional interceptors are never pending.
    pub fn pending_mocks(&self) -> Vec<String> {
        REGISTRY.scope_pending_mocks(self.id)
    }

    /// Descriptors of interceptors that can still match, persistent ones included.
    pub fn active_mocks(&self) -> Vec<String> {
        REGISTRY.scope_active_mocks(self.id)
    }

    pub fn is_done(&self) -> bool {
        self.pending_mocks().is_empty()
    }

    /// # Panics
    /// Panics with the list of pending interceptors if any remain.
    pub fn done(&self) {
        let pending = self.pending_mocks();
        assert!(
            pending.is_empty(),
            "Mocks not yet satisfied:\n{}",
            pending.join("\n")
        );
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("host", &self.definition.host)
            .finish()
    }
}

pub(crate) fn validated_header_name(name: String) -> String {
    http::HeaderName::from_bytes(name.as_bytes()).expect("cannot parse header name");
    name
}
