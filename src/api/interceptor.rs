use crate::{
    api::scope::{validated_header_name, Scope},
    common::{data::HttpRequest, error::InjectedError},
    engine::{
        definition::InterceptorDefinition,
        matchers::values::{BodyMatcher, QueryMatcher, ValueMatcher},
        response::{HeaderValueSource, Reply, ReplyBody, ReplyCallback, ResponseSpec},
        state::StateManager,
        REGISTRY,
    },
};
use std::{path::Path, sync::Arc, time::Duration};

/// Builder for a single interceptor. Request constraints and consumption settings accumulate
/// on the builder; one of the `reply*` methods finalizes it and attaches it to its [`Scope`].
///
/// An interceptor matches once unless configured otherwise with [`times`](Self::times) or
/// [`persist`](Self::persist).
pub struct Interceptor {
    scope: Scope,
    definition: InterceptorDefinition,
    query_defined: bool,
}

impl Interceptor {
    pub(crate) fn new(scope: Scope, method: &str, path: ValueMatcher) -> Self {
        let definition = InterceptorDefinition::new(method, path);
        let query_defined = !matches!(definition.query, QueryMatcher::Absent);
        Self {
            scope,
            definition,
            query_defined,
        }
    }

    // ********************************************************************************************
    // Request constraints
    // ********************************************************************************************
    /// Sets the expected query parameters.
    ///
    /// Accepts a list of pairs whose values are literals, regexes or predicates, a raw query
    /// string, `true` for any query, or a [`QueryMatcher`].
    ///
    /// # Panics
    /// Panics if the query was already defined, either by an earlier call or through a `?` in
    /// the path.
    pub fn query<Q: Into<QueryMatcher>>(mut self, query: Q) -> Self {
        assert!(
            !self.query_defined,
            "query parameters have already been defined for {}",
            self.definition.path
        );
        self.definition.query = query.into();
        self.query_defined = true;
        self
    }

    /// Accepts any query string.
    pub fn query_any(self) -> Self {
        self.query(QueryMatcher::Any)
    }

    pub fn match_header<K: Into<String>, V: Into<ValueMatcher>>(mut self, name: K, value: V) -> Self {
        self.definition.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the expected body: a literal string, a JSON value (compared structurally, also
    /// against form-encoded bodies), a [`Regex`](regex::Regex) or a [`BodyMatcher::Predicate`].
    pub fn body<B: Into<BodyMatcher>>(mut self, body: B) -> Self {
        self.definition.body = Some(body.into());
        self
    }

    // ********************************************************************************************
    // Consumption
    // ********************************************************************************************
    /// # Panics
    /// Panics if `times` is zero.
    pub fn times(mut self, times: usize) -> Self {
        assert!(times > 0, "an interceptor must match at least once");
        self.definition.times = times;
        self
    }

    pub fn once(self) -> Self {
        self.times(1)
    }

    pub fn twice(self) -> Self {
        self.times(2)
    }

    pub fn thrice(self) -> Self {
        self.times(3)
    }

    /// Matches any number of times and is never reported as pending.
    pub fn persist(mut self) -> Self {
        self.definition.persist = true;
        self
    }

    /// Keeps the interceptor matchable but excludes it from pending mocks.
    pub fn optionally(mut self) -> Self {
        self.definition.optional = true;
        self
    }

    // ********************************************************************************************
    // Delays
    // ********************************************************************************************
    /// Delays the whole response, so nothing is delivered before `duration` has elapsed.
    pub fn delay(self, duration: Duration) -> Self {
        self.delay_connection(duration)
    }

    /// Waits before the response is produced.
    pub fn delay_connection(mut self, duration: Duration) -> Self {
        self.definition.delay.connection = Some(duration);
        self
    }

    /// Waits between producing the response and delivering it.
    pub fn delay_body(mut self, duration: Duration) -> Self {
        self.definition.delay.response = Some(duration);
        self
    }

    // ********************************************************************************************
    // Replies
    // ********************************************************************************************
    pub fn reply<B: Into<ReplyBody>>(self, status: u16, body: B) -> Scope {
        let reply = Reply::new(validated_status(status)).body(body);
        self.finish(ResponseSpec::Static(reply))
    }

    pub fn reply_with_headers<B, I, K, V>(self, status: u16, body: B, headers: I) -> Scope
    where
        B: Into<ReplyBody>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<HeaderValueSource>,
    {
        let reply = Reply::new(validated_status(status))
            .body(body)
            .headers(validated_headers(headers));
        self.finish(ResponseSpec::Static(reply))
    }

    /// Computes the whole reply from the request at delivery time.
    pub fn reply_with<F>(self, f: F) -> Scope
    where
        F: Fn(&HttpRequest) -> Reply + Send + Sync + 'static,
    {
        self.finish(ResponseSpec::Function(Arc::new(f)))
    }

    /// Hands the request and a [`ReplyCallback`] to `f`, which may complete it later, for example
    /// from another thread.
    pub fn reply_with_callback<F>(self, f: F) -> Scope
    where
        F: Fn(&HttpRequest, ReplyCallback) + Send + Sync + 'static,
    {
        self.finish(ResponseSpec::Callback(Arc::new(f)))
    }

    /// Replies with a fixed status and a body computed from the request.
    pub fn reply_with_body<F, B>(self, status: u16, f: F) -> Scope
    where
        F: Fn(&HttpRequest) -> B + Send + Sync + 'static,
        B: Into<ReplyBody>,
    {
        self.finish(ResponseSpec::BodyFunction {
            status: validated_status(status),
            body: Arc::new(move |req: &HttpRequest| -> ReplyBody { f(req).into() }),
            headers: Vec::new(),
        })
    }

    /// Replies with the contents of a file, read when the response is delivered. Relative paths
    /// are resolved against the crate root (`CARGO_MANIFEST_DIR`).
    pub fn reply_with_file<P: AsRef<Path>>(self, status: u16, path: P) -> Scope {
        self.reply_with_file_and_headers(status, path, Vec::<(String, String)>::new())
    }

    pub fn reply_with_file_and_headers<P, I, K, V>(self, status: u16, path: P, headers: I) -> Scope
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<HeaderValueSource>,
    {
        self.finish(ResponseSpec::File {
            status: validated_status(status),
            path: path.as_ref().to_path_buf(),
            headers: validated_headers(headers),
        })
    }

    /// Fails the request with an injected error instead of producing a response.
    pub fn reply_with_error<E: Into<InjectedError>>(self, err: E) -> Scope {
        self.finish(ResponseSpec::Error(err.into()))
    }

    fn finish(mut self, response: ResponseSpec) -> Scope {
        self.definition.response = response;
        REGISTRY.add_interceptor(self.scope.id(), self.scope.definition(), self.definition);
        self.scope
    }
}

fn validated_status(status: u16) -> u16 {
    http::StatusCode::from_u16(status).expect("cannot parse status code");
    status
}

fn validated_headers<I, K, V>(headers: I) -> Vec<(String, HeaderValueSource)>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<HeaderValueSource>,
{
    headers
        .into_iter()
        .map(|(k, v)| (validated_header_name(k.into()), v.into()))
        .collect()
}
