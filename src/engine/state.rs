use crate::{
    common::{
        data::{FixtureDefinition, HttpRequest, MockResponse},
        error::Error,
        util::read_env_flag,
    },
    engine::{
        definition::{
            ActiveInterceptor, ActiveScope, HostSpec, InterceptorDefinition, LogFn,
            ScopeDefinition,
        },
        matchers::{self, transformers::Transformer, values::ValueMatcher, Expectations, Matcher},
        recorder::{Captured, Played, RecorderOptions, RecorderState},
        response::{Liveness, PendingResponse, ResponseTemplate},
    },
};
use bytes::Bytes;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

/// What the registry decided for an outgoing request.
#[derive(Debug)]
pub enum Interception {
    Responded(PendingResponse),
    Passthrough,
    Rejected(Error),
}

/// Selects interceptors for [`remove_interceptor`](crate::remove_interceptor).
#[derive(Debug, Clone)]
pub struct InterceptorSelector {
    pub proto: String,
    pub hostname: String,
    pub port: Option<u16>,
    pub path: String,
    pub method: String,
}

impl InterceptorSelector {
    pub fn new<H: Into<String>, P: Into<String>>(hostname: H, path: P) -> Self {
        Self {
            proto: "http".to_string(),
            hostname: hostname.into(),
            port: None,
            path: path.into(),
            method: "GET".to_string(),
        }
    }

    pub fn proto<S: Into<String>>(mut self, proto: S) -> Self {
        self.proto = proto.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn method<S: Into<String>>(mut self, method: S) -> Self {
        self.method = method.into();
        self
    }

    fn matches(&self, scope: &ScopeDefinition, interceptor: &InterceptorDefinition) -> bool {
        let host_matches = match &scope.host {
            HostSpec::Location(location) => {
                location.protocol.eq_ignore_ascii_case(&self.proto)
                    && location.hostname.eq_ignore_ascii_case(&self.hostname)
                    && self.port.map_or(true, |port| port == location.port)
            }
            HostSpec::Pattern(_) => false,
        };

        host_matches
            && interceptor.method.eq_ignore_ascii_case(&self.method)
            && interceptor.path.as_literal() == Some(self.path.as_str())
    }
}

#[derive(Debug, Clone)]
pub(crate) enum NetConnect {
    Enabled,
    Disabled,
    /// Disabled except for hosts matching one of the matchers.
    Allowed(Vec<ValueMatcher>),
}

impl NetConnect {
    /// Literals compare against `hostname` or `hostname:port`, patterns and predicates see
    /// `hostname:port`.
    fn allows(&self, req: &HttpRequest) -> bool {
        let host = req.host_with_port();
        match self {
            NetConnect::Enabled => true,
            NetConnect::Disabled => false,
            NetConnect::Allowed(matchers) => matchers.iter().any(|m| match m {
                ValueMatcher::Literal(literal) => {
                    literal.eq_ignore_ascii_case(&host) || literal.eq_ignore_ascii_case(req.hostname())
                }
                other => other.matches(&host),
            }),
        }
    }
}

pub(crate) struct RegistryState {
    next_scope_id: usize,
    next_interceptor_id: usize,
    next_registration: usize,
    /// Keyed by registration sequence, not by scope ID.
    scopes: BTreeMap<usize, ActiveScope>,
    net_connect: NetConnect,
    active: bool,
    recorder: RecorderState,
    matchers: Vec<Box<dyn Matcher + Sync + Send>>,
}

impl RegistryState {
    fn new(active: bool) -> Self {
        Self {
            next_scope_id: 0,
            next_interceptor_id: 0,
            next_registration: 0,
            scopes: BTreeMap::new(),
            net_connect: NetConnect::Enabled,
            active,
            recorder: RecorderState::default(),
            matchers: matchers::all(),
        }
    }

    /// Appends a scope behind everything registered so far.
    fn register(&mut self, scope: ActiveScope) {
        let key = self.next_registration;
        self.next_registration += 1;
        self.scopes.insert(key, scope);
    }

    fn scope_mut(&mut self, id: usize) -> Option<&mut ActiveScope> {
        self.scopes.values_mut().find(|scope| scope.id == id)
    }
}

pub(crate) trait StateManager {
    fn reset(&self);

    fn add_scope(&self, definition: ScopeDefinition) -> usize;
    fn update_scope(&self, id: usize, definition: ScopeDefinition);
    fn add_interceptor(
        &self,
        scope_id: usize,
        scope: &ScopeDefinition,
        definition: InterceptorDefinition,
    ) -> usize;

    fn intercept(&self, req: HttpRequest) -> Interception;

    fn pending_mocks(&self) -> Vec<String>;
    fn active_mocks(&self) -> Vec<String>;
    fn scope_pending_mocks(&self, scope_id: usize) -> Vec<String>;
    fn scope_active_mocks(&self, scope_id: usize) -> Vec<String>;
    fn remove_interceptor(&self, selector: &InterceptorSelector) -> bool;

    fn disable_net_connect(&self);
    fn enable_net_connect(&self, host: Option<ValueMatcher>);

    fn activate(&self);
    fn restore(&self);
    fn is_active(&self) -> bool;
    fn abort_pending(&self);

    fn start_recording(&self, options: RecorderOptions) -> Result<(), Error>;
    fn stop_recording(&self);
    fn is_recording(&self) -> bool;
    fn record(&self, req: &HttpRequest, res: &MockResponse);
    fn play(&self) -> Played;
    fn recorded(&self) -> Vec<FixtureDefinition>;
    fn clear_recording(&self);
}

/// Process-wide interception state: scopes in registration order, the net connect policy, the
/// attach flag and the recorder buffer.
pub struct Registry {
    state: Mutex<RegistryState>,
    generation: Arc<AtomicUsize>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::with_active(!read_env_flag("NOCK_OFF"))
    }

    pub(crate) fn with_active(active: bool) -> Self {
        Self {
            state: Mutex::new(RegistryState::new(active)),
            generation: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A panic inside a user callback must not disable the registry for every later test.
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// The request as the scope's matchers see it.
    fn filtered(req: &HttpRequest, scope: &ScopeDefinition) -> HttpRequest {
        let mut candidate = match &scope.path_filter {
            Some(filter) => req.with_path_and_query(&filter.transform(&req.path_and_query())),
            None => req.clone(),
        };
        if let Some(filter) = &scope.body_filter {
            let body = filter.transform(&candidate.body_string());
            candidate = candidate.with_body(Bytes::from(body));
        }
        candidate
    }

    fn describe_all<F>(&self, filter: F) -> Vec<String>
    where
        F: Fn(&ActiveScope, &ActiveInterceptor) -> bool,
    {
        let state = self.lock();
        state
            .scopes
            .values()
            .flat_map(|scope| {
                scope
                    .interceptors
                    .iter()
                    .filter(|interceptor| filter(scope, interceptor))
                    .map(|interceptor| interceptor.definition.describe(&scope.definition.host))
                    .collect::<Vec<String>>()
            })
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl StateManager for Registry {
    fn reset(&self) {
        let mut state = self.lock();
        state.scopes.clear();
        state.net_connect = NetConnect::Enabled;
        tracing::debug!("Removed all scopes and re-enabled net connect");
    }

    fn add_scope(&self, definition: ScopeDefinition) -> usize {
        let mut state = self.lock();
        let id = state.next_scope_id;
        tracing::debug!("Adding scope with ID={} for {}", id, definition.host);
        state.register(ActiveScope::new(id, definition));
        state.next_scope_id += 1;
        id
    }

    fn update_scope(&self, id: usize, definition: ScopeDefinition) {
        let mut state = self.lock();
        match state.scope_mut(id) {
            Some(scope) => scope.definition = definition,
            None => state.register(ActiveScope::new(id, definition)),
        }
    }

    fn add_interceptor(
        &self,
        scope_id: usize,
        scope: &ScopeDefinition,
        definition: InterceptorDefinition,
    ) -> usize {
        let mut state = self.lock();
        let id = state.next_interceptor_id;
        state.next_interceptor_id += 1;

        tracing::debug!(
            "Adding interceptor with ID={}: {}",
            id,
            definition.describe(&scope.host)
        );

        // Scopes removed by clean_all come back, behind the scopes registered since.
        if state.scope_mut(scope_id).is_none() {
            state.register(ActiveScope::new(scope_id, scope.clone()));
        }
        if let Some(active) = state.scope_mut(scope_id) {
            active.interceptors.push(ActiveInterceptor::new(id, definition));
        }
        id
    }

    fn intercept(&self, req: HttpRequest) -> Interception {
        let mut log_lines: Vec<(LogFn, String)> = Vec::new();

        let result = {
            let mut guard = self.lock();
            let state: &mut RegistryState = &mut guard;

            if !state.active {
                tracing::trace!("Registry is detached, passing {} through", req.url());
                return Interception::Passthrough;
            }

            if state.recorder.is_recording() {
                return Interception::Passthrough;
            }

            let candidates: Vec<usize> = state
                .scopes
                .iter()
                .filter(|(_, scope)| scope.definition.host.matches(&req))
                .map(|(key, _)| *key)
                .collect();

            let mut found: Option<(usize, usize)> = None;
            'scopes: for key in &candidates {
                let scope = &state.scopes[key];
                let candidate = Self::filtered(&req, &scope.definition);

                for (index, interceptor) in scope.interceptors.iter().enumerate() {
                    if !interceptor.is_available(&scope.definition) {
                        continue;
                    }

                    let exp = Expectations {
                        scope: &scope.definition,
                        interceptor: &interceptor.definition,
                    };
                    let matched = state.matchers.iter().all(|m| m.matches(&candidate, &exp));
                    let description = interceptor.definition.describe(&scope.definition.host);

                    tracing::trace!("matching {} to {}: {}", req.url(), description, matched);
                    if let Some(logger) = &scope.definition.logger {
                        log_lines.push((
                            logger.clone(),
                            format!("matching {} to {}: {}", req.url(), description, matched),
                        ));
                    }

                    if matched {
                        found = Some((*key, index));
                        break 'scopes;
                    }

                    for mismatch in state
                        .matchers
                        .iter()
                        .flat_map(|m| m.mismatches(&candidate, &exp))
                    {
                        tracing::trace!(
                            "{}: expected {}, got {}",
                            mismatch.title,
                            mismatch.expected,
                            mismatch.actual
                        );
                    }
                }
            }

            match found {
                Some((key, index)) => {
                    let generation = self.generation.clone();
                    let scope = state
                        .scopes
                        .get_mut(&key)
                        .expect("matched scope vanished while locked");
                    let persistent = scope.interceptors[index].is_persistent(&scope.definition);
                    let template = ResponseTemplate {
                        spec: scope.interceptors[index].definition.response.clone(),
                        default_headers: scope.definition.default_reply_headers.clone(),
                        content_length: scope.definition.reply_content_length,
                        date: scope.definition.reply_date,
                        delay: scope.interceptors[index].definition.delay,
                    };

                    let interceptor = &mut scope.interceptors[index];
                    assert!(
                        persistent || interceptor.remaining > 0,
                        "consumed an exhausted interceptor"
                    );
                    if !persistent {
                        interceptor.remaining -= 1;
                    }
                    interceptor.call_counter += 1;

                    tracing::debug!(
                        "Matched {} {} to interceptor ID={} ({} remaining)",
                        req.method_str(),
                        req.url(),
                        interceptor.id,
                        interceptor.remaining
                    );

                    Interception::Responded(PendingResponse::new(
                        req,
                        template,
                        Liveness::new(generation),
                    ))
                }
                None => {
                    let allow_unmocked = candidates
                        .iter()
                        .any(|key| state.scopes[key].definition.options.allow_unmocked);

                    if !state.net_connect.allows(&req) {
                        tracing::warn!("Net connect disabled, rejecting {}", req.url());
                        Interception::Rejected(Error::NetConnectNotAllowed {
                            host: req.host_with_port(),
                        })
                    } else if allow_unmocked || candidates.is_empty() {
                        tracing::debug!("No interceptor matched, passing {} through", req.url());
                        Interception::Passthrough
                    } else {
                        tracing::warn!("No match for request {} {}", req.method_str(), req.url());
                        Interception::Rejected(Error::NoMatch {
                            method: req.method_str().to_string(),
                            url: req.url(),
                        })
                    }
                }
            }
        };

        for (logger, line) in log_lines {
            logger(&line);
        }

        result
    }

    fn pending_mocks(&self) -> Vec<String> {
        self.describe_all(|scope, interceptor| interceptor.is_pending(&scope.definition))
    }

    fn active_mocks(&self) -> Vec<String> {
        self.describe_all(|scope, interceptor| interceptor.is_available(&scope.definition))
    }

    fn scope_pending_mocks(&self, scope_id: usize) -> Vec<String> {
        self.describe_all(|scope, interceptor| {
            scope.id == scope_id && interceptor.is_pending(&scope.definition)
        })
    }

    fn scope_active_mocks(&self, scope_id: usize) -> Vec<String> {
        self.describe_all(|scope, interceptor| {
            scope.id == scope_id && interceptor.is_available(&scope.definition)
        })
    }

    fn remove_interceptor(&self, selector: &InterceptorSelector) -> bool {
        let mut state = self.lock();
        for scope in state.scopes.values_mut() {
            let definition = &scope.definition;
            let position = scope
                .interceptors
                .iter()
                .position(|interceptor| selector.matches(definition, &interceptor.definition));

            if let Some(index) = position {
                let removed = scope.interceptors.remove(index);
                tracing::debug!("Removed interceptor with ID={} for {:?}", removed.id, selector);
                return true;
            }
        }
        tracing::debug!("No interceptor found for {:?}", selector);
        false
    }

    fn disable_net_connect(&self) {
        self.lock().net_connect = NetConnect::Disabled;
    }

    fn enable_net_connect(&self, host: Option<ValueMatcher>) {
        let mut state = self.lock();
        let current = std::mem::replace(&mut state.net_connect, NetConnect::Enabled);
        state.net_connect = match (host, current) {
            (None, _) | (Some(_), NetConnect::Enabled) => NetConnect::Enabled,
            (Some(host), NetConnect::Disabled) => NetConnect::Allowed(vec![host]),
            (Some(host), NetConnect::Allowed(mut allowed)) => {
                allowed.push(host);
                NetConnect::Allowed(allowed)
            }
        };
    }

    fn activate(&self) {
        self.lock().active = true;
    }

    fn restore(&self) {
        let mut state = self.lock();
        state.active = false;
        state.recorder.stop();
    }

    fn is_active(&self) -> bool {
        self.lock().active
    }

    fn abort_pending(&self) {
        let previous = self.generation.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Aborted pending responses of generation {}", previous);
    }

    fn start_recording(&self, options: RecorderOptions) -> Result<(), Error> {
        match self.lock().recorder.start(options) {
            true => Ok(()),
            false => Err(Error::RecordingInProgress),
        }
    }

    fn stop_recording(&self) {
        self.lock().recorder.stop();
    }

    fn is_recording(&self) -> bool {
        self.lock().recorder.is_recording()
    }

    fn record(&self, req: &HttpRequest, res: &MockResponse) {
        let captured: Option<Captured> = self.lock().recorder.record(req, res);
        if let Some(captured) = captured {
            captured.emit();
        }
    }

    fn play(&self) -> Played {
        self.lock().recorder.play()
    }

    fn recorded(&self) -> Vec<FixtureDefinition> {
        self.lock().recorder.outputs().to_vec()
    }

    fn clear_recording(&self) {
        self.lock().recorder.clear();
    }
}
