use crate::{
    common::{
        data::{HttpRequest, NetLocation, NockRegex},
        error::Error,
    },
    engine::{
        matchers::{
            transformers::RequestFilter,
            values::{BodyMatcher, QueryMatcher, ValueMatcher},
        },
        response::{Delay, HeaderList, ReplyDate, ResponseSpec},
    },
};
use std::{fmt, str::FromStr, sync::Arc};

pub type LogFn = Arc<dyn Fn(&str) + Send + Sync>;

// ************************************************************************************************
// HostSpec
// ************************************************************************************************
/// Which requests a scope applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum HostSpec {
    Location(NetLocation),
    /// Tested against both `proto://host` and `proto://host:port`.
    Pattern(NockRegex),
}

impl HostSpec {
    pub fn parse(spec: &str) -> Result<Self, Error> {
        NetLocation::parse(spec).map(HostSpec::Location)
    }

    pub(crate) fn matches(&self, req: &HttpRequest) -> bool {
        match self {
            HostSpec::Location(location) => location.matches(req),
            HostSpec::Pattern(re) => {
                let origin = format!("{}://{}", req.scheme(), req.hostname());
                re.is_match(&origin) || re.is_match(&req.origin_with_port())
            }
        }
    }

    /// Key used in interceptor descriptors: `proto://host:port` or the pattern.
    pub(crate) fn key(&self) -> String {
        match self {
            HostSpec::Location(location) => location.key(),
            HostSpec::Pattern(re) => re.to_string(),
        }
    }
}

impl fmt::Display for HostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostSpec::Location(location) => write!(f, "{}", location),
            HostSpec::Pattern(re) => write!(f, "{}", re),
        }
    }
}

impl FromStr for HostSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HostSpec::parse(s)
    }
}

/// Panics on unparsable hosts; use [`HostSpec::parse`] to handle the error.
impl From<&str> for HostSpec {
    fn from(value: &str) -> Self {
        HostSpec::parse(value).expect("cannot parse host specifier")
    }
}

impl From<String> for HostSpec {
    fn from(value: String) -> Self {
        HostSpec::from(value.as_str())
    }
}

impl From<&String> for HostSpec {
    fn from(value: &String) -> Self {
        HostSpec::from(value.as_str())
    }
}

impl From<NetLocation> for HostSpec {
    fn from(value: NetLocation) -> Self {
        HostSpec::Location(value)
    }
}

impl From<regex::Regex> for HostSpec {
    fn from(value: regex::Regex) -> Self {
        HostSpec::Pattern(NockRegex(value))
    }
}

// ************************************************************************************************
// NockOptions
// ************************************************************************************************
/// Options a scope is created with.
#[derive(Debug, Clone, Default)]
pub struct NockOptions {
    pub(crate) allow_unmocked: bool,
    pub(crate) reqheaders: Vec<(String, ValueMatcher)>,
    pub(crate) badheaders: Vec<String>,
}

impl NockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets requests that match no interceptor of this scope through to the network.
    pub fn allow_unmocked(mut self, allow: bool) -> Self {
        self.allow_unmocked = allow;
        self
    }

    /// Requires a header on every request matched by the scope.
    pub fn reqheader<K: Into<String>, V: Into<ValueMatcher>>(mut self, name: K, value: V) -> Self {
        self.reqheaders.push((name.into(), value.into()));
        self
    }

    pub fn reqheaders<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ValueMatcher>,
    {
        self.reqheaders
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Requests carrying this header never match the scope.
    pub fn badheader<K: Into<String>>(mut self, name: K) -> Self {
        self.badheaders.push(name.into());
        self
    }

    pub fn is_allow_unmocked(&self) -> bool {
        self.allow_unmocked
    }
}

// ************************************************************************************************
// ScopeDefinition
// ************************************************************************************************
#[derive(Clone)]
pub(crate) struct ScopeDefinition {
    pub host: HostSpec,
    pub options: NockOptions,
    pub match_headers: Vec<(String, ValueMatcher)>,
    pub default_reply_headers: HeaderList,
    pub path_filter: Option<RequestFilter>,
    pub body_filter: Option<RequestFilter>,
    pub persist: bool,
    pub reply_content_length: bool,
    pub reply_date: Option<ReplyDate>,
    pub logger: Option<LogFn>,
}

impl ScopeDefinition {
    pub(crate) fn new(host: HostSpec, options: NockOptions) -> Self {
        Self {
            host,
            options,
            match_headers: Vec::new(),
            default_reply_headers: Vec::new(),
            path_filter: None,
            body_filter: None,
            persist: false,
            reply_content_length: false,
            reply_date: None,
            logger: None,
        }
    }
}

impl fmt::Debug for ScopeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeDefinition")
            .field("host", &self.host)
            .field("options", &self.options)
            .field("match_headers", &self.match_headers)
            .field("path_filter", &self.path_filter)
            .field("body_filter", &self.body_filter)
            .field("persist", &self.persist)
            .finish()
    }
}

// ************************************************************************************************
// InterceptorDefinition
// ************************************************************************************************
#[derive(Debug, Clone)]
pub(crate) struct InterceptorDefinition {
    pub method: String,
    pub path: ValueMatcher,
    pub query: QueryMatcher,
    pub body: Option<BodyMatcher>,
    pub headers: Vec<(String, ValueMatcher)>,
    pub response: ResponseSpec,
    pub delay: Delay,
    pub times: usize,
    pub persist: bool,
    pub optional: bool,
}

impl InterceptorDefinition {
    /// A literal path carrying a query string is split into a path and an exact query matcher.
    pub(crate) fn new<P: Into<ValueMatcher>>(method: &str, path: P) -> Self {
        let (path, query) = match path.into() {
            ValueMatcher::Literal(literal) => match literal.split_once('?') {
                Some((path, query)) => (
                    ValueMatcher::Literal(path.to_string()),
                    QueryMatcher::parse(query),
                ),
                None => (ValueMatcher::Literal(literal), QueryMatcher::Absent),
            },
            other => (other, QueryMatcher::Absent),
        };

        Self {
            method: method.to_uppercase(),
            path,
            query,
            body: None,
            headers: Vec::new(),
            response: ResponseSpec::Static(crate::engine::response::Reply::new(200)),
            delay: Delay::default(),
            times: 1,
            persist: false,
            optional: false,
        }
    }

    /// `"GET http://a.com:80/x"`
    pub(crate) fn describe(&self, host: &HostSpec) -> String {
        format!("{} {}{}", self.method, host.key(), self.path)
    }
}

// ************************************************************************************************
// Active entries
// ************************************************************************************************
#[derive(Debug, Clone)]
pub(crate) struct ActiveInterceptor {
    pub id: usize,
    pub definition: InterceptorDefinition,
    pub remaining: usize,
    pub call_counter: usize,
}

impl ActiveInterceptor {
    pub(crate) fn new(id: usize, definition: InterceptorDefinition) -> Self {
        Self {
            id,
            remaining: definition.times,
            definition,
            call_counter: 0,
        }
    }

    pub(crate) fn is_persistent(&self, scope: &ScopeDefinition) -> bool {
        self.definition.persist || scope.persist
    }

    pub(crate) fn is_available(&self, scope: &ScopeDefinition) -> bool {
        self.remaining > 0 || self.is_persistent(scope)
    }

    /// Still expected to be hit before the scope counts as done.
    pub(crate) fn is_pending(&self, scope: &ScopeDefinition) -> bool {
        self.remaining > 0 && !self.is_persistent(scope) && !self.definition.optional
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ActiveScope {
    pub id: usize,
    pub definition: ScopeDefinition,
    pub interceptors: Vec<ActiveInterceptor>,
}

impl ActiveScope {
    pub(crate) fn new(id: usize, definition: ScopeDefinition) -> Self {
        Self {
            id,
            definition,
            interceptors: Vec::new(),
        }
    }
}
