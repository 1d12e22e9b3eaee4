use serde_json::Value;
use std::fmt;

/// Errors surfaced by the interception engine to the completion path of a request, and by the
/// fixture, recorder and back controls.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request targeted a mocked host but matched no interceptor, and no scope of that host
    /// allows unmocked requests.
    #[error("no match for request {method} {url}")]
    NoMatch { method: String, url: String },
    /// Net connect is disabled and the host is not in the allow list.
    #[error("net connect disabled for {host}")]
    NetConnectNotAllowed { host: String },
    /// A deliberately injected failure (`reply_with_error` or a failing reply callback).
    #[error("{0}")]
    Injected(InjectedError),
    #[error("cannot parse fixture definitions: {0}")]
    FixtureParse(String),
    #[error("cannot read fixture file: {0}")]
    FixtureRead(String),
    #[error("cannot write fixture file: {0}")]
    FixtureWrite(String),
    #[error("recording already in progress")]
    RecordingInProgress,
    #[error("unknown back mode: {0}")]
    InvalidBackMode(String),
    #[error("request was aborted before the response was delivered")]
    Aborted,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("cannot build response: {0}")]
    ResponseBuild(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid host specifier: {0}")]
    InvalidHost(String),
}

impl Error {
    /// Returns `true` for errors that represent an unmatched request (either kind of rejection).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::NoMatch { .. } | Error::NetConnectNotAllowed { .. }
        )
    }
}

/// The payload of a deliberately injected transport failure.
#[derive(Debug, Clone, PartialEq)]
pub enum InjectedError {
    Message(String),
    Object(Value),
}

impl InjectedError {
    /// Returns the human readable message. Objects with a string `message` field yield that
    /// field, other objects their JSON serialization.
    pub fn message(&self) -> String {
        match self {
            InjectedError::Message(msg) => msg.clone(),
            InjectedError::Object(value) => match value.get("message").and_then(Value::as_str) {
                Some(msg) => msg.to_string(),
                None => value.to_string(),
            },
        }
    }

    pub fn object(&self) -> Option<&Value> {
        match self {
            InjectedError::Object(value) => Some(value),
            InjectedError::Message(_) => None,
        }
    }
}

impl fmt::Display for InjectedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for InjectedError {}

impl From<&str> for InjectedError {
    fn from(value: &str) -> Self {
        InjectedError::Message(value.to_string())
    }
}

impl From<String> for InjectedError {
    fn from(value: String) -> Self {
        InjectedError::Message(value)
    }
}

impl From<Value> for InjectedError {
    fn from(value: Value) -> Self {
        match value {
            Value::String(msg) => InjectedError::Message(msg),
            other => InjectedError::Object(other),
        }
    }
}

impl From<InjectedError> for Error {
    fn from(value: InjectedError) -> Self {
        Error::Injected(value)
    }
}
