extern crate serde_regex;

use crate::common::{error::Error, util::to_maybe_lossy_str};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    cmp::Ordering,
    collections::BTreeMap,
    convert::{TryFrom, TryInto},
    fmt,
    str::FromStr,
};
use url::Url;

pub(crate) fn default_port(protocol: &str) -> u16 {
    match protocol {
        "https" => 443,
        _ => 80,
    }
}

// ************************************************************************************************
// HttpRequest
// ************************************************************************************************
/// An outgoing HTTP request as seen by the interception engine.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HttpRequest {
    scheme: String,
    hostname: String,
    port: u16,
    path: String,
    query: Option<String>,
    method: String,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl HttpRequest {
    /// Creates a request from an absolute URL. Relative URLs are rejected.
    pub fn new<M: Into<String>>(
        method: M,
        url: &str,
        headers: Vec<(String, String)>,
        body: Bytes,
    ) -> Result<Self, Error> {
        let parsed = Url::parse(url).map_err(|e| Error::InvalidRequest(e.to_string()))?;
        let hostname = parsed
            .host_str()
            .ok_or_else(|| Error::InvalidRequest(format!("URL '{}' has no host", url)))?
            .to_lowercase();
        let scheme = parsed.scheme().to_string();
        let port = parsed
            .port_or_known_default()
            .unwrap_or_else(|| default_port(&scheme));

        Ok(Self {
            scheme,
            hostname,
            port,
            path: parsed.path().to_string(),
            query: parsed.query().map(ToString::to_string),
            method: method.into().to_uppercase(),
            headers,
            body,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `hostname:port`, the form the net connect policy is evaluated against.
    pub fn host_with_port(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }

    pub fn query_params_vec(&self) -> Vec<(String, String)> {
        match &self.query {
            None => Vec::new(),
            Some(q) => form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    pub fn method_str(&self) -> &str {
        &self.method
    }

    pub fn method(&self) -> http::Method {
        http::Method::from_bytes(self.method.as_bytes()).unwrap_or(http::Method::GET)
    }

    pub fn headers_vec(&self) -> &Vec<(String, String)> {
        &self.headers
    }

    /// Returns the first value of the named header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_string(&self) -> String {
        to_maybe_lossy_str(&self.body).into_owned()
    }

    /// `scheme://host:port`, with the port always present.
    pub fn origin_with_port(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.hostname, self.port)
    }

    /// `scheme://host`, with the port omitted when it is the scheme default.
    pub fn origin(&self) -> String {
        if self.port == default_port(&self.scheme) {
            format!("{}://{}", self.scheme, self.hostname)
        } else {
            self.origin_with_port()
        }
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.origin(), self.path_and_query())
    }

    pub(crate) fn with_path_and_query(&self, path_and_query: &str) -> Self {
        let mut req = self.clone();
        match path_and_query.split_once('?') {
            Some((path, query)) => {
                req.path = path.to_string();
                req.query = Some(query.to_string());
            }
            None => {
                req.path = path_and_query.to_string();
                req.query = None;
            }
        }
        req
    }

    pub(crate) fn with_body(&self, body: Bytes) -> Self {
        let mut req = self.clone();
        req.body = body;
        req
    }

    pub fn to_http_request(&self) -> Result<http::Request<Bytes>, Error> {
        self.try_into()
    }
}

fn http_headers_to_vec(headers: &http::HeaderMap) -> Result<Vec<(String, String)>, Error> {
    headers
        .iter()
        .map(|(name, value)| {
            let value_str = value
                .to_str()
                .map_err(|e| Error::InvalidRequest(e.to_string()))?;
            Ok((name.as_str().to_string(), value_str.to_string()))
        })
        .collect()
}

impl TryFrom<&http::Request<Bytes>> for HttpRequest {
    type Error = Error;

    fn try_from(value: &http::Request<Bytes>) -> Result<Self, Self::Error> {
        let headers = http_headers_to_vec(value.headers())?;
        let uri = value.uri();

        // Origin-form targets are resolved against the Host header.
        let url = if uri.scheme().is_some() && uri.authority().is_some() {
            uri.to_string()
        } else {
            let host = value
                .headers()
                .get(http::header::HOST)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    Error::InvalidRequest(format!("request target '{}' has no host", uri))
                })?;
            let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
            format!("http://{}{}", host, path_and_query)
        };

        HttpRequest::new(value.method().as_str(), &url, headers, value.body().clone())
    }
}

impl TryInto<http::Request<Bytes>> for &HttpRequest {
    type Error = Error;

    fn try_into(self) -> Result<http::Request<Bytes>, Self::Error> {
        let mut builder = http::Request::builder()
            .method(self.method())
            .uri(self.url());

        for (k, v) in &self.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }

        builder
            .body(self.body.clone())
            .map_err(|err| Error::InvalidRequest(err.to_string()))
    }
}

// ************************************************************************************************
// MockResponse
// ************************************************************************************************
/// The response descriptor delivered for an intercepted request.
#[derive(Serialize, Deserialize, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl MockResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_string(&self) -> String {
        to_maybe_lossy_str(&self.body).into_owned()
    }

    pub fn into_http_response(self) -> Result<http::Response<Bytes>, Error> {
        let mut builder = http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
            .body(self.body)
            .map_err(|e| Error::ResponseBuild(e.to_string()))
    }
}

impl TryFrom<&http::Response<Bytes>> for MockResponse {
    type Error = Error;

    fn try_from(value: &http::Response<Bytes>) -> Result<Self, Self::Error> {
        let headers =
            http_headers_to_vec(value.headers()).map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            status: value.status().as_u16(),
            headers,
            body: value.body().clone(),
        })
    }
}

/// Prints the response body as UTF8 string
impl fmt::Debug for MockResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &to_maybe_lossy_str(&self.body))
            .finish()
    }
}

// ************************************************************************************************
// NetLocation
// ************************************************************************************************
/// A normalized `{ protocol, hostname, port }` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetLocation {
    pub protocol: String,
    pub hostname: String,
    pub port: u16,
}

impl NetLocation {
    /// Parses a host specifier such as `http://a.com`, `https://a.com:8443` or `a.com`
    /// (the protocol defaults to `http`). Paths are ignored.
    pub fn parse(spec: &str) -> Result<Self, Error> {
        let spec = spec.trim();
        let with_scheme = if spec.contains("://") {
            spec.to_string()
        } else {
            format!("http://{}", spec)
        };

        let url = Url::parse(&with_scheme).map_err(|e| Error::InvalidHost(format!("{}: {}", spec, e)))?;
        let hostname = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::InvalidHost(format!("{}: missing hostname", spec)))?
            .to_lowercase();
        let protocol = url.scheme().to_lowercase();
        let port = url
            .port_or_known_default()
            .unwrap_or_else(|| default_port(&protocol));

        Ok(Self {
            protocol,
            hostname,
            port,
        })
    }

    /// The fully qualified key, `proto://host:port`.
    pub fn key(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.hostname, self.port)
    }

    pub fn matches(&self, req: &HttpRequest) -> bool {
        self.protocol.eq_ignore_ascii_case(req.scheme())
            && self.hostname.eq_ignore_ascii_case(req.hostname())
            && self.port == req.port()
    }
}

impl fmt::Display for NetLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.port == default_port(&self.protocol) {
            write!(f, "{}://{}", self.protocol, self.hostname)
        } else {
            write!(f, "{}://{}:{}", self.protocol, self.hostname, self.port)
        }
    }
}

impl FromStr for NetLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NetLocation::parse(s)
    }
}

// ************************************************************************************************
// NockRegex
// ************************************************************************************************
/// A serializable, comparable regular expression.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NockRegex(#[serde(with = "serde_regex")] pub regex::Regex);

impl NockRegex {
    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl Ord for NockRegex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.as_str().cmp(other.0.as_str())
    }
}

impl PartialOrd for NockRegex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for NockRegex {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl Eq for NockRegex {}

impl From<regex::Regex> for NockRegex {
    fn from(value: regex::Regex) -> Self {
        NockRegex(value)
    }
}

impl From<&regex::Regex> for NockRegex {
    fn from(value: &regex::Regex) -> Self {
        NockRegex(value.clone())
    }
}

impl From<&str> for NockRegex {
    fn from(value: &str) -> Self {
        let re = regex::Regex::from_str(value).expect("cannot parse value as regex");
        NockRegex::from(re)
    }
}

impl fmt::Display for NockRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.0)
    }
}

// ************************************************************************************************
// FixtureDefinition
// ************************************************************************************************
fn default_status() -> u16 {
    200
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A response header in a fixture: a single value, or every value of a repeated header such as
/// `Set-Cookie` in the order they were received.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FixtureHeaderValue {
    Single(String),
    Multiple(Vec<String>),
}

impl FixtureHeaderValue {
    pub fn values(&self) -> &[String] {
        match self {
            FixtureHeaderValue::Single(value) => std::slice::from_ref(value),
            FixtureHeaderValue::Multiple(values) => values,
        }
    }

    pub(crate) fn push(&mut self, value: String) {
        match self {
            FixtureHeaderValue::Single(first) => {
                *self = FixtureHeaderValue::Multiple(vec![std::mem::take(first), value])
            }
            FixtureHeaderValue::Multiple(values) => values.push(value),
        }
    }
}

impl From<&str> for FixtureHeaderValue {
    fn from(value: &str) -> Self {
        FixtureHeaderValue::Single(value.to_string())
    }
}

impl From<String> for FixtureHeaderValue {
    fn from(value: String) -> Self {
        FixtureHeaderValue::Single(value)
    }
}

impl PartialEq<&str> for FixtureHeaderValue {
    fn eq(&self, other: &&str) -> bool {
        matches!(self, FixtureHeaderValue::Single(value) if value == other)
    }
}

/// The serialized form of one interceptor, as written by the recorder and read by
/// [`define`](crate::define) / [`load`](crate::load).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FixtureDefinition {
    pub scope: String,
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, FixtureHeaderValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reqheaders: Option<BTreeMap<String, String>>,
    /// `body` holds base64 of a request body that is not valid UTF-8.
    #[serde(default, skip_serializing_if = "is_false")]
    pub body_is_binary: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub response_is_binary: bool,
}
