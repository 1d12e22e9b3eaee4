use crate::common::data::NockRegex;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use serde_json::Value;
use std::{fmt, sync::Arc};

pub type PredicateFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;
pub type QueryPredicateFn = Arc<dyn Fn(&[(String, String)]) -> bool + Send + Sync>;

// ************************************************************************************************
// ValueMatcher
// ************************************************************************************************
/// A matcher for a single textual value: an exact literal, a regular expression or a predicate.
#[derive(Clone)]
pub enum ValueMatcher {
    Literal(String),
    Pattern(NockRegex),
    Predicate(PredicateFn),
}

impl ValueMatcher {
    /// The predicate runs while the registry is locked, so it must not call back into
    /// httpnock (`pending_mocks`, `is_done`, builders, ...) or the calling thread deadlocks.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        ValueMatcher::Predicate(Arc::new(f))
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            ValueMatcher::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Literals compare exactly, patterns search, predicates decide.
    pub(crate) fn matches(&self, value: &str) -> bool {
        match self {
            ValueMatcher::Literal(expected) => expected == value,
            ValueMatcher::Pattern(re) => re.is_match(value),
            ValueMatcher::Predicate(f) => f(value),
        }
    }

    /// Same as [`matches`](Self::matches), but literals compare ASCII case-insensitively.
    pub(crate) fn matches_ignore_case(&self, value: &str) -> bool {
        match self {
            ValueMatcher::Literal(expected) => expected.eq_ignore_ascii_case(value),
            other => other.matches(value),
        }
    }
}

impl fmt::Display for ValueMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueMatcher::Literal(value) => write!(f, "{}", value),
            ValueMatcher::Pattern(re) => write!(f, "{}", re),
            ValueMatcher::Predicate(_) => write!(f, "<predicate>"),
        }
    }
}

impl fmt::Debug for ValueMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueMatcher::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            ValueMatcher::Pattern(re) => f.debug_tuple("Pattern").field(&re.0.as_str()).finish(),
            ValueMatcher::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

impl From<&str> for ValueMatcher {
    fn from(value: &str) -> Self {
        ValueMatcher::Literal(value.to_string())
    }
}

impl From<String> for ValueMatcher {
    fn from(value: String) -> Self {
        ValueMatcher::Literal(value)
    }
}

impl From<&String> for ValueMatcher {
    fn from(value: &String) -> Self {
        ValueMatcher::Literal(value.clone())
    }
}

impl From<regex::Regex> for ValueMatcher {
    fn from(value: regex::Regex) -> Self {
        ValueMatcher::Pattern(NockRegex(value))
    }
}

impl From<&regex::Regex> for ValueMatcher {
    fn from(value: &regex::Regex) -> Self {
        ValueMatcher::Pattern(NockRegex(value.clone()))
    }
}

impl From<NockRegex> for ValueMatcher {
    fn from(value: NockRegex) -> Self {
        ValueMatcher::Pattern(value)
    }
}

// ************************************************************************************************
// QueryMatcher
// ************************************************************************************************
/// Constraint on the query string of a request.
#[derive(Clone)]
pub enum QueryMatcher {
    /// The request must not carry any query parameters.
    Absent,
    /// Any query string is accepted.
    Any,
    /// The parameter set must equal the given pairs; values are matched per key.
    Exact(Vec<(String, ValueMatcher)>),
    Predicate(QueryPredicateFn),
}

impl QueryMatcher {
    /// The predicate runs while the registry is locked, so it must not call back into
    /// httpnock (`pending_mocks`, `is_done`, builders, ...) or the calling thread deadlocks.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&[(String, String)]) -> bool + Send + Sync + 'static,
    {
        QueryMatcher::Predicate(Arc::new(f))
    }

    /// Parses a raw query string (`a=1&b=2`) into an exact matcher.
    pub fn parse(query: &str) -> Self {
        let pairs = form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .map(|(k, v)| (k.into_owned(), ValueMatcher::Literal(v.into_owned())))
            .collect();
        QueryMatcher::Exact(pairs)
    }

    pub(crate) fn matches(&self, actual: &[(String, String)]) -> bool {
        match self {
            QueryMatcher::Absent => actual.is_empty(),
            QueryMatcher::Any => true,
            QueryMatcher::Predicate(f) => f(actual),
            QueryMatcher::Exact(expected) => {
                let mut expected_keys: Vec<&str> = expected.iter().map(|(k, _)| k.as_str()).collect();
                let mut actual_keys: Vec<&str> = actual.iter().map(|(k, _)| k.as_str()).collect();
                expected_keys.sort_unstable();
                expected_keys.dedup();
                actual_keys.sort_unstable();
                actual_keys.dedup();
                if expected_keys != actual_keys {
                    return false;
                }

                expected_keys.iter().all(|key| {
                    let matchers: Vec<&ValueMatcher> = expected
                        .iter()
                        .filter(|(k, _)| k == key)
                        .map(|(_, m)| m)
                        .collect();
                    let values: Vec<&str> = actual
                        .iter()
                        .filter(|(k, _)| k == key)
                        .map(|(_, v)| v.as_str())
                        .collect();
                    matchers.len() == values.len()
                        && matchers.iter().zip(values).all(|(m, v)| m.matches(v))
                })
            }
        }
    }
}

impl Default for QueryMatcher {
    fn default() -> Self {
        QueryMatcher::Absent
    }
}

impl fmt::Debug for QueryMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryMatcher::Absent => f.write_str("Absent"),
            QueryMatcher::Any => f.write_str("Any"),
            QueryMatcher::Exact(pairs) => f.debug_tuple("Exact").field(pairs).finish(),
            QueryMatcher::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

impl From<bool> for QueryMatcher {
    fn from(accept_any: bool) -> Self {
        match accept_any {
            true => QueryMatcher::Any,
            false => QueryMatcher::Absent,
        }
    }
}

impl From<&str> for QueryMatcher {
    fn from(query: &str) -> Self {
        QueryMatcher::parse(query)
    }
}

impl<K, V> From<Vec<(K, V)>> for QueryMatcher
where
    K: Into<String>,
    V: Into<ValueMatcher>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        QueryMatcher::Exact(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for QueryMatcher
where
    K: Into<String>,
    V: Into<ValueMatcher>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        QueryMatcher::Exact(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ************************************************************************************************
// BodyMatcher
// ************************************************************************************************
/// Constraint on the request body.
#[derive(Clone)]
pub enum BodyMatcher {
    Literal(String),
    /// Byte-for-byte equality, for bodies that are not text.
    Binary(Bytes),
    Json(Value),
    Pattern(NockRegex),
    Predicate(PredicateFn),
}

impl BodyMatcher {
    /// The predicate runs while the registry is locked, so it must not call back into
    /// httpnock (`pending_mocks`, `is_done`, builders, ...) or the calling thread deadlocks.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        BodyMatcher::Predicate(Arc::new(f))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        Ok(BodyMatcher::Binary(Bytes::from(BASE64.decode(encoded)?)))
    }

    /// Binary expectations see the raw bytes, every other variant the (lossy) text.
    pub(crate) fn matches_bytes(&self, body: &[u8], form_encoded: bool) -> bool {
        match self {
            BodyMatcher::Binary(expected) => expected.as_ref() == body,
            other => other.matches(&String::from_utf8_lossy(body), form_encoded),
        }
    }

    /// `form_encoded` tells whether the candidate declared an
    /// `application/x-www-form-urlencoded` body, in which case JSON expectations are compared
    /// against the decoded form.
    pub(crate) fn matches(&self, body: &str, form_encoded: bool) -> bool {
        match self {
            BodyMatcher::Literal(expected) => expected == body,
            BodyMatcher::Binary(expected) => expected.as_ref() == body.as_bytes(),
            BodyMatcher::Pattern(re) => re.is_match(body),
            BodyMatcher::Predicate(f) => f(body),
            BodyMatcher::Json(expected) => {
                let actual = if form_encoded {
                    Some(form_to_json(body))
                } else {
                    serde_json::from_str::<Value>(body).ok()
                };
                actual.map_or(false, |actual| &actual == expected)
            }
        }
    }
}

fn form_to_json(body: &str) -> Value {
    let mut object = serde_json::Map::new();
    for (k, v) in form_urlencoded::parse(body.as_bytes()) {
        let key = k.into_owned();
        let value = Value::String(v.into_owned());
        match object.get_mut(&key) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                object.insert(key, value);
            }
        }
    }
    Value::Object(object)
}

impl fmt::Display for BodyMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyMatcher::Literal(value) => write!(f, "{}", value),
            BodyMatcher::Binary(bytes) => write!(f, "<base64 {}>", BASE64.encode(bytes)),
            BodyMatcher::Json(value) => write!(f, "{}", value),
            BodyMatcher::Pattern(re) => write!(f, "{}", re),
            BodyMatcher::Predicate(_) => write!(f, "<predicate>"),
        }
    }
}

impl fmt::Debug for BodyMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyMatcher::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            BodyMatcher::Binary(bytes) => f.debug_tuple("Binary").field(bytes).finish(),
            BodyMatcher::Json(value) => f.debug_tuple("Json").field(value).finish(),
            BodyMatcher::Pattern(re) => f.debug_tuple("Pattern").field(&re.0.as_str()).finish(),
            BodyMatcher::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

impl From<&str> for BodyMatcher {
    fn from(value: &str) -> Self {
        BodyMatcher::Literal(value.to_string())
    }
}

impl From<String> for BodyMatcher {
    fn from(value: String) -> Self {
        BodyMatcher::Literal(value)
    }
}

impl From<Value> for BodyMatcher {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => BodyMatcher::Literal(text),
            other => BodyMatcher::Json(other),
        }
    }
}

impl From<Vec<u8>> for BodyMatcher {
    fn from(value: Vec<u8>) -> Self {
        BodyMatcher::Binary(Bytes::from(value))
    }
}

impl From<Bytes> for BodyMatcher {
    fn from(value: Bytes) -> Self {
        BodyMatcher::Binary(value)
    }
}

impl From<regex::Regex> for BodyMatcher {
    fn from(value: regex::Regex) -> Self {
        BodyMatcher::Pattern(NockRegex(value))
    }
}
