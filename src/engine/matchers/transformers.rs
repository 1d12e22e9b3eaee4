use crate::common::data::NockRegex;
use std::{fmt, sync::Arc};

pub(crate) trait Transformer<I: ?Sized, O> {
    fn transform(&self, v: &I) -> O;
}

pub type FilterFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

// ************************************************************************************************
// RequestFilter
// ************************************************************************************************
/// Rewrites a request value (path or body) before it is matched. Only the candidate seen by the
/// matchers changes; the request handed to reply functions stays as sent.
#[derive(Clone)]
pub enum RequestFilter {
    /// Replaces every match of the pattern.
    Replace {
        pattern: NockRegex,
        replacement: String,
    },
    Function(FilterFn),
}

impl RequestFilter {
    pub fn replace<P, R>(pattern: P, replacement: R) -> Self
    where
        P: Into<NockRegex>,
        R: Into<String>,
    {
        RequestFilter::Replace {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }

    /// Like matcher predicates, `f` runs while the registry is locked and must not call back
    /// into httpnock.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        RequestFilter::Function(Arc::new(f))
    }
}

impl Transformer<str, String> for RequestFilter {
    fn transform(&self, v: &str) -> String {
        match self {
            RequestFilter::Replace {
                pattern,
                replacement,
            } => pattern
                .0
                .replace_all(v, replacement.as_str())
                .into_owned(),
            RequestFilter::Function(f) => f(v),
        }
    }
}

impl fmt::Debug for RequestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestFilter::Replace {
                pattern,
                replacement,
            } => write!(f, "Replace({} -> {:?})", pattern, replacement),
            RequestFilter::Function(_) => f.write_str("Function"),
        }
    }
}
