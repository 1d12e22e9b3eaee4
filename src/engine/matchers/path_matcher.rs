use crate::{
    common::data::HttpRequest,
    engine::matchers::{Expectations, Matcher, Mismatch},
};

/// Matches the path without the query string. Query parameters are left to
/// [`QueryParamMatcher`](super::query_matcher::QueryParamMatcher).
pub(crate) struct PathMatcher {}

impl PathMatcher {
    pub fn new() -> Self {
        Self {}
    }
}

impl Matcher for PathMatcher {
    fn matches(&self, req: &HttpRequest, exp: &Expectations) -> bool {
        exp.interceptor.path.matches(req.path())
    }

    fn mismatches(&self, req: &HttpRequest, exp: &Expectations) -> Vec<Mismatch> {
        match self.matches(req, exp) {
            true => Vec::new(),
            false => vec![Mismatch {
                title: "Request path does not match".to_string(),
                expected: exp.interceptor.path.to_string(),
                actual: req.path().to_string(),
            }],
        }
    }
}
