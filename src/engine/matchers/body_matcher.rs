use crate::{
    common::data::HttpRequest,
    engine::matchers::{Expectations, Matcher, Mismatch},
};

/// Interceptors without a body expectation accept any body.
pub(crate) struct BodyContentMatcher {}

impl BodyContentMatcher {
    pub fn new() -> Self {
        Self {}
    }

    fn is_form_encoded(req: &HttpRequest) -> bool {
        req.header("content-type").map_or(false, |v| {
            v.to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
        })
    }
}

impl Matcher for BodyContentMatcher {
    fn matches(&self, req: &HttpRequest, exp: &Expectations) -> bool {
        match &exp.interceptor.body {
            None => true,
            Some(matcher) => matcher.matches_bytes(req.body(), Self::is_form_encoded(req)),
        }
    }

    fn mismatches(&self, req: &HttpRequest, exp: &Expectations) -> Vec<Mismatch> {
        match (&exp.interceptor.body, self.matches(req, exp)) {
            (Some(matcher), false) => vec![Mismatch {
                title: "Request body does not match".to_string(),
                expected: matcher.to_string(),
                actual: req.body_string(),
            }],
            _ => Vec::new(),
        }
    }
}
