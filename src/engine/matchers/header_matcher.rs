use crate::{
    common::data::HttpRequest,
    engine::matchers::{values::ValueMatcher, Expectations, Matcher, Mismatch},
};

/// Checks required headers (scope `reqheaders`, scope and interceptor `match_header`) and
/// forbidden headers (scope `badheaders`). Header names compare case-insensitively, and so do
/// literal values.
pub(crate) struct HeaderMatcher {}

impl HeaderMatcher {
    pub fn new() -> Self {
        Self {}
    }

    fn required<'a>(&self, exp: &Expectations<'a>) -> Vec<&'a (String, ValueMatcher)> {
        exp.scope
            .options
            .reqheaders
            .iter()
            .chain(exp.scope.match_headers.iter())
            .chain(exp.interceptor.headers.iter())
            .collect()
    }

    fn header_matches(req: &HttpRequest, name: &str, matcher: &ValueMatcher) -> bool {
        req.headers_vec()
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .any(|(_, v)| matcher.matches_ignore_case(v))
    }
}

impl Matcher for HeaderMatcher {
    fn matches(&self, req: &HttpRequest, exp: &Expectations) -> bool {
        let forbidden_present = exp
            .scope
            .options
            .badheaders
            .iter()
            .any(|name| req.header(name).is_some());

        !forbidden_present
            && self
                .required(exp)
                .iter()
                .all(|(name, matcher)| Self::header_matches(req, name, matcher))
    }

    fn mismatches(&self, req: &HttpRequest, exp: &Expectations) -> Vec<Mismatch> {
        let mut result: Vec<Mismatch> = self
            .required(exp)
            .into_iter()
            .filter(|(name, matcher)| !Self::header_matches(req, name, matcher))
            .map(|(name, matcher)| Mismatch {
                title: format!("Header '{}' does not match", name),
                expected: matcher.to_string(),
                actual: req.header(name).unwrap_or("<missing>").to_string(),
            })
            .collect();

        result.extend(
            exp.scope
                .options
                .badheaders
                .iter()
                .filter_map(|name| req.header(name).map(|value| (name, value)))
                .map(|(name, value)| Mismatch {
                    title: format!("Header '{}' must not be present", name),
                    expected: "<missing>".to_string(),
                    actual: value.to_string(),
                }),
        );

        result
    }
}
