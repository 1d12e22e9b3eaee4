use crate::{
    common::data::HttpRequest,
    engine::definition::{InterceptorDefinition, ScopeDefinition},
};

pub(crate) mod body_matcher;
pub(crate) mod header_matcher;
pub(crate) mod method_matcher;
pub(crate) mod path_matcher;
pub(crate) mod query_matcher;
pub(crate) mod transformers;
pub(crate) mod values;

/// Why a single matcher rejected a candidate request.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Mismatch {
    pub title: String,
    pub expected: String,
    pub actual: String,
}

/// An interceptor together with the scope it belongs to.
pub(crate) struct Expectations<'a> {
    pub scope: &'a ScopeDefinition,
    pub interceptor: &'a InterceptorDefinition,
}

pub(crate) trait Matcher {
    fn matches(&self, req: &HttpRequest, exp: &Expectations) -> bool;
    fn mismatches(&self, req: &HttpRequest, exp: &Expectations) -> Vec<Mismatch>;
}

pub(crate) fn all() -> Vec<Box<dyn Matcher + Sync + Send>> {
    vec![
        Box::new(method_matcher::MethodMatcher::new()),
        Box::new(path_matcher::PathMatcher::new()),
        Box::new(query_matcher::QueryParamMatcher::new()),
        Box::new(header_matcher::HeaderMatcher::new()),
        Box::new(body_matcher::BodyContentMatcher::new()),
    ]
}
