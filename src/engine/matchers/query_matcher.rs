use crate::{
    common::data::HttpRequest,
    engine::matchers::{Expectations, Matcher, Mismatch},
};

pub(crate) struct QueryParamMatcher {}

impl QueryParamMatcher {
    pub fn new() -> Self {
        Self {}
    }
}

impl Matcher for QueryParamMatcher {
    fn matches(&self, req: &HttpRequest, exp: &Expectations) -> bool {
        exp.interceptor.query.matches(&req.query_params_vec())
    }

    fn mismatches(&self, req: &HttpRequest, exp: &Expectations) -> Vec<Mismatch> {
        match self.matches(req, exp) {
            true => Vec::new(),
            false => vec![Mismatch {
                title: "Query parameters do not match".to_string(),
                expected: format!("{:?}", exp.interceptor.query),
                actual: req.query().unwrap_or_default().to_string(),
            }],
        }
    }
}
