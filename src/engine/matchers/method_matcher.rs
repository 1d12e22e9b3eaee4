use crate::{
    common::data::HttpRequest,
    engine::matchers::{Expectations, Matcher, Mismatch},
};

pub(crate) struct MethodMatcher {}

impl MethodMatcher {
    pub fn new() -> Self {
        Self {}
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &HttpRequest, exp: &Expectations) -> bool {
        exp.interceptor.method.eq_ignore_ascii_case(req.method_str())
    }

    fn mismatches(&self, req: &HttpRequest, exp: &Expectations) -> Vec<Mismatch> {
        match self.matches(req, exp) {
            true => Vec::new(),
            false => vec![Mismatch {
                title: "Request method does not match".to_string(),
                expected: exp.interceptor.method.clone(),
                actual: req.method_str().to_string(),
            }],
        }
    }
}
