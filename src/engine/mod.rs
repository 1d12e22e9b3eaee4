use crate::engine::state::Registry;

pub(crate) mod definition;
pub(crate) mod matchers;
pub(crate) mod persistence;
pub(crate) mod recorder;
pub(crate) mod response;
pub(crate) mod state;

lazy_static! {
    pub(crate) static ref REGISTRY: Registry = Registry::new();
}
