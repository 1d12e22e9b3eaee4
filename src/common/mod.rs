pub mod data;
pub mod error;
pub mod http;
pub(crate) mod runtime;
pub mod util;
