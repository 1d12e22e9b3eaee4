pub use client::{intercept, InterceptingClient};
pub use fixtures::{define, load, load_defs};
pub use interceptor::Interceptor;
pub use scope::{nock, nock_with_options, Scope};

pub mod back;
mod client;
mod fixtures;
mod interceptor;
pub mod recorder;
mod scope;
