use crate::{
    api::scope::{nock_with_options, Scope},
    common::{data::FixtureDefinition, error::Error},
    engine::{
        definition::NockOptions,
        persistence::{read_fixture_file, validate_fixture_defs},
        matchers::values::BodyMatcher,
        response::ReplyBody,
    },
};
use serde_json::Value;
use std::path::Path;

/// Reads fixture definitions from a JSON file without registering them.
pub fn load_defs<P: AsRef<Path>>(path: P) -> Result<Vec<FixtureDefinition>, Error> {
    Ok(read_fixture_file(path)?)
}

/// Registers one scope per definition and returns them in order.
///
/// Every definition is validated first, so a malformed definition leaves the registry
/// untouched.
pub fn define<I>(defs: I) -> Result<Vec<Scope>, Error>
where
    I: IntoIterator<Item = FixtureDefinition>,
{
    define_with_options(defs, NockOptions::default())
}

pub(crate) fn define_with_options<I>(defs: I, options: NockOptions) -> Result<Vec<Scope>, Error>
where
    I: IntoIterator<Item = FixtureDefinition>,
{
    let defs: Vec<FixtureDefinition> = defs.into_iter().collect();
    validate_fixture_defs(&defs)?;

    tracing::debug!("Defining {} interceptors from fixture definitions", defs.len());

    Ok(defs
        .into_iter()
        .map(|def| define_one(def, options.clone()))
        .collect())
}

fn define_one(def: FixtureDefinition, options: NockOptions) -> Scope {
    let options = match &def.reqheaders {
        Some(reqheaders) => options.reqheaders(reqheaders.clone()),
        None => options,
    };

    let mut interceptor = nock_with_options(def.scope.as_str(), options).intercept(def.path.as_str(), &def.method);

    match (def.body, def.body_is_binary) {
        (None, _) => {}
        (Some(Value::String(encoded)), true) => {
            // Validated above.
            if let Ok(body) = BodyMatcher::from_base64(&encoded) {
                interceptor = interceptor.body(body);
            }
        }
        (Some(body), _) => interceptor = interceptor.body(body),
    }

    let headers: Vec<(String, String)> = def
        .headers
        .unwrap_or_default()
        .into_iter()
        .flat_map(|(name, value)| {
            value
                .values()
                .iter()
                .map(|value| (name.clone(), value.clone()))
                .collect::<Vec<_>>()
        })
        .collect();

    let response = match (def.response, def.response_is_binary) {
        (None, _) => ReplyBody::Empty,
        (Some(Value::String(encoded)), true) => {
            // Validated above.
            ReplyBody::from_base64(&encoded).unwrap_or(ReplyBody::Empty)
        }
        (Some(value), _) => ReplyBody::from(value),
    };

    interceptor.reply_with_headers(def.status, response, headers)
}

/// [`load_defs`] followed by [`define`].
pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<Scope>, Error> {
    define(load_defs(path)?)
}

pub(crate) fn load_with_options<P: AsRef<Path>>(
    path: P,
    options: NockOptions,
) -> Result<Vec<Scope>, Error> {
    define_with_options(load_defs(path)?, options)
}
