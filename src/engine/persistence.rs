use crate::common::{
    data::{FixtureDefinition, NetLocation},
    util::{read_file, resolve_resource_path, write_file},
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot read from fixture file: {0}")]
    FileReadError(String),
    #[error("cannot write fixture file: {0}")]
    FileWriteError(String),
    #[error("cannot deserialize JSON: {0}")]
    DeserializationError(String),
    #[error("cannot serialize JSON: {0}")]
    SerializationError(String),
    #[error("invalid fixture definition #{index}: {reason}")]
    ValidationError { index: usize, reason: String },
}

impl From<Error> for crate::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::FileReadError(msg) => crate::Error::FixtureRead(msg),
            Error::FileWriteError(msg) | Error::SerializationError(msg) => {
                crate::Error::FixtureWrite(msg)
            }
            other => crate::Error::FixtureParse(other.to_string()),
        }
    }
}

pub fn deserialize_fixture_defs(json_content: &str) -> Result<Vec<FixtureDefinition>, Error> {
    let value: Value = serde_json::from_str(json_content)
        .map_err(|err| Error::DeserializationError(err.to_string()))?;

    // A single definition is accepted as well as a list.
    let value = match value {
        Value::Array(_) => value,
        Value::Object(_) => Value::Array(vec![value]),
        other => {
            return Err(Error::DeserializationError(format!(
                "expected a list of definitions, found {}",
                other
            )))
        }
    };

    serde_json::from_value(value).map_err(|err| Error::DeserializationError(err.to_string()))
}

pub fn serialize_fixture_defs(defs: &[FixtureDefinition]) -> Result<String, Error> {
    serde_json::to_string_pretty(defs).map_err(|err| Error::SerializationError(err.to_string()))
}

pub fn read_fixture_file<P: AsRef<Path>>(path: P) -> Result<Vec<FixtureDefinition>, Error> {
    let path = resolve_resource_path(path).map_err(Error::FileReadError)?;

    tracing::info!("Loading fixture definitions from '{}'", path.display());

    let content = read_file(&path).map_err(|err| {
        Error::FileReadError(format!("{}: {}", path.display(), err))
    })?;
    let content = String::from_utf8(content).map_err(|err| Error::FileReadError(err.to_string()))?;

    deserialize_fixture_defs(&content)
}

pub fn write_fixture_file<P: AsRef<Path>>(
    path: P,
    defs: &[FixtureDefinition],
) -> Result<PathBuf, Error> {
    let content = serialize_fixture_defs(defs)?;
    write_file(path, content.as_bytes(), true).map_err(|err| Error::FileWriteError(err.to_string()))
}

/// Checks everything `define` would otherwise fail on halfway through.
pub fn validate_fixture_defs(defs: &[FixtureDefinition]) -> Result<(), Error> {
    for (index, def) in defs.iter().enumerate() {
        validate(def).map_err(|reason| Error::ValidationError { index, reason })?;
    }
    Ok(())
}

fn validate(def: &FixtureDefinition) -> Result<(), String> {
    NetLocation::parse(&def.scope).map_err(|err| err.to_string())?;

    http::Method::from_bytes(def.method.as_bytes())
        .map_err(|_| format!("invalid method '{}'", def.method))?;

    if !def.path.starts_with('/') {
        return Err(format!("path '{}' must start with '/'", def.path));
    }

    http::StatusCode::from_u16(def.status).map_err(|err| err.to_string())?;

    for name in def
        .headers
        .iter()
        .flatten()
        .map(|(name, _)| name)
        .chain(def.reqheaders.iter().flatten().map(|(name, _)| name))
    {
        http::HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| format!("invalid header name '{}'", name))?;
    }

    if def.body_is_binary {
        validate_base64("body", &def.body)?;
    }
    if def.response_is_binary {
        validate_base64("response", &def.response)?;
    }

    Ok(())
}

fn validate_base64(field: &str, value: &Option<Value>) -> Result<(), String> {
    match value {
        Some(Value::String(encoded)) => BASE64
            .decode(encoded)
            .map(|_| ())
            .map_err(|err| format!("binary {} is not valid base64: {}", field, err)),
        None => Ok(()),
        Some(_) => Err(format!("binary {} must be a base64 string", field)),
    }
}
