use crate::common::data::{FixtureDefinition, FixtureHeaderValue, HttpRequest, MockResponse};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::Value;
use std::{collections::BTreeMap, fmt, sync::Arc};

const SEPARATOR: &str = "<<<<<<-- cut here -->>>>>>";

pub type RecorderLogFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Controls a recording session started with [`recorder::rec`](crate::recorder::rec).
#[derive(Clone)]
pub struct RecorderOptions {
    /// Do not log captured definitions as they are recorded.
    pub dont_print: bool,
    /// Make [`play`](crate::recorder::play) return definitions instead of source snippets.
    pub output_objects: bool,
    pub enable_reqheaders_recording: bool,
    /// Receives every captured definition unless `dont_print` is set. Defaults to an `info`
    /// level tracing event.
    pub logging: Option<RecorderLogFn>,
    pub use_separator: bool,
}

impl RecorderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dont_print(mut self, value: bool) -> Self {
        self.dont_print = value;
        self
    }

    pub fn output_objects(mut self, value: bool) -> Self {
        self.output_objects = value;
        self
    }

    pub fn enable_reqheaders_recording(mut self, value: bool) -> Self {
        self.enable_reqheaders_recording = value;
        self
    }

    pub fn logging<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.logging = Some(Arc::new(f));
        self
    }

    pub fn use_separator(mut self, value: bool) -> Self {
        self.use_separator = value;
        self
    }
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            dont_print: false,
            output_objects: false,
            enable_reqheaders_recording: false,
            logging: None,
            use_separator: true,
        }
    }
}

/// `rec(true)` prints captured definitions, `rec(false)` records silently.
impl From<bool> for RecorderOptions {
    fn from(print: bool) -> Self {
        RecorderOptions::default().dont_print(!print)
    }
}

impl fmt::Debug for RecorderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecorderOptions")
            .field("dont_print", &self.dont_print)
            .field("output_objects", &self.output_objects)
            .field("enable_reqheaders_recording", &self.enable_reqheaders_recording)
            .field("logging", &self.logging.is_some())
            .field("use_separator", &self.use_separator)
            .finish()
    }
}

/// The captured buffer as returned by [`play`](crate::recorder::play).
#[derive(Debug, Clone, PartialEq)]
pub enum Played {
    Objects(Vec<FixtureDefinition>),
    Code(Vec<String>),
}

impl Played {
    pub fn len(&self) -> usize {
        match self {
            Played::Objects(defs) => defs.len(),
            Played::Code(snippets) => snippets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn objects(self) -> Option<Vec<FixtureDefinition>> {
        match self {
            Played::Objects(defs) => Some(defs),
            Played::Code(_) => None,
        }
    }

    pub fn code(self) -> Option<Vec<String>> {
        match self {
            Played::Code(snippets) => Some(snippets),
            Played::Objects(_) => None,
        }
    }
}

// ************************************************************************************************
// RecorderState
// ************************************************************************************************
#[derive(Default)]
pub(crate) struct RecorderState {
    session: Option<RecorderOptions>,
    outputs: Vec<FixtureDefinition>,
    output_objects: bool,
}

/// A definition captured while recording, plus what to print for it.
pub(crate) struct Captured {
    pub logging: Option<RecorderLogFn>,
    pub output: Option<String>,
}

impl RecorderState {
    pub(crate) fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Returns `false` if a session is already in effect.
    pub(crate) fn start(&mut self, options: RecorderOptions) -> bool {
        if self.session.is_some() {
            return false;
        }
        self.output_objects = options.output_objects;
        self.session = Some(options);
        true
    }

    pub(crate) fn stop(&mut self) {
        self.session = None;
    }

    pub(crate) fn clear(&mut self) {
        self.outputs.clear();
    }

    pub(crate) fn record(&mut self, req: &HttpRequest, res: &MockResponse) -> Option<Captured> {
        let options = self.session.as_ref()?;
        let def = capture(req, res, options.enable_reqheaders_recording);

        let output = match options.dont_print {
            true => None,
            false => {
                let rendered = match options.output_objects {
                    true => serde_json::to_string_pretty(&def).unwrap_or_default(),
                    false => render_code(&def),
                };
                Some(match options.use_separator {
                    true => format!("\n{}\n\n{}\n\n{}\n", SEPARATOR, rendered, SEPARATOR),
                    false => rendered,
                })
            }
        };
        let captured = Captured {
            logging: options.logging.clone(),
            output,
        };

        self.outputs.push(def);
        Some(captured)
    }

    pub(crate) fn play(&self) -> Played {
        match self.output_objects {
            true => Played::Objects(self.outputs.clone()),
            false => Played::Code(self.outputs.iter().map(render_code).collect()),
        }
    }

    pub(crate) fn outputs(&self) -> &[FixtureDefinition] {
        &self.outputs
    }
}

impl Captured {
    pub(crate) fn emit(self) {
        if let Some(output) = self.output {
            match self.logging {
                Some(f) => f(&output),
                None => tracing::info!("{}", output),
            }
        }
    }
}

// ************************************************************************************************
// Capture
// ************************************************************************************************
/// Bodies become JSON values when they re-serialize byte-identically, text when valid UTF-8,
/// and base64 otherwise (flagged binary).
fn encode_body(body: &[u8]) -> (Value, bool) {
    match std::str::from_utf8(body) {
        Ok(text) => match serde_json::from_str::<Value>(text) {
            Ok(json) if (json.is_object() || json.is_array()) && json.to_string() == text => {
                (json, false)
            }
            _ => (Value::String(text.to_string()), false),
        },
        Err(_) => (Value::String(BASE64.encode(body)), true),
    }
}

/// Repeated headers keep every value, in order.
fn response_header_map(headers: &[(String, String)]) -> BTreeMap<String, FixtureHeaderValue> {
    let mut map: BTreeMap<String, FixtureHeaderValue> = BTreeMap::new();
    for (name, value) in headers {
        map.entry(name.to_lowercase())
            .and_modify(|existing| existing.push(value.clone()))
            .or_insert_with(|| FixtureHeaderValue::from(value.as_str()));
    }
    map
}

/// Header matchers compare against the first value of a header, so that is all that is kept.
fn request_header_map(headers: &[(String, String)]) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        map.entry(name.to_lowercase()).or_insert_with(|| value.clone());
    }
    map
}

pub(crate) fn capture(
    req: &HttpRequest,
    res: &MockResponse,
    include_reqheaders: bool,
) -> FixtureDefinition {
    let (body, body_is_binary) = match req.body().is_empty() {
        true => (None, false),
        false => {
            let (value, binary) = encode_body(req.body());
            (Some(value), binary)
        }
    };

    let (response, response_is_binary) = match res.body.is_empty() {
        true => (None, false),
        false => {
            let (value, binary) = encode_body(&res.body);
            (Some(value), binary)
        }
    };

    let headers = match res.headers.is_empty() {
        true => None,
        false => Some(response_header_map(&res.headers)),
    };

    let reqheaders = match include_reqheaders && !req.headers_vec().is_empty() {
        true => Some(request_header_map(req.headers_vec())),
        false => None,
    };

    FixtureDefinition {
        scope: req.origin_with_port(),
        method: req.method_str().to_string(),
        path: req.path_and_query(),
        body,
        status: res.status,
        response,
        headers,
        reqheaders,
        body_is_binary,
        response_is_binary,
    }
}

// ************************************************************************************************
// Code rendering
// ************************************************************************************************
fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => format!("{:?}", text),
        other => format!("serde_json::json!({})", other),
    }
}

/// Renders a definition as builder code that reproduces the interceptor.
pub(crate) fn render_code(def: &FixtureDefinition) -> String {
    let mut lines = vec![format!("httpnock::nock({:?})", def.scope)];

    let method = def.method.to_lowercase();
    match method.as_str() {
        "get" | "post" | "put" | "patch" | "head" | "delete" | "options" => {
            lines.push(format!(".{}({:?})", method, def.path))
        }
        _ => lines.push(format!(".intercept({:?}, {:?})", def.path, def.method)),
    }

    if let Some(reqheaders) = &def.reqheaders {
        for (name, value) in reqheaders {
            lines.push(format!(".match_header({:?}, {:?})", name, value));
        }
    }

    match (&def.body, def.body_is_binary) {
        (None, _) => {}
        (Some(Value::String(encoded)), true) => lines.push(format!(
            ".body(httpnock::BodyMatcher::from_base64({:?}).unwrap())",
            encoded
        )),
        (Some(body), _) => lines.push(format!(".body({})", render_value(body))),
    }

    let response = match (&def.response, def.response_is_binary) {
        (None, _) => "\"\"".to_string(),
        (Some(Value::String(encoded)), true) => format!(
            "httpnock::ReplyBody::from_base64({:?}).unwrap()",
            encoded
        ),
        (Some(value), _) => render_value(value),
    };

    let headers: Vec<String> = def
        .headers
        .iter()
        .flatten()
        .flat_map(|(name, value)| {
            value
                .values()
                .iter()
                .map(move |value| format!("({:?}, {:?})", name, value))
        })
        .collect();

    lines.push(format!(
        ".reply_with_headers({}, {}, [{}]);",
        def.status,
        response,
        headers.join(", ")
    ));

    lines.join("\n    ")
}
