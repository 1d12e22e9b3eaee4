//! Captures real traffic and turns it into replayable definitions.
//!
//! While a recording is in effect every request passes through to the network, and each
//! exchange is appended to an in-memory buffer as a [`FixtureDefinition`].
//!
//! ```rust,no_run
//! use httpnock::{recorder, InterceptingClient};
//!
//! # async fn run() -> Result<(), httpnock::Error> {
//! recorder::rec(recorder::RecorderOptions::new().output_objects(true))?;
//!
//! let client = InterceptingClient::new();
//! let req = http::Request::get("http://example.com/").body(bytes::Bytes::new()).unwrap();
//! client.send(req).await?;
//!
//! let defs = recorder::play().objects().unwrap_or_default();
//! recorder::stop();
//! httpnock::define(defs)?;
//! # Ok(())
//! # }
//! ```
use crate::{
    common::{data::FixtureDefinition, error::Error},
    engine::{state::StateManager, REGISTRY},
};

pub use crate::engine::recorder::{Played, RecorderOptions};

/// Starts recording. Accepts [`RecorderOptions`] or a `bool` (`true` logs every captured
/// definition, `false` records silently).
///
/// Fails with [`Error::RecordingInProgress`] if a recording is already in effect.
pub fn rec<O: Into<RecorderOptions>>(options: O) -> Result<(), Error> {
    let options = options.into();
    tracing::debug!("Starting recording with {:?}", options);
    REGISTRY.start_recording(options)
}

/// Returns the captured buffer, as definitions or as builder source code depending on the
/// `output_objects` option of the latest recording.
pub fn play() -> Played {
    REGISTRY.play()
}

/// The captured buffer as definitions, regardless of the recording options.
pub fn recorded() -> Vec<FixtureDefinition> {
    REGISTRY.recorded()
}

/// Empties the captured buffer.
pub fn clear() {
    REGISTRY.clear_recording()
}

/// Ends the recording. The buffer is kept until [`clear`] is called.
pub fn stop() {
    REGISTRY.stop_recording()
}

pub fn is_recording() -> bool {
    REGISTRY.is_recording()
}
