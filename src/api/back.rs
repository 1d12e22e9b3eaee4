//! Record-once, replay-forever workflows over named fixture files.
//!
//! The mode is process-wide and never reset automatically. It starts from the `NOCK_BACK_MODE`
//! environment variable (`dryrun` when unset), the fixtures directory from
//! `NOCK_BACK_FIXTURES`.
//!
//! | mode       | interception | net connect | fixture present  | fixture absent    |
//! |------------|--------------|-------------|------------------|-------------------|
//! | `wild`     | detached     | enabled     | ignored          | ignored           |
//! | `dryrun`   | attached     | enabled     | loaded, unmocked requests pass through | nothing loaded |
//! | `record`   | attached     | disabled after loading | loaded | traffic is recorded and written on `done` |
//! | `lockdown` | attached     | disabled    | loaded           | nothing loaded    |
use crate::{
    api::{
        fixtures::{define_with_options, load_defs},
        recorder,
        scope::Scope,
    },
    common::{
        data::FixtureDefinition,
        error::Error,
        util::read_env,
    },
    engine::{
        definition::NockOptions,
        persistence::write_fixture_file,
        recorder::RecorderOptions,
        state::StateManager,
        REGISTRY,
    },
};
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackMode {
    Wild,
    Dryrun,
    Record,
    Lockdown,
}

impl FromStr for BackMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wild" => Ok(BackMode::Wild),
            "dryrun" => Ok(BackMode::Dryrun),
            "record" => Ok(BackMode::Record),
            "lockdown" => Ok(BackMode::Lockdown),
            _ => Err(Error::InvalidBackMode(s.to_string())),
        }
    }
}

impl fmt::Display for BackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackMode::Wild => "wild",
            BackMode::Dryrun => "dryrun",
            BackMode::Record => "record",
            BackMode::Lockdown => "lockdown",
        };
        write!(f, "{}", name)
    }
}

struct BackState {
    mode: BackMode,
    fixtures: Option<PathBuf>,
}

impl BackState {
    fn from_env() -> Self {
        let mode_name = read_env("NOCK_BACK_MODE", "dryrun");
        let mode = mode_name.parse().unwrap_or_else(|err| {
            tracing::warn!("{}, falling back to dryrun", err);
            BackMode::Dryrun
        });
        let fixtures = Some(read_env("NOCK_BACK_FIXTURES", ""))
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);
        Self { mode, fixtures }
    }
}

lazy_static! {
    static ref BACK_STATE: Mutex<BackState> = Mutex::new(BackState::from_env());
}

fn back_state() -> MutexGuard<'static, BackState> {
    BACK_STATE.lock().unwrap_or_else(|err| err.into_inner())
}

pub fn set_mode(mode: BackMode) {
    tracing::debug!("Setting back mode to {}", mode);
    back_state().mode = mode;
}

/// Parses and sets the mode. Unknown names fail with [`Error::InvalidBackMode`] and leave the
/// current mode unchanged.
pub fn set_mode_str(mode: &str) -> Result<(), Error> {
    set_mode(mode.parse()?);
    Ok(())
}

pub fn current_mode() -> BackMode {
    back_state().mode
}

pub fn set_fixtures<P: Into<PathBuf>>(dir: P) {
    back_state().fixtures = Some(dir.into());
}

pub fn fixtures() -> Option<PathBuf> {
    back_state().fixtures.clone()
}

// ************************************************************************************************
// BackOptions
// ************************************************************************************************
type BeforeFn = Arc<dyn Fn(&mut FixtureDefinition) + Send + Sync>;
type AfterFn = Arc<dyn Fn(&Scope) + Send + Sync>;
type AfterRecordFn = Arc<dyn Fn(Vec<FixtureDefinition>) -> Vec<FixtureDefinition> + Send + Sync>;

/// Hooks around loading and recording fixtures.
#[derive(Clone, Default)]
pub struct BackOptions {
    before: Option<BeforeFn>,
    after: Option<AfterFn>,
    after_record: Option<AfterRecordFn>,
    reqheaders_recording: bool,
}

impl BackOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs on every loaded definition before its scope is created.
    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut FixtureDefinition) + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(f));
        self
    }

    /// Runs on every scope created from the fixture.
    pub fn after<F>(mut self, f: F) -> Self
    where
        F: Fn(&Scope) + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(f));
        self
    }

    /// Post-processes recorded definitions before they are written.
    pub fn after_record<F>(mut self, f: F) -> Self
    where
        F: Fn(Vec<FixtureDefinition>) -> Vec<FixtureDefinition> + Send + Sync + 'static,
    {
        self.after_record = Some(Arc::new(f));
        self
    }

    pub fn enable_reqheaders_recording(mut self, value: bool) -> Self {
        self.reqheaders_recording = value;
        self
    }
}

impl fmt::Debug for BackOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackOptions")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("after_record", &self.after_record.is_some())
            .field("reqheaders_recording", &self.reqheaders_recording)
            .finish()
    }
}

// ************************************************************************************************
// BackContext
// ************************************************************************************************
/// State of one fixture session, created by [`context`] or handed to the closure of [`back`].
#[derive(Debug)]
pub struct BackContext {
    name: String,
    mode: BackMode,
    fixture_path: Option<PathBuf>,
    scopes: Vec<Scope>,
    loaded: bool,
    recording: bool,
    options: BackOptions,
}

impl BackContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> BackMode {
        self.mode
    }

    pub fn fixture_path(&self) -> Option<&Path> {
        self.fixture_path.as_deref()
    }

    /// Scopes created from the fixture file.
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Whether a fixture file was found and loaded.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Whether this session records traffic that [`done`](Self::done) will write.
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// # Panics
    /// Panics if an interceptor loaded from the fixture was not used.
    pub fn assert_scopes_finished(&self) {
        for scope in &self.scopes {
            scope.done();
        }
    }

    /// Ends the session. In record mode without a fixture, writes the captured traffic to the
    /// fixture file (nothing is written if no traffic was captured).
    pub fn done(self) -> Result<(), Error> {
        if !self.recording {
            return Ok(());
        }

        let mut defs = recorder::recorded();
        recorder::stop();
        recorder::clear();

        if let Some(after_record) = &self.options.after_record {
            defs = after_record(defs);
        }

        if defs.is_empty() {
            tracing::debug!("Nothing recorded for fixture '{}'", self.name);
            return Ok(());
        }

        let path = self
            .fixture_path
            .ok_or_else(|| Error::FixtureWrite("fixtures directory is not set".to_string()))?;
        let path = write_fixture_file(&path, &defs)?;
        tracing::info!("Wrote {} recorded definitions to '{}'", defs.len(), path.display());
        Ok(())
    }
}

// ************************************************************************************************
// Entry points
// ************************************************************************************************
/// Runs `f` inside a fixture session and finishes the session afterwards.
///
/// ```rust,no_run
/// use httpnock::back::{self, BackMode};
///
/// back::set_fixtures("tests/fixtures");
/// back::set_mode(BackMode::Record);
///
/// back::back("users.json", |ctx| {
///     // requests made here are recorded on the first run and replayed afterwards
///     assert_eq!(ctx.name(), "users.json");
/// })
/// .unwrap();
/// ```
pub fn back<F, R>(name: &str, f: F) -> Result<R, Error>
where
    F: FnOnce(&BackContext) -> R,
{
    back_with_options(name, BackOptions::default(), f)
}

pub fn back_with_options<F, R>(name: &str, options: BackOptions, f: F) -> Result<R, Error>
where
    F: FnOnce(&BackContext) -> R,
{
    let ctx = context_with_options(name, options)?;
    let result = f(&ctx);
    ctx.done()?;
    Ok(result)
}

pub fn context(name: &str) -> Result<BackContext, Error> {
    context_with_options(name, BackOptions::default())
}

/// Sets up the registry for the current mode and loads the named fixture where the mode asks
/// for it. The caller finishes the session with [`BackContext::done`].
pub fn context_with_options(name: &str, options: BackOptions) -> Result<BackContext, Error> {
    let (mode, fixtures) = {
        let state = back_state();
        (state.mode, state.fixtures.clone())
    };

    let fixture_path = fixtures.map(|dir| dir.join(name));
    let fixture_exists = fixture_path.as_ref().map_or(false, |path| path.is_file());

    tracing::debug!(
        "Starting back session '{}' in {} mode (fixture present: {})",
        name,
        mode,
        fixture_exists
    );

    let mut ctx = BackContext {
        name: name.to_string(),
        mode,
        fixture_path: fixture_path.clone(),
        scopes: Vec::new(),
        loaded: false,
        recording: false,
        options,
    };

    match mode {
        BackMode::Wild => {
            REGISTRY.restore();
            REGISTRY.reset();
            REGISTRY.enable_net_connect(None);
        }
        BackMode::Dryrun => {
            REGISTRY.activate();
            REGISTRY.enable_net_connect(None);
            if fixture_exists {
                ctx.scopes = load_fixture(&mut ctx, NockOptions::new().allow_unmocked(true))?;
            }
        }
        BackMode::Record => {
            REGISTRY.activate();
            if fixture_exists {
                ctx.scopes = load_fixture(&mut ctx, NockOptions::new())?;
                REGISTRY.disable_net_connect();
            } else {
                if fixture_path.is_none() {
                    return Err(Error::FixtureWrite(
                        "fixtures directory is not set".to_string(),
                    ));
                }
                recorder::clear();
                recorder::rec(
                    RecorderOptions::new()
                        .output_objects(true)
                        .dont_print(true)
                        .enable_reqheaders_recording(ctx.options.reqheaders_recording),
                )?;
                ctx.recording = true;
            }
        }
        BackMode::Lockdown => {
            REGISTRY.activate();
            REGISTRY.disable_net_connect();
            if fixture_exists {
                ctx.scopes = load_fixture(&mut ctx, NockOptions::new())?;
            }
        }
    }

    Ok(ctx)
}

fn load_fixture(ctx: &mut BackContext, options: NockOptions) -> Result<Vec<Scope>, Error> {
    let path = match &ctx.fixture_path {
        Some(path) => path,
        None => return Ok(Vec::new()),
    };

    let mut defs = load_defs(path)?;
    if let Some(before) = &ctx.options.before {
        defs.iter_mut().for_each(|def| before(def));
    }

    let scopes = define_with_options(defs, options)?;
    if let Some(after) = &ctx.options.after {
        scopes.iter().for_each(|scope| after(scope));
    }

    ctx.loaded = true;
    Ok(scopes)
}
