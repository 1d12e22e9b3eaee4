use std::{
    borrow::Cow,
    env,
    fs::{create_dir_all, File},
    future::Future,
    io::{Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
    task::{Context, Poll},
};

use crossbeam_utils::sync::{Parker, Unparker};
use futures_util::{pin_mut, task::ArcWake};

// ===============================================================================================
// Environment
// ===============================================================================================
#[doc(hidden)]
pub(crate) fn read_env(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(value) => value,
        Err(_) => default.to_string(),
    }
}

pub(crate) fn read_env_flag(name: &str) -> bool {
    matches!(
        read_env(name, "false").trim().to_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

// ===============================================================================================
// Futures
// ===============================================================================================
/// Blocks the current thread until a future resolves. Engine futures only wait on
/// `futures-timer` delays and channels, so no async runtime is required to drive them.
#[doc(hidden)]
pub trait Join: Future {
    fn join(self) -> <Self as Future>::Output;
}

impl<F: Future> Join for F {
    fn join(self) -> <Self as Future>::Output {
        struct ThreadWaker(Unparker);

        impl ArcWake for ThreadWaker {
            fn wake_by_ref(arc_self: &Arc<Self>) {
                arc_self.0.unpark();
            }
        }

        let parker = Parker::new();
        let waker = futures_util::task::waker(Arc::new(ThreadWaker(parker.unparker().clone())));
        let mut context = Context::from_waker(&waker);

        let future = self;
        pin_mut!(future);

        loop {
            match future.as_mut().poll(&mut context) {
                Poll::Ready(output) => return output,
                Poll::Pending => parker.park(),
            }
        }
    }
}

// ===============================================================================================
// Files
// ===============================================================================================
/// Resolves a relative path against the crate under test (`CARGO_MANIFEST_DIR`), falling back
/// to the current working directory.
pub fn resolve_resource_path<P: AsRef<Path>>(resource_path: P) -> Result<PathBuf, String> {
    let path = resource_path.as_ref();
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    match env::var("CARGO_MANIFEST_DIR") {
        Ok(manifest_path) => Ok(Path::new(&manifest_path).join(path)),
        Err(_) => env::current_dir()
            .map(|dir| dir.join(path))
            .map_err(|e| e.to_string()),
    }
}

pub fn read_file<P: AsRef<Path>>(absolute_path: P) -> Result<Vec<u8>, std::io::Error> {
    let mut f = File::open(absolute_path)?;
    let mut buffer = Vec::new();
    f.read_to_end(&mut buffer)?;
    Ok(buffer)
}

pub fn write_file<P: AsRef<Path>>(
    resource_path: P,
    content: &[u8],
    create_dir: bool,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut path = resource_path.as_ref().to_path_buf();

    if path.is_relative() {
        let current_dir = env::current_dir()?;
        path = current_dir.join(path);
    }

    if create_dir {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
    }

    let mut file = File::create(&path)?;
    file.write_all(content)?;
    file.flush()?;

    Ok(path)
}

// ===============================================================================================
// Text
// ===============================================================================================
/// Converts bytes to a UTF-8 string, replacing invalid sequences if required.
pub(crate) fn to_maybe_lossy_str(bytes: &[u8]) -> Cow<str> {
    match std::str::from_utf8(bytes) {
        Ok(valid_str) => Cow::Borrowed(valid_str),
        Err(_) => String::from_utf8_lossy(bytes),
    }
}
