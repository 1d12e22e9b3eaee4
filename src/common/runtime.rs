use std::{future::Future, time::Duration};

/// Cooperative wait. Uses a runtime-agnostic timer so engine futures can be driven by tokio,
/// any other executor, or [`Join`](crate::Join).
pub(crate) async fn sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    futures_timer::Delay::new(duration).await
}

pub(crate) async fn sleep_opt(duration: Option<Duration>) {
    if let Some(duration) = duration {
        sleep(duration).await;
    }
}

pub(crate) fn block_on_current_thread<F, O>(f: F) -> O
where
    F: Future<Output = O>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Cannot build local tokio runtime");

    runtime.block_on(f)
}
