use std::future::Future;

use anyhow::Result;
use tokio::signal::unix::{self, SignalKind};

pub const TERMINATION_SIGNALS: [SignalKind; 3] = [
    SignalKind::interrupt(),
    SignalKind::terminate(),
    SignalKind::quit(),
];

/// Drives `f` until it completes or the process receives a termination signal.
pub async fn run_or_terminate<F>(f: F) -> Result<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    let run_fut = tokio::spawn(f);
    let stop_fut = any_signal(TERMINATION_SIGNALS)?;
    tokio::select! {
        res = run_fut => res?,
        signal = stop_fut => {
            tracing::info!(signal = ?signal, "received termination signal");
            Ok(())
        }
    }
}

async fn wait_for(mut stream: unix::Signal, kind: SignalKind) -> SignalKind {
    stream.recv().await;
    kind
}

/// Resolves with the first of `signals` delivered to the process.
pub fn any_signal<I>(signals: I) -> Result<impl Future<Output = SignalKind>>
where
    I: IntoIterator<Item = SignalKind>,
{
    let waiters = signals
        .into_iter()
        .map(|kind| -> Result<_> { Ok(Box::pin(wait_for(unix::signal(kind)?, kind))) })
        .collect::<Result<Vec<_>>>()?;

    Ok(async move { futures_util::future::select_all(waiters).await.0 })
}
