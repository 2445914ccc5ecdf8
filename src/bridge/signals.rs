//! Termination signal listener

use tokio::task::JoinHandle;
use tracing::warn;

use super::ShutdownHandle;

/// Spawn a task forwarding SIGINT/SIGTERM (Ctrl+C elsewhere) to `shutdown`.
///
/// The task keeps listening after the first signal so repeated signals are
/// observed (and ignored) instead of killing the process. Abort it once the
/// session has finished.
pub fn spawn_signal_listener(shutdown: ShutdownHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            match (
                signal(SignalKind::interrupt()),
                signal(SignalKind::terminate()),
            ) {
                (Ok(mut sigint), Ok(mut sigterm)) => loop {
                    let name = tokio::select! {
                        _ = sigint.recv() => "SIGINT",
                        _ = sigterm.recv() => "SIGTERM",
                    };
                    shutdown.on_termination_signal(name);
                },
                _ => {
                    warn!("Failed to install signal handlers, falling back to Ctrl+C");
                    ctrl_c_loop(&shutdown).await;
                }
            }
        }

        #[cfg(not(unix))]
        ctrl_c_loop(&shutdown).await;
    })
}

async fn ctrl_c_loop(shutdown: &ShutdownHandle) {
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        shutdown.on_termination_signal("SIGINT");
    }
}
