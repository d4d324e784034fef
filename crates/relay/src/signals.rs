//! Termination signal handling.
//!
//! The relay runs until the operator asks it to stop. On Unix both SIGINT
//! (Ctrl+C in a terminal) and SIGTERM (service managers, container stops)
//! start a graceful shutdown. Other platforms only get Ctrl+C.

/// Waits for the first termination signal and returns its name.
///
/// Fails only if the signal handlers cannot be installed.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
    };
    Ok(name)
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}
