//! Signal handling for graceful shutdown

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

/// Shutdown flag shared between signal handlers and the frame loop
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Setup signal handlers for graceful shutdown. Must run inside a tokio runtime.
pub fn setup_signal_handlers() -> Result<ShutdownSignal> {
    let signal = ShutdownSignal::new();

    // Handle Ctrl+C (SIGINT)
    let ctrl_c = signal.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C signal: {}", e);
            return;
        }

        info!("Ctrl+C signal received");
        ctrl_c.trigger();
    });

    // Handle SIGTERM (Unix only)
    #[cfg(unix)]
    {
        use anyhow::Context;
        use signal_hook::consts::SIGTERM;

        signal_hook::flag::register(SIGTERM, signal.flag.clone())
            .context("Failed to register SIGTERM handler")?;
    }

    Ok(signal)
}
