//! Command implementations.

mod history;
mod read;

use std::sync::Arc;

use anyhow::{Context, Result};
use bluetemp_core::{PlatformTransport, Session, SessionConfig, Transport};

pub use history::cmd_history;
pub use read::{ReadArgs, cmd_read, cmd_single};

/// How a command finished without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Done,
    /// Ctrl-C arrived before the command finished.
    Interrupted,
}

/// Open the host adapter and build a session over it.
async fn platform_session(config: SessionConfig) -> Result<Session> {
    let transport = PlatformTransport::new()
        .await
        .context("Failed to open Bluetooth adapter")?;
    session_over(Arc::new(transport), config)
}

fn session_over(transport: Arc<dyn Transport>, config: SessionConfig) -> Result<Session> {
    Session::new(transport, config).context("Invalid session configuration")
}
