//! Per-proxy invocation settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether the caller waits for a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Twoway,
    Oneway,
}

/// Options recognized by the invocation dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationConfig {
    /// Bounds the wait for a reply on the remote path. `None` waits forever.
    /// Collocated calls ignore it.
    pub timeout: Option<Duration>,
    pub mode: Mode,
    /// Only secure endpoints are considered, for collocation and for transport.
    pub secure: bool,
    /// `false` forces the remote path even when a collocated servant exists.
    pub collocation_optimized: bool,
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            mode: Mode::Twoway,
            secure: false,
            collocation_optimized: true,
        }
    }
}

impl InvocationConfig {
    pub fn is_oneway(&self) -> bool {
        self.mode == Mode::Oneway
    }
}
