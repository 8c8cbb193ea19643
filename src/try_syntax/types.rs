//! Trigger intent extracted from a `try:` directive.

use serde::{Deserialize, Serialize};

/// What a submission message asked of the trigger bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TryRequest {
    /// Extra runs requested for every non-talos test job (`--rebuild N`).
    pub rebuild: u32,

    /// Extra runs requested for every talos job (`--rebuild-talos N`).
    pub rebuild_talos: u32,

    /// Whether failing jobs may be retriggered automatically.
    ///
    /// Cleared by `--no-retry`.
    pub retry: bool,
}

impl TryRequest {
    /// The request implied by a message without a `try:` line.
    pub const DEFAULT: Self = Self {
        rebuild: 0,
        rebuild_talos: 0,
        retry: true,
    };

    /// Returns true if any rebuild count is non-zero.
    pub fn has_rebuilds(&self) -> bool {
        self.rebuild > 0 || self.rebuild_talos > 0
    }
}

impl Default for TryRequest {
    fn default() -> Self {
        Self::DEFAULT
    }
}
