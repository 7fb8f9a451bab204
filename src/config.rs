//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::core::SessionConfig;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(flatten)]
    pub session: SessionConfig,
    /// Preferred backend. A thread backend that fails to start falls back to
    /// the main loop.
    pub backend: BackendKind,
    /// Raise timer thread priority.
    pub high_priority_timers: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            backend: BackendKind::Thread,
            high_priority_timers: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.session.validate()?;
        Ok(())
    }
}
