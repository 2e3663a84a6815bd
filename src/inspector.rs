//! Ports to the browser: locating the agent-desk surface and running
//! read-only extraction inside it.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Browser surface (tab) handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(pub i64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtractionKind {
    /// Text of the agent status selector, or null.
    AgentStatus,
    /// `{ phone, duration, region }` read from the call panel.
    CallSnapshot,
}

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("surface {0} is closed")]
    SurfaceClosed(SurfaceId),

    #[error("script execution failed: {0}")]
    Execution(String),

    #[error("no reply within {0}ms")]
    Timeout(u64),

    #[error("browser channel disconnected")]
    Disconnected,
}

#[async_trait]
pub trait SurfaceRegistry: Send + Sync {
    /// First open surface whose URL matches `url_pattern`, if any.
    async fn find_surface(&self, url_pattern: &str) -> Result<Option<SurfaceId>, InspectError>;
}

#[async_trait]
pub trait PageInspector: Send + Sync {
    async fn inspect(&self, surface: SurfaceId, kind: ExtractionKind)
        -> Result<Value, InspectError>;
}

/// A status reading is a non-blank string; everything else means "no status".
pub fn decode_status(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|status| !status.is_empty())
        .map(str::to_string)
}
