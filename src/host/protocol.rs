use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::inspector::{ExtractionKind, SurfaceId};

/// Messages the host sends to the extension shim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OutboundMessage {
    QuerySurfaces { id: u64, url_pattern: String },
    Inspect { id: u64, surface_id: SurfaceId, kind: ExtractionKind },
    Response { id: u64, payload: Value },
}

/// Messages the extension shim sends to the host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InboundMessage {
    Surfaces {
        id: u64,
        #[serde(default)]
        surface_ids: Vec<SurfaceId>,
    },
    InspectResult {
        id: u64,
        ok: bool,
        #[serde(default)]
        data: Value,
        #[serde(default)]
        error: Option<String>,
    },
    SurfaceRemoved { surface_id: SurfaceId },
    SurfaceUpdated {
        surface_id: SurfaceId,
        #[serde(default)]
        status: Option<String>,
    },
    Request { id: u64, payload: Value },
}
