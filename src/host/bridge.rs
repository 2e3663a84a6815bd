use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard,
    },
};

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::inspector::{ExtractionKind, InspectError, PageInspector, SurfaceId, SurfaceRegistry};

use super::protocol::OutboundMessage;

#[derive(Debug)]
pub enum BridgeReply {
    Surfaces(Vec<SurfaceId>),
    Inspection(Result<Value, String>),
}

/// Implements the browser ports by asking the extension shim over the
/// native messaging channel and matching replies by id.
pub struct NativeBridge {
    outbound: mpsc::Sender<OutboundMessage>,
    pending: Mutex<HashMap<u64, oneshot::Sender<BridgeReply>>>,
    next_id: AtomicU64,
}

impl NativeBridge {
    pub fn new(outbound: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            outbound,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<BridgeReply>>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Hands a reply to the waiting caller. Returns false for unknown ids,
    /// e.g. replies that arrive after the caller timed out.
    pub fn resolve(&self, id: u64, reply: BridgeReply) -> bool {
        let Some(waiter) = self.pending().remove(&id) else {
            debug!("Dropping reply for unknown request {id}");
            return false;
        };
        waiter.send(reply).is_ok()
    }

    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    async fn call(&self, build: impl FnOnce(u64) -> OutboundMessage) -> Result<BridgeReply, InspectError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending().insert(id, reply_tx);

        // Removes the entry even when the caller's timeout drops this future.
        let _guard = PendingGuard { bridge: self, id };

        if self.outbound.send(build(id)).await.is_err() {
            return Err(InspectError::Disconnected);
        }

        reply_rx.await.map_err(|_| InspectError::Disconnected)
    }
}

struct PendingGuard<'a> {
    bridge: &'a NativeBridge,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.bridge.pending().remove(&self.id);
    }
}

#[async_trait]
impl SurfaceRegistry for NativeBridge {
    async fn find_surface(&self, url_pattern: &str) -> Result<Option<SurfaceId>, InspectError> {
        let url_pattern = url_pattern.to_string();
        match self
            .call(|id| OutboundMessage::QuerySurfaces { id, url_pattern })
            .await?
        {
            BridgeReply::Surfaces(surfaces) => Ok(surfaces.first().copied()),
            BridgeReply::Inspection(_) => {
                warn!("Surface query answered with an inspection result");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl PageInspector for NativeBridge {
    async fn inspect(
        &self,
        surface: SurfaceId,
        kind: ExtractionKind,
    ) -> Result<Value, InspectError> {
        let reply = self
            .call(|id| OutboundMessage::Inspect {
                id,
                surface_id: surface,
                kind,
            })
            .await?;

        match reply {
            BridgeReply::Inspection(Ok(value)) => Ok(value),
            BridgeReply::Inspection(Err(message)) if message.contains("No tab with id") => {
                Err(InspectError::SurfaceClosed(surface))
            }
            BridgeReply::Inspection(Err(message)) => Err(InspectError::Execution(message)),
            BridgeReply::Surfaces(_) => Err(InspectError::Execution(
                "inspection answered with a surface list".into(),
            )),
        }
    }
}
