use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info};
use serde_json::Value;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time,
};

use crate::{
    db::KeyValueStore,
    gateway::{self, GatewayRequest, GatewayResponse},
    inspector::{PageInspector, SurfaceId, SurfaceRegistry},
    settings::MonitorSettings,
    utils::Clock,
};

use super::{
    engine::{CallLifecycleEngine, EnginePorts},
    timers::{AlarmName, IntervalTimers},
};

const EVENT_QUEUE_DEPTH: usize = 64;

pub enum MonitorEvent {
    Alarm(AlarmName),
    SurfaceRemoved(SurfaceId),
    /// The surface finished loading a page.
    SurfaceReloaded(SurfaceId),
    Request(GatewayRequest, oneshot::Sender<GatewayResponse>),
    Shutdown,
}

pub struct MonitorPorts {
    pub registry: Arc<dyn SurfaceRegistry>,
    pub inspector: Arc<dyn PageInspector>,
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
}

/// Cloneable entry point into the monitor's event queue.
#[derive(Clone)]
pub struct MonitorHandle {
    events: mpsc::Sender<MonitorEvent>,
}

impl MonitorHandle {
    pub async fn request(&self, request: GatewayRequest) -> GatewayResponse {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .events
            .send(MonitorEvent::Request(request, reply_tx))
            .await
            .is_err()
        {
            return GatewayResponse::error("monitor is not running");
        }

        reply_rx
            .await
            .unwrap_or_else(|_| GatewayResponse::error("monitor stopped before replying"))
    }

    /// Raw JSON in, raw JSON out; used for messages relayed from the extension.
    pub async fn handle_message(&self, payload: &Value) -> Value {
        let request = GatewayRequest::from_value(payload);
        debug!("Request: {request:?}");
        self.request(request).await.into_value()
    }

    pub async fn surface_removed(&self, surface: SurfaceId) {
        if self.events.send(MonitorEvent::SurfaceRemoved(surface)).await.is_err() {
            debug!("Monitor stopped; dropping removal of surface {surface}");
        }
    }

    pub async fn surface_reloaded(&self, surface: SurfaceId) {
        if self.events.send(MonitorEvent::SurfaceReloaded(surface)).await.is_err() {
            debug!("Monitor stopped; dropping reload of surface {surface}");
        }
    }

    pub async fn shutdown(&self) {
        if self.events.send(MonitorEvent::Shutdown).await.is_err() {
            debug!("Monitor already stopped");
        }
    }
}

/// Runs the lifecycle engine on a single task and feeds it alarms, surface
/// notifications and gateway requests in arrival order.
pub struct MonitorController {
    handle: MonitorHandle,
    task: JoinHandle<()>,
}

impl MonitorController {
    pub async fn start(settings: MonitorSettings, ports: MonitorPorts) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let timers = Arc::new(IntervalTimers::new(events_tx.clone()));

        let engine = CallLifecycleEngine::init(
            settings,
            EnginePorts {
                registry: ports.registry,
                inspector: ports.inspector,
                store: ports.store,
                timers,
                clock: ports.clock,
            },
        )
        .await;

        let task = tokio::spawn(event_loop(engine, events_rx, events_tx.clone()));

        Self {
            handle: MonitorHandle { events: events_tx },
            task,
        }
    }

    pub fn handle(&self) -> MonitorHandle {
        self.handle.clone()
    }

    pub async fn stop(self) -> Result<()> {
        self.handle.shutdown().await;
        self.task.await.context("monitor task failed to join")
    }
}

async fn event_loop(
    mut engine: CallLifecycleEngine,
    mut events: mpsc::Receiver<MonitorEvent>,
    loopback: mpsc::Sender<MonitorEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            MonitorEvent::Alarm(AlarmName::StatusCheck) => {
                engine.check_status().await;
            }
            MonitorEvent::Alarm(AlarmName::ActiveCall) => {
                engine.capture_sample().await;
            }
            MonitorEvent::SurfaceRemoved(surface) => engine.on_surface_removed(surface),
            MonitorEvent::SurfaceReloaded(surface) => {
                if engine.is_watched_surface(surface) {
                    let delay = engine.settings().reload_check_delay();
                    let loopback = loopback.clone();
                    tokio::spawn(async move {
                        time::sleep(delay).await;
                        if loopback
                            .send(MonitorEvent::Alarm(AlarmName::StatusCheck))
                            .await
                            .is_err()
                        {
                            debug!("Monitor stopped before the reload check");
                        }
                    });
                }
            }
            MonitorEvent::Request(request, reply) => {
                let response = gateway::dispatch(&mut engine, request).await;
                if reply.send(response).is_err() {
                    debug!("Requester went away before the reply");
                }
            }
            MonitorEvent::Shutdown => break,
        }
    }

    engine.shutdown();
    info!("Monitor event loop stopped");
}
