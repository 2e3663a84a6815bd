use std::sync::Arc;

use serde_json::Value;
use tokio::time;
use uuid::Uuid;

use crate::{
    db::KeyValueStore,
    duration::{format_elapsed, is_valid_interface_duration},
    history::HistoryStore,
    inspector::{decode_status, ExtractionKind, InspectError, PageInspector, SurfaceId, SurfaceRegistry},
    models::{CallRecord, CallSnapshot, DurationSource, StatusKind},
    settings::MonitorSettings,
    utils::Clock,
};

use super::{
    state::{MonitorState, MonitorSummary},
    timers::{AlarmName, TimerService},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub struct EnginePorts {
    pub registry: Arc<dyn SurfaceRegistry>,
    pub inspector: Arc<dyn PageInspector>,
    pub store: Arc<dyn KeyValueStore>,
    pub timers: Arc<dyn TimerService>,
    pub clock: Arc<dyn Clock>,
}

/// Result of one status tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No agent-desk surface could be resolved.
    Unwatched,
    /// The inspector returned nothing usable or failed.
    NoStatus,
    /// Same status as last tick.
    Unchanged,
    StatusChanged,
    CallStarted,
    CallFinalized(CallRecord),
    /// Wrap-up ended; a supplementary snapshot was attempted.
    Enriched,
}

/// Owns the monitor state and drives the call lifecycle. Every method runs to
/// completion before the next event is handled, so state is never shared.
pub struct CallLifecycleEngine {
    settings: MonitorSettings,
    state: MonitorState,
    registry: Arc<dyn SurfaceRegistry>,
    inspector: Arc<dyn PageInspector>,
    history: HistoryStore,
    timers: Arc<dyn TimerService>,
    clock: Arc<dyn Clock>,
}

impl CallLifecycleEngine {
    /// Rehydrates history, tries to find the desk surface and starts the idle
    /// status alarm.
    pub async fn init(settings: MonitorSettings, ports: EnginePorts) -> Self {
        let history = HistoryStore::new(ports.store, settings.max_history);
        let state = MonitorState::new(history.load().await);

        let mut engine = Self {
            settings,
            state,
            registry: ports.registry,
            inspector: ports.inspector,
            history,
            timers: ports.timers,
            clock: ports.clock,
        };

        engine.resolve_surface().await;
        engine
            .timers
            .start(AlarmName::StatusCheck, engine.settings.status_poll_interval());

        log_info!(
            "Call monitor initialised (watching: {}, {} calls in history)",
            engine.state.is_watching,
            engine.state.history.len()
        );
        engine
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn history(&self) -> &[CallRecord] {
        &self.state.history
    }

    pub fn summary(&self) -> MonitorSummary {
        self.state.summary(&self.settings.labels)
    }

    pub fn is_watched_surface(&self, surface: SurfaceId) -> bool {
        self.state.watched_surface == Some(surface)
    }

    pub fn on_surface_removed(&mut self, surface: SurfaceId) {
        if self.is_watched_surface(surface) {
            self.state.invalidate_watch();
            log_warn!("Agent desk surface {surface} closed");
        }
    }

    pub fn shutdown(&self) {
        self.timers.clear(AlarmName::ActiveCall);
        self.timers.clear(AlarmName::StatusCheck);
    }

    /// One status poll: resolve the surface if needed, read the agent status
    /// and apply the transition table.
    pub async fn check_status(&mut self) -> TickOutcome {
        if !self.state.is_watching && !self.resolve_surface().await {
            return TickOutcome::Unwatched;
        }

        let Some(value) = self.inspect(ExtractionKind::AgentStatus).await else {
            return TickOutcome::NoStatus;
        };
        let Some(status) = decode_status(&value) else {
            log_debug!("No agent status on the page");
            return TickOutcome::NoStatus;
        };

        if self.state.last_status.as_deref() == Some(status.as_str()) {
            return TickOutcome::Unchanged;
        }

        let previous = self.state.last_status.replace(status.clone());
        log_info!(
            "Agent status: {} -> {}",
            previous.as_deref().unwrap_or("-"),
            status
        );

        if let Err(err) = self.history.record_agent_status(&status).await {
            log_error!("{err:#}");
        }

        let labels = &self.settings.labels;
        let from = labels.kind_of_opt(previous.as_deref());
        let to = labels.kind_of(&status);

        match (self.state.in_call, from, to) {
            (false, _, StatusKind::Talking) => {
                self.begin_call().await;
                TickOutcome::CallStarted
            }
            (true, StatusKind::Talking, StatusKind::WrapUp) => {
                TickOutcome::CallFinalized(self.end_call().await)
            }
            (_, StatusKind::WrapUp, StatusKind::Ready) => {
                self.enrich().await;
                TickOutcome::Enriched
            }
            _ => TickOutcome::StatusChanged,
        }
    }

    /// In-call sample; last observation with a phone or duration wins.
    pub async fn capture_sample(&mut self) -> bool {
        if !self.state.in_call {
            return false;
        }

        let seq = self.state.call_seq;
        let Some(snapshot) = self.sample_snapshot().await else {
            return false;
        };

        self.state.in_call && self.accept_sample(seq, snapshot)
    }

    async fn resolve_surface(&mut self) -> bool {
        let lookup = self.registry.find_surface(&self.settings.surface_url_pattern);
        let result = match time::timeout(self.settings.inspect_timeout(), lookup).await {
            Ok(result) => result,
            Err(_) => Err(InspectError::Timeout(self.settings.inspect_timeout_ms)),
        };

        match result {
            Ok(Some(surface)) => {
                self.state.watch(surface);
                log_info!("Watching agent desk surface {surface}");
                true
            }
            Ok(None) => {
                self.state.invalidate_watch();
                log_debug!("Agent desk surface not found");
                false
            }
            Err(err) => {
                self.state.invalidate_watch();
                log_warn!("Agent desk lookup failed: {err}");
                false
            }
        }
    }

    /// Any failure drops the watch; the next status tick re-resolves.
    async fn inspect(&mut self, kind: ExtractionKind) -> Option<Value> {
        let surface = match (self.state.is_watching, self.state.watched_surface) {
            (true, Some(surface)) => surface,
            _ => return None,
        };

        let call = self.inspector.inspect(surface, kind);
        let result = match time::timeout(self.settings.inspect_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(InspectError::Timeout(self.settings.inspect_timeout_ms)),
        };

        match result {
            Ok(value) => Some(value),
            Err(err) => {
                log_warn!("Inspection of surface {surface} ({kind:?}) failed: {err}");
                self.state.is_watching = false;
                None
            }
        }
    }

    async fn sample_snapshot(&mut self) -> Option<CallSnapshot> {
        let value = self.inspect(ExtractionKind::CallSnapshot).await?;
        let snapshot = CallSnapshot::from_value(value);
        if snapshot.is_none() {
            log_debug!("Ignoring malformed call snapshot");
        }
        snapshot
    }

    fn accept_sample(&mut self, seq: u64, snapshot: CallSnapshot) -> bool {
        if seq != self.state.call_seq {
            log_debug!("Discarding snapshot from call #{seq}");
            return false;
        }
        if !snapshot.has_call_data() {
            return false;
        }

        log_debug!("Call #{seq} snapshot: {snapshot:?}");
        self.state.pending_snapshot = Some(snapshot);
        true
    }

    async fn begin_call(&mut self) {
        let started_at = self.clock.now();
        let seq = self.state.begin_call(started_at);
        log_info!("Call #{seq} started at {started_at}");

        let period = self.settings.in_call_poll_interval();
        self.timers.start(AlarmName::StatusCheck, period);
        self.timers.start(AlarmName::ActiveCall, period);

        self.capture_sample().await;
    }

    async fn end_call(&mut self) -> CallRecord {
        let ended_at = self.clock.now();
        let seq = self.state.call_seq;

        self.timers.clear(AlarmName::ActiveCall);
        self.timers
            .start(AlarmName::StatusCheck, self.settings.status_poll_interval());
        self.state.in_call = false;

        log_info!("Call #{seq} ended, capturing final call data");
        let interface_duration = self.run_post_call_capture(seq).await;
        self.finalize(ended_at, interface_duration).await
    }

    /// Re-samples the call panel a bounded number of times looking for a
    /// usable timer reading. The desk often shows `00:00:00` for a moment
    /// after the call drops.
    async fn run_post_call_capture(&mut self, seq: u64) -> Option<String> {
        let attempts = self.settings.post_call_attempts;

        for attempt in 1..=attempts {
            if let Some(snapshot) = self.sample_snapshot().await {
                let duration = snapshot.duration.clone();
                self.accept_sample(seq, snapshot);

                if let Some(duration) = duration.filter(|d| is_valid_interface_duration(d)) {
                    log_info!("Interface duration {duration} captured on attempt {attempt}");
                    return Some(duration);
                }
            }

            if !self.state.is_watching {
                log_warn!("Lost the agent desk during post-call capture");
                break;
            }

            if attempt < attempts {
                time::sleep(self.settings.post_call_delay()).await;
            }
        }

        log_info!("No interface duration for call #{seq}; using calculated duration");
        None
    }

    async fn finalize(
        &mut self,
        ended_at: chrono::DateTime<chrono::Utc>,
        interface_duration: Option<String>,
    ) -> CallRecord {
        let started_at = self.state.call_start_time.take().unwrap_or(ended_at);
        let ended_at = ended_at.max(started_at);
        let calculated = format_elapsed(started_at, ended_at);

        let (duration, source) = match interface_duration {
            Some(duration) => (duration, DurationSource::Interface),
            None => (calculated.clone(), DurationSource::Calculated),
        };

        let snapshot = self.state.pending_snapshot.take().unwrap_or_default();
        let sentinels = &self.settings.sentinels;
        let finalized_at = self.clock.now();

        let record = CallRecord {
            id: Uuid::new_v4().to_string(),
            phone: snapshot.phone.unwrap_or_else(|| sentinels.phone.clone()),
            duration,
            region: snapshot.region.unwrap_or_else(|| sentinels.region.clone()),
            start_time: started_at,
            end_time: ended_at,
            finalized_at,
            source,
        };

        log_info!(
            "Call saved: phone={}, duration={} ({}), calculated={}",
            record.phone,
            record.duration,
            record.source.as_str(),
            calculated
        );

        if let Err(err) = self
            .history
            .append(&mut self.state.history, record.clone(), finalized_at)
            .await
        {
            log_error!("{err:#}");
        }

        record
    }

    async fn enrich(&mut self) {
        if let Some(snapshot) = self
            .sample_snapshot()
            .await
            .filter(CallSnapshot::has_call_data)
        {
            log_debug!("Post-call enrichment snapshot: {snapshot:?}");
            self.state.last_enrichment = Some(snapshot);
        }
    }
}
