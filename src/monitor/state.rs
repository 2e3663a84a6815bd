use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    inspector::SurfaceId,
    models::{CallRecord, CallSnapshot, StatusKind, StatusLabels},
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CallPhase {
    Idle,
    InCall,
    WrapUp,
}

#[derive(Debug, Clone, Default)]
pub struct MonitorState {
    pub watched_surface: Option<SurfaceId>,
    pub is_watching: bool,
    pub last_status: Option<String>,
    pub in_call: bool,
    pub call_start_time: Option<DateTime<Utc>>,
    /// Incremented per call; capture results carry it so a late sample can
    /// never land on another call.
    pub call_seq: u64,
    pub pending_snapshot: Option<CallSnapshot>,
    /// Read taken when the agent went from wrap-up back to ready.
    pub last_enrichment: Option<CallSnapshot>,
    pub history: Vec<CallRecord>,
}

impl MonitorState {
    pub fn new(history: Vec<CallRecord>) -> Self {
        Self {
            history,
            ..Self::default()
        }
    }

    pub fn watch(&mut self, surface: SurfaceId) {
        self.watched_surface = Some(surface);
        self.is_watching = true;
    }

    pub fn invalidate_watch(&mut self) {
        self.watched_surface = None;
        self.is_watching = false;
    }

    pub fn begin_call(&mut self, started_at: DateTime<Utc>) -> u64 {
        self.call_seq = self.call_seq.wrapping_add(1);
        self.in_call = true;
        self.call_start_time = Some(started_at);
        self.pending_snapshot = None;
        self.call_seq
    }

    pub fn phase(&self, labels: &StatusLabels) -> CallPhase {
        if self.in_call {
            CallPhase::InCall
        } else if labels.kind_of_opt(self.last_status.as_deref()) == StatusKind::WrapUp {
            CallPhase::WrapUp
        } else {
            CallPhase::Idle
        }
    }

    pub fn summary(&self, labels: &StatusLabels) -> MonitorSummary {
        MonitorSummary {
            is_active: self.is_watching,
            surface_id: self.watched_surface,
            last_status: self.last_status.clone(),
            is_in_call: self.in_call,
            phase: self.phase(labels),
            call_started_at: self.call_start_time,
            history_count: self.history.len(),
            last_enrichment: self.last_enrichment.clone(),
        }
    }
}

/// What `getStatus` reports to the popup.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSummary {
    pub is_active: bool,
    pub surface_id: Option<SurfaceId>,
    pub last_status: Option<String>,
    pub is_in_call: bool,
    pub phase: CallPhase,
    pub call_started_at: Option<DateTime<Utc>>,
    pub history_count: usize,
    pub last_enrichment: Option<CallSnapshot>,
}
