//! Scripted stand-ins for the browser, timers and clock.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
    db::{KeyValueStore, MemoryStore},
    inspector::{ExtractionKind, InspectError, PageInspector, SurfaceId, SurfaceRegistry},
    settings::MonitorSettings,
    utils::Clock,
};

use super::{
    engine::{CallLifecycleEngine, EnginePorts},
    timers::{AlarmName, TimerService},
};

pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        let start = DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Self {
            now: Mutex::new(start),
        }
    }

    pub(crate) fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Agent-desk page whose readings are queued up front. An empty queue reads
/// as `null`, like a page where the selector matched nothing.
#[derive(Default)]
pub(crate) struct ScriptedPage {
    surface: Mutex<Option<SurfaceId>>,
    statuses: Mutex<VecDeque<Result<Value, InspectError>>>,
    snapshots: Mutex<VecDeque<Result<Value, InspectError>>>,
    lookups: AtomicUsize,
    snapshot_reads: AtomicUsize,
    stall_lookups: AtomicBool,
    stall_inspections: AtomicBool,
}

impl ScriptedPage {
    pub(crate) fn on_surface(id: i64) -> Arc<Self> {
        let page = Self::default();
        page.set_surface(Some(SurfaceId(id)));
        Arc::new(page)
    }

    pub(crate) fn without_surface() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_surface(&self, surface: Option<SurfaceId>) {
        *self.surface.lock().unwrap() = surface;
    }

    pub(crate) fn push_status(&self, status: &str) {
        self.push_status_value(Value::String(status.to_string()));
    }

    pub(crate) fn push_status_value(&self, value: Value) {
        self.statuses.lock().unwrap().push_back(Ok(value));
    }

    pub(crate) fn push_status_error(&self, err: InspectError) {
        self.statuses.lock().unwrap().push_back(Err(err));
    }

    pub(crate) fn push_snapshot(&self, value: Value) {
        self.snapshots.lock().unwrap().push_back(Ok(value));
    }

    pub(crate) fn push_snapshot_error(&self, err: InspectError) {
        self.snapshots.lock().unwrap().push_back(Err(err));
    }

    /// Lookups never answer; the caller's timeout has to fire.
    pub(crate) fn stall_lookups(&self, stall: bool) {
        self.stall_lookups.store(stall, Ordering::SeqCst);
    }

    pub(crate) fn stall_inspections(&self, stall: bool) {
        self.stall_inspections.store(stall, Ordering::SeqCst);
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub(crate) fn snapshot_reads(&self) -> usize {
        self.snapshot_reads.load(Ordering::SeqCst)
    }

    pub(crate) fn pending_snapshots(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }
}

#[async_trait]
impl SurfaceRegistry for ScriptedPage {
    async fn find_surface(&self, _url_pattern: &str) -> Result<Option<SurfaceId>, InspectError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.stall_lookups.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(*self.surface.lock().unwrap())
    }
}

#[async_trait]
impl PageInspector for ScriptedPage {
    async fn inspect(
        &self,
        _surface: SurfaceId,
        kind: ExtractionKind,
    ) -> Result<Value, InspectError> {
        if self.stall_inspections.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let queue = match kind {
            ExtractionKind::AgentStatus => &self.statuses,
            ExtractionKind::CallSnapshot => {
                self.snapshot_reads.fetch_add(1, Ordering::SeqCst);
                &self.snapshots
            }
        };
        queue.lock().unwrap().pop_front().unwrap_or(Ok(Value::Null))
    }
}

/// Memory store whose writes can be switched to fail.
#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
    failed_writes: AtomicUsize,
}

impl FlakyStore {
    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn failed_writes(&self) -> usize {
        self.failed_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        self.inner.get(keys).await
    }

    async fn set(&self, entries: Vec<(String, Value)>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            self.failed_writes.fetch_add(1, Ordering::SeqCst);
            bail!("disk full");
        }
        self.inner.set(entries).await
    }
}

/// Records alarm starts and clears instead of scheduling anything.
#[derive(Default)]
pub(crate) struct RecordingTimers {
    calls: Mutex<Vec<(AlarmName, Option<Duration>)>>,
}

impl RecordingTimers {
    /// Current period of `alarm`, `None` when cleared or never started.
    pub(crate) fn period_of(&self, alarm: AlarmName) -> Option<Duration> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(name, _)| *name == alarm)
            .and_then(|(_, period)| *period)
    }

    pub(crate) fn starts_of(&self, alarm: AlarmName) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, period)| *name == alarm && period.is_some())
            .count()
    }
}

impl TimerService for RecordingTimers {
    fn start(&self, alarm: AlarmName, period: Duration) {
        self.calls.lock().unwrap().push((alarm, Some(period)));
    }

    fn clear(&self, alarm: AlarmName) {
        self.calls.lock().unwrap().push((alarm, None));
    }
}

pub(crate) struct Harness {
    pub(crate) page: Arc<ScriptedPage>,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) timers: Arc<RecordingTimers>,
    pub(crate) clock: Arc<ManualClock>,
}

impl Harness {
    pub(crate) fn new(page: Arc<ScriptedPage>) -> Self {
        Self {
            page,
            store: Arc::new(MemoryStore::new()),
            timers: Arc::new(RecordingTimers::default()),
            clock: Arc::new(ManualClock::new()),
        }
    }

    pub(crate) fn ports(&self) -> EnginePorts {
        EnginePorts {
            registry: self.page.clone(),
            inspector: self.page.clone(),
            store: self.store.clone(),
            timers: self.timers.clone(),
            clock: self.clock.clone(),
        }
    }

    pub(crate) async fn engine(&self) -> CallLifecycleEngine {
        CallLifecycleEngine::init(MonitorSettings::default(), self.ports()).await
    }
}
