use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use serde::Serialize;
use tokio::{
    sync::mpsc,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::controller::MonitorEvent;

const MIN_PERIOD: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AlarmName {
    /// Agent status poll; idle or in-call period.
    StatusCheck,
    /// Call panel sampling while a call is in progress.
    ActiveCall,
}

impl AlarmName {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmName::StatusCheck => "statusCheck",
            AlarmName::ActiveCall => "activeCall",
        }
    }
}

/// Named periodic alarms. Starting an alarm that is already running replaces
/// its period.
pub trait TimerService: Send + Sync {
    fn start(&self, alarm: AlarmName, period: Duration);
    fn clear(&self, alarm: AlarmName);
}

/// Tokio interval per alarm, each firing `MonitorEvent::Alarm` into the
/// monitor's event queue. The first fire happens one period after start.
pub struct IntervalTimers {
    events: mpsc::Sender<MonitorEvent>,
    running: Mutex<HashMap<AlarmName, CancellationToken>>,
}

impl IntervalTimers {
    pub fn new(events: mpsc::Sender<MonitorEvent>) -> Self {
        Self {
            events,
            running: Mutex::new(HashMap::new()),
        }
    }

    fn running(&self) -> MutexGuard<'_, HashMap<AlarmName, CancellationToken>> {
        match self.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl TimerService for IntervalTimers {
    fn start(&self, alarm: AlarmName, period: Duration) {
        let period = period.max(MIN_PERIOD);
        let token = CancellationToken::new();
        if let Some(previous) = self.running().insert(alarm, token.clone()) {
            previous.cancel();
        }

        let events = self.events.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if events.send(MonitorEvent::Alarm(alarm)).await.is_err() {
                            break;
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        });

        log::debug!("Alarm {} every {}ms", alarm.as_str(), period.as_millis());
    }

    fn clear(&self, alarm: AlarmName) {
        if let Some(token) = self.running().remove(&alarm) {
            token.cancel();
            log::debug!("Alarm {} cleared", alarm.as_str());
        }
    }
}

impl Drop for IntervalTimers {
    fn drop(&mut self) {
        for (_, token) in self.running().drain() {
            token.cancel();
        }
    }
}
