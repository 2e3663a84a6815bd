pub mod controller;
pub mod engine;
pub mod state;
pub mod timers;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{MonitorController, MonitorHandle, MonitorPorts};
pub use engine::{CallLifecycleEngine, EnginePorts, TickOutcome};
pub use state::{CallPhase, MonitorState, MonitorSummary};
pub use timers::{AlarmName, IntervalTimers, TimerService};
