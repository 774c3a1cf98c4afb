//! Simulation records
//!
//! A [`Simulation`] is owned by the engine's registry. Everything outside the
//! registry works with copies.

use crate::SimulationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of pathology a simulation injects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationKind {
    CpuStress,
    MemoryPressure,
    SchedulerBlock,
    SlowRequest,
    CrashAbort,
    CrashStackOverflow,
    CrashUnhandledFault,
    CrashMemoryExhaustion,
}

impl SimulationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationKind::CpuStress => "CPU_STRESS",
            SimulationKind::MemoryPressure => "MEMORY_PRESSURE",
            SimulationKind::SchedulerBlock => "SCHEDULER_BLOCK",
            SimulationKind::SlowRequest => "SLOW_REQUEST",
            SimulationKind::CrashAbort => "CRASH_ABORT",
            SimulationKind::CrashStackOverflow => "CRASH_STACK_OVERFLOW",
            SimulationKind::CrashUnhandledFault => "CRASH_UNHANDLED_FAULT",
            SimulationKind::CrashMemoryExhaustion => "CRASH_MEMORY_EXHAUSTION",
        }
    }

    pub fn is_crash(&self) -> bool {
        matches!(
            self,
            SimulationKind::CrashAbort
                | SimulationKind::CrashStackOverflow
                | SimulationKind::CrashUnhandledFault
                | SimulationKind::CrashMemoryExhaustion
        )
    }

    /// Parse the wire name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        let all = [
            SimulationKind::CpuStress,
            SimulationKind::MemoryPressure,
            SimulationKind::SchedulerBlock,
            SimulationKind::SlowRequest,
            SimulationKind::CrashAbort,
            SimulationKind::CrashStackOverflow,
            SimulationKind::CrashUnhandledFault,
            SimulationKind::CrashMemoryExhaustion,
        ];
        all.into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for SimulationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a crash simulation terminates the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrashMode {
    /// `abort()`: SIGABRT, no unwinding, no exit handlers
    Abort,
    /// Unbounded recursion until the guard page is hit
    StackOverflow,
    /// A panic nobody catches
    UnhandledFault,
    /// Retain allocations until the allocator gives up
    MemoryExhaustion,
}

impl CrashMode {
    pub fn kind(&self) -> SimulationKind {
        match self {
            CrashMode::Abort => SimulationKind::CrashAbort,
            CrashMode::StackOverflow => SimulationKind::CrashStackOverflow,
            CrashMode::UnhandledFault => SimulationKind::CrashUnhandledFault,
            CrashMode::MemoryExhaustion => SimulationKind::CrashMemoryExhaustion,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().replace('_', "-").as_str() {
            "abort" => Some(CrashMode::Abort),
            "stack-overflow" => Some(CrashMode::StackOverflow),
            "unhandled-fault" | "unhandled-exception" => Some(CrashMode::UnhandledFault),
            "memory-exhaustion" | "oom" => Some(CrashMode::MemoryExhaustion),
            _ => None,
        }
    }
}

impl fmt::Display for CrashMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrashMode::Abort => "abort",
            CrashMode::StackOverflow => "stack-overflow",
            CrashMode::UnhandledFault => "unhandled-fault",
            CrashMode::MemoryExhaustion => "memory-exhaustion",
        };
        f.write_str(name)
    }
}

/// Kind-specific parameters, fixed at creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SimulationParameters {
    #[serde(rename_all = "camelCase")]
    CpuStress {
        target_load_percent: u8,
        duration_seconds: u64,
        worker_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    MemoryPressure { size_mb: u64 },
    #[serde(rename_all = "camelCase")]
    SchedulerBlock { duration_seconds: u64, chunk_ms: u64 },
    #[serde(rename_all = "camelCase")]
    SlowRequest { delay_seconds: u64 },
    #[serde(rename_all = "camelCase")]
    Crash { mode: CrashMode },
}

impl SimulationParameters {
    /// The kind these parameters belong to.
    pub fn kind(&self) -> SimulationKind {
        match self {
            SimulationParameters::CpuStress { .. } => SimulationKind::CpuStress,
            SimulationParameters::MemoryPressure { .. } => SimulationKind::MemoryPressure,
            SimulationParameters::SchedulerBlock { .. } => SimulationKind::SchedulerBlock,
            SimulationParameters::SlowRequest { .. } => SimulationKind::SlowRequest,
            SimulationParameters::Crash { mode } => mode.kind(),
        }
    }
}

/// Lifecycle status. Transitions only go from `Active` to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationStatus {
    Active,
    Completed,
    Stopped,
    Failed,
}

impl SimulationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SimulationStatus::Active)
    }
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SimulationStatus::Active => "ACTIVE",
            SimulationStatus::Completed => "COMPLETED",
            SimulationStatus::Stopped => "STOPPED",
            SimulationStatus::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// One fault-injection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Simulation {
    pub id: SimulationId,
    pub kind: SimulationKind,
    pub parameters: SimulationParameters,
    pub status: SimulationStatus,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,

    /// `None` means the simulation never expires on its own.
    pub scheduled_end_at: Option<DateTime<Utc>>,
}

impl Simulation {
    /// Create a new active simulation starting now.
    pub fn new(parameters: SimulationParameters, scheduled_end_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: SimulationId::generate(),
            kind: parameters.kind(),
            parameters,
            status: SimulationStatus::Active,
            started_at: Utc::now(),
            stopped_at: None,
            scheduled_end_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SimulationStatus::Active
    }

    /// Wall-clock time the simulation ran (or has been running).
    pub fn elapsed(&self) -> chrono::Duration {
        self.stopped_at.unwrap_or_else(Utc::now) - self.started_at
    }
}
