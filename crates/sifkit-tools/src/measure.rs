//! Stage timing and resident memory tracking.

use serde::Serialize;
use std::time::Instant;
use sysinfo::System;

/// Resident memory of the current process at one point in time.
#[derive(Debug, Clone)]
pub struct MemorySnapshot {
    /// Resident set size in bytes
    pub rss_bytes: u64,
    /// Timestamp when this snapshot was captured
    pub timestamp: Instant,
    /// Name of the stage (e.g., "decode", "setup")
    pub stage: String,
}

/// Errors produced by memory instrumentation.
#[derive(Debug, Clone)]
pub enum MemoryError {
    ProcessNotFound { pid: u32 },
}

impl std::fmt::Display for MemoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryError::ProcessNotFound { pid } => {
                write!(f, "failed to locate process {}", pid)
            }
        }
    }
}

impl std::error::Error for MemoryError {}

impl MemorySnapshot {
    /// Capture current memory state for a given stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the current process cannot be located.
    pub fn capture(stage: &str) -> Result<Self, MemoryError> {
        let pid = sysinfo::Pid::from(std::process::id() as usize);

        let mut sys = System::new();
        sys.refresh_processes_specifics(
            sysinfo::ProcessesToUpdate::Some(&[pid]),
            true,
            sysinfo::ProcessRefreshKind::nothing().with_memory(),
        );

        let process = sys.process(pid).ok_or(MemoryError::ProcessNotFound {
            pid: std::process::id(),
        })?;

        Ok(MemorySnapshot {
            rss_bytes: process.memory(),
            timestamp: Instant::now(),
            stage: stage.to_string(),
        })
    }
}

/// Resident memory in bytes, or `None` when it cannot be read.
pub fn capture_rss_bytes(stage: &str) -> Option<u64> {
    MemorySnapshot::capture(stage)
        .ok()
        .map(|snapshot| snapshot.rss_bytes)
}

/// Signed memory growth between two optional readings.
pub fn rss_delta(before: Option<u64>, after: Option<u64>) -> Option<i64> {
    match (before, after) {
        (Some(before), Some(after)) => Some(after as i64 - before as i64),
        _ => None,
    }
}

/// Timing and memory of one completed stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageMeasurement {
    pub stage: String,
    pub duration_ms: f64,
    pub rss_before_bytes: Option<u64>,
    pub rss_after_bytes: Option<u64>,
}

impl StageMeasurement {
    pub fn rss_delta_bytes(&self) -> Option<i64> {
        rss_delta(self.rss_before_bytes, self.rss_after_bytes)
    }
}

/// An in-flight stage returned by [`MeasurementRecorder::begin_stage`].
#[derive(Debug)]
pub struct StageStart {
    stage: String,
    started: Instant,
    rss_before: Option<u64>,
}

impl StageStart {
    pub fn stage(&self) -> &str {
        &self.stage
    }
}

/// Records consecutive stages of one operation.
#[derive(Debug, Default)]
pub struct MeasurementRecorder {
    stages: Vec<StageMeasurement>,
    track_memory: bool,
}

impl MeasurementRecorder {
    /// Create a recorder that measures wall time and resident memory.
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            track_memory: true,
        }
    }

    /// Create a recorder that only measures wall time.
    pub fn timing_only() -> Self {
        Self {
            stages: Vec::new(),
            track_memory: false,
        }
    }

    /// Start measuring `stage`.
    pub fn begin_stage(&self, stage: &str) -> StageStart {
        let rss_before = if self.track_memory {
            capture_rss_bytes(stage)
        } else {
            None
        };
        StageStart {
            stage: stage.to_string(),
            started: Instant::now(),
            rss_before,
        }
    }

    /// Finish a stage and store its measurement.
    pub fn end_stage(&mut self, start: StageStart) -> &StageMeasurement {
        let duration_ms = start.started.elapsed().as_secs_f64() * 1000.0;
        let rss_after = if self.track_memory {
            capture_rss_bytes(&start.stage)
        } else {
            None
        };
        self.stages.push(StageMeasurement {
            stage: start.stage,
            duration_ms,
            rss_before_bytes: start.rss_before,
            rss_after_bytes: rss_after,
        });
        &self.stages[self.stages.len() - 1]
    }

    /// All completed stages in order.
    pub fn stages(&self) -> &[StageMeasurement] {
        &self.stages
    }

    /// Sum of all stage durations.
    pub fn total_duration_ms(&self) -> f64 {
        self.stages.iter().map(|stage| stage.duration_ms).sum()
    }
}
