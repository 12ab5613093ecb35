//! Instrumentation for sifkit.
//!
//! This crate measures wall time and resident memory across the stages of
//! model creation (decode, load, setup) so they can be logged and reported.

pub mod measure;

pub use measure::{
    MeasurementRecorder, MemoryError, MemorySnapshot, StageMeasurement, StageStart,
    capture_rss_bytes, rss_delta,
};
