// tuneo-core/src/lib.rs

//! The core logic for the Tuneo instrument tuner.
//! This crate turns a live audio stream into a stable note estimate and a
//! tuning-deviation signal: adaptive pitch tracking, debounced note
//! resolution and session lifecycle. It is completely headless
//! and contains no GUI code.

pub mod audio;
pub mod config;
pub mod deviation;
pub mod driver;
pub mod error;
pub mod fft;
pub mod history;
pub mod instrument;
pub mod pitch;
pub mod range;
pub mod resolver;
pub mod ring_buffer;
pub mod session;
pub mod synthetic;
pub mod tuning;

pub use audio::{AudioFrame, CaptureFeed, CpalCapture, FaultReporter, FrameReceiver, FrameSender};
pub use config::{DropPolicy, PerformanceMode, PipelineConfig, TunerConfig};
pub use driver::{DriverState, PipelineDriver, PipelineState};
pub use error::{Result, TunerError};
pub use instrument::{GuitarTuning, Instrument, InstrumentKind, NoteTable, StringCandidate};
pub use pitch::{NO_PITCH, PitchEstimator, YinEstimator};
pub use range::SearchParameters;
pub use session::{Session, StateSender, state_channel};
pub use tuning::{Note, NoteName, TuningReference};
