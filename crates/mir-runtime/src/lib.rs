//! `mir-runtime` – intent-to-mission orchestration.
//!
//! # Modules
//!
//! - [`mission_builder`] – [`MissionBuilder`][mission_builder::MissionBuilder]:
//!   maps each [`Intent`][mir_types::Intent] to its mission template and
//!   patches the one action parameter that carries the intent's argument.
//! - [`orchestrator`] – [`QueueOrchestrator`][orchestrator::QueueOrchestrator]:
//!   the local FIFO and the single-slot submission policy, driven by the
//!   caller through [`advance`][orchestrator::QueueOrchestrator::advance].
//! - [`watchdog`] – [`StallWatchdog`][watchdog::StallWatchdog]: reports a
//!   submitted mission that stays outstanding past its deadline.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export.

pub mod mission_builder;
pub mod orchestrator;
pub mod telemetry;
pub mod watchdog;

pub use mission_builder::{MissionBuilder, MissionTemplates};
pub use orchestrator::{AdvanceOutcome, OrchestratorState, QueueOrchestrator, WaitReason};
pub use watchdog::{Stall, StallWatchdog};
