//! # Hubs TCK: conformance kit for the Blender glTF exporter
//!
//! Drives the authoring tool headless, gates every artifact through a
//! structural validator, checks `MOZ_hubs_components` payloads against
//! declarative fixtures and verifies that export, import, export is stable.
//!
//! ## Architecture Overview
//!
//! ```text
//! ScenarioSet ──▶ ToolRunner (export) ──▶ StructuralValidator ──▶ assert_expectations
//!                                                                      │
//!                     RoundtripRunner ◀────────── exported artifact ◀──┘
//!                (reimport, validate both, re-assert, diff)
//! ```
//!
//! - **driver**: invocation building and the process driver
//! - **validator**: structural validation with bounded digests
//! - **document**: artifact loading and name-to-index resolution
//! - **assertion**: fixture trees and the extension assertion engine
//! - **roundtrip**: the export/reimport state machine and document diff
//! - **scenarios**: scenario declarations, built-in fixture sets, the harness
//! - **report**: per-pair results rendered as text, JSON or JUnit XML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hubs_tck::prelude::*;
//!
//! let config = HarnessConfig::default();
//! let scenarios = ScenarioSet::from_config(&config)?;
//! let runner = Arc::new(ProcessDriver::from_config(&config));
//! let report = Harness::new(config, scenarios, runner)?.run().await;
//! report.print_summary();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Export/import correctness checks on extension payloads
pub mod assertion;

/// Harness configuration
pub mod config;

/// Artifact documents and entity lookup
pub mod document;

/// Authoring tool invocation
pub mod driver;

/// Error taxonomy
pub mod error;

/// Commonly used re-exports
pub mod prelude;

/// Run reports
pub mod report;

/// Roundtrip consistency
pub mod roundtrip;

/// Scenario declarations and the harness
pub mod scenarios;

/// Structural validation
pub mod validator;

pub use error::{HarnessError, HarnessResult};
