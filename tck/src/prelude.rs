//! Prelude module for convenient imports
//!
//! Import everything you need with:
//! ```rust,ignore
//! use hubs_tck::prelude::*;
//! ```

// Configuration and errors
pub use crate::config::{HarnessConfig, ToolTarget, Variant};
pub use crate::error::{HarnessError, HarnessResult};

// Tool invocation
pub use crate::driver::{Invocation, InvocationBuilder, InvocationMode, ProcessDriver, ToolRunner};

// Validation and documents
pub use crate::document::{Document, EntitySelector, NameOrIndex};
pub use crate::validator::{StructuralValidator, ValidationReport};

// Assertions and roundtrips
pub use crate::assertion::{assert_expectations, ExpectationMode, ExtensionExpectation, FixtureValue};
pub use crate::roundtrip::{FieldPattern, RoundtripPlan, RoundtripRunner, RoundtripSource, RoundtripStage};

// Scenarios and reports
pub use crate::report::{PairReport, Phase, RunReport, ScenarioResult, Status};
pub use crate::scenarios::{Harness, Scenario, ScenarioSet};

// Re-export commonly used external types
pub use anyhow::{anyhow, Context, Result};
pub use std::sync::Arc;
pub use tokio::time::Duration;
