//! Authoring tool invocation.
//!
//! The pipeline never spawns processes itself. It builds an [`Invocation`]
//! through [`InvocationBuilder`] and hands it to a [`ToolRunner`]; the real
//! runner is [`ProcessDriver`], tests plug in fakes that write documents
//! directly.
//!
//! ```text
//! Scenario ──▶ InvocationBuilder ──▶ Invocation ──▶ ToolRunner
//!                                                     │
//!                                     ┌───────────────┴──────────────┐
//!                                     ▼                              ▼
//!                              ProcessDriver                  in-process fake
//!                          (headless batch job)              (tests / dry runs)
//! ```

mod invocation;
mod process;

pub use invocation::{Invocation, InvocationBuilder, InvocationMode, USER_SCRIPTS_ENV};
pub use process::{ProcessDriver, OUTPUT_TAIL_LIMIT};

use async_trait::async_trait;

use crate::error::HarnessResult;

/// Executes authoring tool invocations.
///
/// Implementations write artifact files under the invocation's output
/// directory and report failure through
/// [`HarnessError::ToolInvocationFailed`](crate::HarnessError::ToolInvocationFailed)
/// or [`HarnessError::ToolInvocationTimedOut`](crate::HarnessError::ToolInvocationTimedOut).
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run one invocation to completion.
    async fn execute(&self, invocation: &Invocation) -> HarnessResult<()>;
}
