//! # scoreloop-core
//!
//! Drives a generator and a scorer in a loop until a response clears the
//! policy threshold or the attempt budget runs out.
//!
//! - [`Policy`] fixes threshold and attempt budget for one run
//! - [`RetryController`] runs the loop
//! - [`Outcome`] is derived from the run's [`Ledger`] of [`Attempt`]s

mod context;
mod controller;
mod error;
mod ledger;
mod outcome;
mod policy;

pub use controller::{CallTimeouts, RetryController};
pub use error::{RunError, REJECTED_EXIT_CODE};
pub use ledger::{Attempt, AttemptFailure, FailureKind, Ledger};
pub use outcome::{Outcome, RunStatus};
pub use policy::{resolve_threshold, ComplexityTier, Policy, PolicyError};

pub use scoreloop_agent::Prompt;
