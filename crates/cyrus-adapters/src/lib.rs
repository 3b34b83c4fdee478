// SPDX-License-Identifier: MIT

//! The three external-collaborator traits the orchestrator depends on
//! (§6) plus one concrete adapter per trait. Wire formats for the real
//! tracker API and runner binaries are out of scope (§1 non-goals); these
//! adapters exist so the crate is runnable end to end.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod runner;
pub mod tracker;
pub mod workspace;

pub use runner::{Runner, RunnerError, RunnerFactory, SubprocessRunner};
pub use tracker::{HttpTrackerService, IssueTrackerService, TrackerError};
pub use workspace::{GitWorktreeWorkspaceProvider, WorkspaceError, WorkspaceProvider};

#[cfg(any(test, feature = "test-support"))]
pub use runner::FakeRunner;
#[cfg(any(test, feature = "test-support"))]
pub use tracker::{FakeTrackerService, PostedActivity};
#[cfg(any(test, feature = "test-support"))]
pub use workspace::TempDirWorkspaceProvider;
