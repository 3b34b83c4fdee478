// SPDX-License-Identifier: MIT

//! Shared data model for the Cyrus edge worker: session/issue/repository
//! types, the id newtype families, the `Effect` sum type that drives the
//! orchestrator runtime, and a `Clock` abstraction for deterministic
//! tests.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod activity;
pub mod agent_session;
pub mod clock;
pub mod effect;
pub mod entry;
pub mod id;
pub mod issue;
pub mod issue_repo_cache;
pub mod links;
pub mod pending_selection;
pub mod repository;
pub mod runner_event;
pub mod runner_selection;
pub mod session;
pub mod webhook;

pub use activity::{Activity, ActivityPost, ElicitationOption};
pub use agent_session::{AgentSession, Platform, SessionMetadata, SessionStatus, Workspace};
pub use clock::{Clock, FakeClock, SystemClock};
pub use effect::Effect;
pub use entry::{EntryMetadata, EntryType, SessionEntry};
pub use issue::{Issue, IssueId};
pub use issue_repo_cache::IssueRepositoryCache;
pub use links::ParentLinks;
pub use pending_selection::{PendingSelection, PendingSelectionId, DEFAULT_SELECTION_TTL_MS};
pub use repository::{AllowedTools, Repository, RepositoryId, RoleConfig};
pub use runner_event::{RunnerEvent, StatusKind, UsageTotals, LAST_MESSAGE_MARKER};
pub use runner_selection::{PromptType, RunnerSelection, RunnerType};
pub use session::{AgentSessionId, RunnerSessionId};
pub use webhook::{PromptedActivity, WebhookEvent};
