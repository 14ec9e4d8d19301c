//! # gk-policy
//!
//! Access-control policy engine for Gatekeeper.
//!
//! Decides, for every tool call an agent wants to make, whether to Allow it,
//! Deny it, or AskUser for confirmation. Rules come from three trust tiers
//! of TOML rule files (bundled defaults, user, administrator), from user
//! settings, and from "always allow" answers injected at runtime.
//!
//! ## Key invariants
//!
//! - **Fail closed**: a request no rule matches resolves to AskUser, never Allow.
//! - **Tier precedence**: compiled priority is `tier + declared / 1000` with
//!   declared priorities confined to `[0, 1000)`, so any Admin rule beats any
//!   User rule, which beats any Default rule.
//! - **Deterministic ties**: equal compiled priorities resolve to the most
//!   restrictive decision (Deny > AskUser > Allow).
//! - **Whole snapshots**: runtime appends swap in a new immutable rule set;
//!   concurrent evaluations never see a partial update.

pub mod bundled;
pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod matcher;
pub mod priority;
pub mod rule;
pub mod settings;
pub mod update;

pub use bundled::{load_bundled, BUNDLED_POLICIES};
pub use config::{PolicyEngineConfig, PolicyPaths, DEFAULT_DECISION};
pub use engine::{
    compile_sources, EvaluationStep, EvaluationTrace, LoadOptions, LoadReport, PolicyEngine,
    PolicyRequest,
};
pub use error::PolicyError;
pub use loader::{load_policy_rules, LoadIssue, LoadedRules};
pub use matcher::{canonical_args, mcp_identity, server_wildcard, ArgsPattern, ToolPattern};
pub use priority::{compile_priority, ALWAYS_ALLOW_PRIORITY};
pub use rule::{ApprovalMode, Decision, PolicyRule, RuleSource, TrustTier};
pub use settings::{settings_rules, PolicySettings, SynthesizedRules};
pub use update::{update_channel, PolicyUpdate, PolicyUpdateReceiver, PolicyUpdateSender};
