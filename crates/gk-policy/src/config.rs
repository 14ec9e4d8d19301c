// config.rs — Engine construction inputs.
//
// PolicyPaths names the three tier directories explicitly. The engine never
// resolves paths on its own; the host decides where bundled, user and admin
// rules live and passes them in.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::rule::{Decision, PolicyRule, TrustTier};

/// The decision for requests no rule matches. Never Allow.
pub const DEFAULT_DECISION: Decision = Decision::AskUser;

/// Locations of the tiered rule directories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPaths {
    /// Bundled rules shipped with the application.
    #[serde(default)]
    pub default_dir: Option<PathBuf>,

    /// Per-user rules.
    #[serde(default)]
    pub user_dir: Option<PathBuf>,

    /// Administrator rules, colocated with system-wide settings.
    #[serde(default)]
    pub admin_dir: Option<PathBuf>,
}

impl PolicyPaths {
    pub fn new(
        default_dir: impl Into<PathBuf>,
        user_dir: impl Into<PathBuf>,
        admin_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            default_dir: Some(default_dir.into()),
            user_dir: Some(user_dir.into()),
            admin_dir: Some(admin_dir.into()),
        }
    }

    /// The configured directories paired with their tier, lowest tier first.
    pub fn tiers(&self) -> Vec<(TrustTier, &Path)> {
        [
            (TrustTier::Default, self.default_dir.as_deref()),
            (TrustTier::User, self.user_dir.as_deref()),
            (TrustTier::Admin, self.admin_dir.as_deref()),
        ]
        .into_iter()
        .filter_map(|(tier, dir)| dir.map(|d| (tier, d)))
        .collect()
    }
}

/// Everything the engine needs to publish a rule set.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngineConfig {
    /// Compiled rules, in any order; the engine sorts them.
    pub rules: Vec<PolicyRule>,

    /// When set, nobody is available to answer a confirmation prompt, so
    /// AskUser outcomes are reported as Deny.
    pub non_interactive: bool,
}

impl PolicyEngineConfig {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self {
            rules,
            non_interactive: false,
        }
    }

    pub fn non_interactive(mut self, non_interactive: bool) -> Self {
        self.non_interactive = non_interactive;
        self
    }
}
