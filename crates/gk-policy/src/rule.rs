// rule.rs — Compiled policy rules and the values they carry.
//
// A PolicyRule is the unit the engine evaluates. Rules arrive from three
// places (tiered rule files, user settings, runtime "always allow" events)
// but once compiled they all look the same: a tool pattern, an optional
// argument pattern, a decision, a compiled priority and a mode filter.
// The source is kept only for traces and listings.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::matcher::{ArgsPattern, ToolPattern};

/// The outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The call may proceed without asking.
    Allow,
    /// The call must not proceed.
    Deny,
    /// The user has to confirm the call first.
    AskUser,
}

impl Decision {
    /// Ordering used to break exact priority ties: higher is more restrictive.
    pub fn restrictiveness(self) -> u8 {
        match self {
            Decision::Allow => 0,
            Decision::AskUser => 1,
            Decision::Deny => 2,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => write!(f, "allow"),
            Decision::Deny => write!(f, "deny"),
            Decision::AskUser => write!(f, "ask_user"),
        }
    }
}

/// The provenance tier of a rule file. Higher tiers always win.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    /// Bundled with the application.
    Default = 1,
    /// Per-user configuration.
    User = 2,
    /// System-wide administrator configuration.
    Admin = 3,
}

impl TrustTier {
    /// All tiers, lowest first.
    pub const ALL: [TrustTier; 3] = [TrustTier::Default, TrustTier::User, TrustTier::Admin];

    /// The integer base of this tier's priority band.
    pub fn base(self) -> f64 {
        f64::from(self as u8)
    }
}

impl fmt::Display for TrustTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustTier::Default => write!(f, "default"),
            TrustTier::User => write!(f, "user"),
            TrustTier::Admin => write!(f, "admin"),
        }
    }
}

/// An approval mode identifier supplied by the host (e.g. "default",
/// "auto_edit", "autonomous"). Treated as an opaque filter key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct ApprovalMode(String);

impl ApprovalMode {
    pub fn new(mode: impl Into<String>) -> Self {
        Self(mode.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ApprovalMode {
    fn default() -> Self {
        Self::new("default")
    }
}

impl fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApprovalMode {
    fn from(mode: &str) -> Self {
        Self::new(mode)
    }
}

/// Where a compiled rule came from.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleSource {
    /// A rule file in one of the tier directories.
    File { tier: TrustTier, path: PathBuf },
    /// Synthesized from user settings.
    Settings { setting: String },
    /// Injected at runtime through the update channel.
    Runtime,
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSource::File { tier, path } => write!(f, "{} tier ({})", tier, path.display()),
            RuleSource::Settings { setting } => write!(f, "settings ({})", setting),
            RuleSource::Runtime => write!(f, "runtime"),
        }
    }
}

/// A compiled policy rule.
#[derive(Debug, Clone)]
pub struct PolicyRule {
    /// Which tool identities this rule applies to.
    pub tool_pattern: ToolPattern,
    /// Optional pattern over the canonical argument string.
    pub args_pattern: Option<ArgsPattern>,
    /// What to do when the rule wins.
    pub decision: Decision,
    /// Compiled priority (tier + declared / 1000, or an absolute value).
    pub priority: f64,
    /// Modes in which the rule applies. Empty means every mode.
    pub modes: Vec<ApprovalMode>,
    /// Provenance, for traces and listings.
    pub source: RuleSource,
}

impl PolicyRule {
    /// Create a mode-independent rule with no argument pattern.
    pub fn new(
        tool_pattern: ToolPattern,
        decision: Decision,
        priority: f64,
        source: RuleSource,
    ) -> Self {
        Self {
            tool_pattern,
            args_pattern: None,
            decision,
            priority,
            modes: Vec::new(),
            source,
        }
    }

    pub fn with_args_pattern(mut self, args_pattern: ArgsPattern) -> Self {
        self.args_pattern = Some(args_pattern);
        self
    }

    pub fn with_modes(mut self, modes: Vec<ApprovalMode>) -> Self {
        self.modes = modes;
        self
    }

    /// Whether the rule applies in the given approval mode.
    pub fn applies_in(&self, mode: &ApprovalMode) -> bool {
        self.modes.is_empty() || self.modes.contains(mode)
    }

    /// One-line description used in traces and the CLI listing.
    pub fn describe(&self) -> String {
        let mut desc = format!(
            "{} -> {} @ {:.3}",
            self.tool_pattern, self.decision, self.priority
        );
        if let Some(args) = &self.args_pattern {
            desc.push_str(&format!(" args~/{}/", args.as_str()));
        }
        if !self.modes.is_empty() {
            let modes: Vec<&str> = self.modes.iter().map(ApprovalMode::as_str).collect();
            desc.push_str(&format!(" modes=[{}]", modes.join(",")));
        }
        desc
    }
}
