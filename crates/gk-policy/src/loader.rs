// loader.rs — Rule source loader.
//
// Reads every `*.toml` file in the default, user and admin tier directories
// and turns each `[[rule]]` entry into one or more compiled PolicyRules.
//
// Failure isolation:
// - A missing tier directory is skipped silently.
// - A file that cannot be read or parsed is skipped; other files still load.
// - A rule entry with a bad regex, an out-of-range priority or an invalid
//   field combination is dropped; other entries in the file still load.
//
// Every skipped file or rule is logged and returned as a LoadIssue so the
// host can surface it. Rules that do not apply in the active approval mode
// are dropped here and never reach the engine.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::PolicyPaths;
use crate::error::PolicyError;
use crate::matcher::{mcp_identity, server_wildcard, ArgsPattern, ToolPattern};
use crate::priority::compile_priority;
use crate::rule::{ApprovalMode, Decision, PolicyRule, RuleSource, TrustTier};

/// One rule file: an array of `[[rule]]` tables.
///
/// ```toml
/// [[rule]]
/// toolName = ["read_file", "glob"]
/// decision = "allow"
/// priority = 50
///
/// [[rule]]
/// mcpName = "github"
/// toolName = "delete_repo"
/// decision = "deny"
/// priority = 900
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleFile {
    #[serde(default)]
    pub rule: Vec<RuleEntry>,
}

/// A single rule entry as written in a rule file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleEntry {
    /// One tool name or several; each expands into its own rule.
    #[serde(default)]
    pub tool_name: Option<OneOrMany>,

    /// MCP server the tool lives on. Alone, it covers every tool of the server.
    #[serde(default)]
    pub mcp_name: Option<String>,

    /// Regex searched in the canonical argument string.
    #[serde(default)]
    pub args_pattern: Option<String>,

    /// Shell command prefix(es); shorthand for an args pattern on `command`.
    #[serde(default)]
    pub command_prefix: Option<OneOrMany>,

    /// Shell command regex; shorthand for an args pattern on `command`.
    #[serde(default)]
    pub command_regex: Option<String>,

    pub decision: Decision,

    /// Declared priority within the tier, in [0, 1000).
    #[serde(default)]
    pub priority: f64,

    /// Approval modes the rule applies in. Empty means all.
    #[serde(default)]
    pub modes: Vec<ApprovalMode>,
}

/// A string or an array of strings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// A file or rule the loader skipped, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadIssue {
    pub tier: TrustTier,
    pub path: PathBuf,
    /// Index of the `[[rule]]` entry, or None when the whole file was skipped.
    pub rule_index: Option<usize>,
    pub message: String,
}

impl fmt::Display for LoadIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rule_index {
            Some(index) => write!(
                f,
                "[{}] {} rule #{}: {}",
                self.tier,
                self.path.display(),
                index,
                self.message
            ),
            None => write!(f, "[{}] {}: {}", self.tier, self.path.display(), self.message),
        }
    }
}

/// The loader's output: compiled rules plus everything that was skipped.
#[derive(Debug, Clone, Default)]
pub struct LoadedRules {
    pub rules: Vec<PolicyRule>,
    pub issues: Vec<LoadIssue>,
}

impl LoadedRules {
    fn record(&mut self, issue: LoadIssue) {
        tracing::warn!("skipping policy input: {}", issue);
        self.issues.push(issue);
    }
}

/// Load every tier directory for the given approval mode.
pub fn load_policy_rules(paths: &PolicyPaths, mode: &ApprovalMode) -> LoadedRules {
    let mut loaded = LoadedRules::default();
    for (tier, dir) in paths.tiers() {
        load_tier_dir(dir, tier, mode, &mut loaded);
    }
    tracing::debug!(
        "loaded {} policy rules ({} issues) for mode '{}'",
        loaded.rules.len(),
        loaded.issues.len(),
        mode
    );
    loaded
}

/// Load all `*.toml` files in one tier directory, in file-name order.
pub fn load_tier_dir(dir: &Path, tier: TrustTier, mode: &ApprovalMode, loaded: &mut LoadedRules) {
    let files = match rule_files_in(dir) {
        Ok(files) => files,
        Err(PolicyError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
            tracing::debug!("{} tier directory {} not present", tier, dir.display());
            return;
        }
        Err(e) => {
            loaded.record(LoadIssue {
                tier,
                path: dir.to_path_buf(),
                rule_index: None,
                message: e.to_string(),
            });
            return;
        }
    };

    for path in files {
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(source) => {
                let err = PolicyError::Io {
                    path: path.clone(),
                    source,
                };
                loaded.record(LoadIssue {
                    tier,
                    path,
                    rule_index: None,
                    message: err.to_string(),
                });
                continue;
            }
        };

        load_rule_content(&content, path, tier, mode, loaded);
    }
}

/// Parse one file's content into `loaded`, recording the file as skipped
/// if it cannot be parsed at all.
pub(crate) fn load_rule_content(
    content: &str,
    path: PathBuf,
    tier: TrustTier,
    mode: &ApprovalMode,
    loaded: &mut LoadedRules,
) {
    match parse_rule_file(content, &path, tier, mode) {
        Ok(parsed) => {
            tracing::debug!(
                "{} tier: {} rules from {}",
                tier,
                parsed.rules.len(),
                path.display()
            );
            loaded.rules.extend(parsed.rules);
            for issue in parsed.issues {
                loaded.record(issue);
            }
        }
        Err(e) => loaded.record(LoadIssue {
            tier,
            path,
            rule_index: None,
            message: e.to_string(),
        }),
    }
}

/// Parse one rule file's content.
///
/// Returns `Err` only when the file as a whole is unusable (TOML syntax or
/// schema errors); per-rule problems are reported in the returned issues.
pub fn parse_rule_file(
    content: &str,
    path: &Path,
    tier: TrustTier,
    mode: &ApprovalMode,
) -> Result<LoadedRules, PolicyError> {
    let file: RuleFile = toml::from_str(content).map_err(|source| PolicyError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut parsed = LoadedRules::default();
    for (index, entry) in file.rule.into_iter().enumerate() {
        if !entry.modes.is_empty() && !entry.modes.contains(mode) {
            continue;
        }
        let source = RuleSource::File {
            tier,
            path: path.to_path_buf(),
        };
        match expand_entry(entry, tier, source) {
            Ok(rules) => parsed.rules.extend(rules),
            Err(e) => parsed.issues.push(LoadIssue {
                tier,
                path: path.to_path_buf(),
                rule_index: Some(index),
                message: e.to_string(),
            }),
        }
    }
    Ok(parsed)
}

/// Expand one entry into atomic compiled rules: one per tool name and per
/// command prefix. Any failure rejects the whole entry.
pub fn expand_entry(
    entry: RuleEntry,
    tier: TrustTier,
    source: RuleSource,
) -> Result<Vec<PolicyRule>, PolicyError> {
    let arg_sources = [
        entry.args_pattern.is_some(),
        entry.command_prefix.is_some(),
        entry.command_regex.is_some(),
    ];
    if arg_sources.into_iter().filter(|set| *set).count() > 1 {
        return Err(PolicyError::InvalidRule {
            reason: "argsPattern, commandPrefix and commandRegex are mutually exclusive"
                .to_string(),
        });
    }
    if (entry.command_prefix.is_some() || entry.command_regex.is_some())
        && entry.tool_name.is_none()
    {
        return Err(PolicyError::InvalidRule {
            reason: "commandPrefix and commandRegex require a toolName".to_string(),
        });
    }

    let priority = compile_priority(entry.priority, tier)?;
    let tool_patterns = tool_patterns(entry.tool_name, entry.mcp_name.as_deref())?;

    let args_patterns: Vec<Option<ArgsPattern>> = if let Some(pattern) = &entry.args_pattern {
        vec![Some(ArgsPattern::compile(pattern)?)]
    } else if let Some(prefixes) = entry.command_prefix {
        let prefixes = prefixes.into_vec();
        if prefixes.is_empty() {
            return Err(PolicyError::InvalidRule {
                reason: "commandPrefix must not be empty".to_string(),
            });
        }
        prefixes
            .iter()
            .map(|prefix| ArgsPattern::command_prefix(prefix).map(Some))
            .collect::<Result<_, _>>()?
    } else if let Some(pattern) = &entry.command_regex {
        vec![Some(ArgsPattern::command_regex(pattern)?)]
    } else {
        vec![None]
    };

    let mut rules = Vec::with_capacity(tool_patterns.len() * args_patterns.len());
    for tool_pattern in &tool_patterns {
        for args_pattern in &args_patterns {
            rules.push(PolicyRule {
                tool_pattern: tool_pattern.clone(),
                args_pattern: args_pattern.clone(),
                decision: entry.decision,
                priority,
                modes: entry.modes.clone(),
                source: source.clone(),
            });
        }
    }
    Ok(rules)
}

/// Resolve `toolName` / `mcpName` into tool patterns.
fn tool_patterns(
    tool_name: Option<OneOrMany>,
    mcp_name: Option<&str>,
) -> Result<Vec<ToolPattern>, PolicyError> {
    if mcp_name.is_some_and(str::is_empty) {
        return Err(PolicyError::InvalidRule {
            reason: "mcpName must not be empty".to_string(),
        });
    }

    let names = match tool_name {
        None => {
            return Ok(vec![match mcp_name {
                Some(server) => ToolPattern::parse(&server_wildcard(server)),
                None => ToolPattern::Any,
            }]);
        }
        Some(names) => names.into_vec(),
    };

    if names.is_empty() || names.iter().any(String::is_empty) {
        return Err(PolicyError::InvalidRule {
            reason: "toolName entries must be non-empty".to_string(),
        });
    }

    Ok(names
        .iter()
        .map(|name| match mcp_name {
            Some(server) => ToolPattern::parse(&mcp_identity(server, name)),
            None => ToolPattern::parse(name),
        })
        .collect())
}

/// List `*.toml` files in a directory, sorted by path.
fn rule_files_in(dir: &Path) -> Result<Vec<PathBuf>, PolicyError> {
    let io_err = |source| PolicyError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
