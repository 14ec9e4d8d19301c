// settings.rs — Settings rule synthesizer.
//
// Users rarely write rule files. Most policy comes from a handful of
// settings: tools to always allow or exclude, MCP servers to allow,
// exclude or trust. This module turns those settings into compiled
// User-tier rules at fixed declared priorities:
//
//   mcp.allowed            ALLOW   85
//   mcp_servers.<s>.trust  ALLOW   90
//   tools.allowed          ALLOW  100
//   mcp.excluded           DENY   195
//   tools.exclude          DENY   200
//
// Exclusions sit above inclusions, so listing a tool in both lists denies it.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::matcher::{server_wildcard, ArgsPattern, ToolPattern};
use crate::priority::{
    compile_priority, MCP_ALLOWED_PRIORITY, MCP_EXCLUDED_PRIORITY, MCP_TRUSTED_PRIORITY,
    TOOL_ALLOWED_PRIORITY, TOOL_EXCLUDED_PRIORITY,
};
use crate::rule::{Decision, PolicyRule, RuleSource, TrustTier};

/// Policy-relevant user settings.
///
/// ```toml
/// [tools]
/// allowed = ["read_file", "run_shell_command(git status)"]
/// exclude = ["write_file"]
///
/// [mcp]
/// allowed = ["docs"]
/// excluded = ["legacy"]
///
/// [mcp_servers.github]
/// trust = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySettings {
    #[serde(default)]
    pub tools: ToolSettings,

    #[serde(default)]
    pub mcp: McpSettings,

    /// Per-server settings, keyed by server name.
    #[serde(default)]
    pub mcp_servers: BTreeMap<String, McpServerSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Tools that run without confirmation. `tool(prefix)` limits a shell
    /// tool to commands starting with `prefix`.
    #[serde(default)]
    pub allowed: Vec<String>,

    /// Tools that are never allowed to run.
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpSettings {
    /// Servers whose tools run without confirmation.
    #[serde(default)]
    pub allowed: Vec<String>,

    /// Servers whose tools are never allowed to run.
    #[serde(default)]
    pub excluded: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerSettings {
    /// Skip confirmation for every tool on this server.
    #[serde(default)]
    pub trust: bool,
}

impl PolicySettings {
    /// Parse settings from TOML text.
    pub fn parse(content: &str, path: &Path) -> Result<Self, PolicyError> {
        toml::from_str(content).map_err(|source| PolicyError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, PolicyError> {
        let content = fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Load from file if it exists, otherwise use empty settings.
    pub fn load_or_default(path: &Path) -> Result<Self, PolicyError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Rules synthesized from settings, plus the entries that were rejected.
#[derive(Debug, Default)]
pub struct SynthesizedRules {
    pub rules: Vec<PolicyRule>,
    pub errors: Vec<PolicyError>,
}

/// Build compiled User-tier rules from settings.
///
/// Invalid entries are skipped (and logged); valid ones still produce rules.
pub fn settings_rules(settings: &PolicySettings) -> SynthesizedRules {
    let mut out = SynthesizedRules::default();

    for server in &settings.mcp.allowed {
        push_server_rule(&mut out, server, Decision::Allow, MCP_ALLOWED_PRIORITY, "mcp.allowed");
    }

    for (server, server_settings) in &settings.mcp_servers {
        if server_settings.trust {
            let setting = format!("mcp_servers.{}.trust", server);
            push_server_rule(&mut out, server, Decision::Allow, MCP_TRUSTED_PRIORITY, &setting);
        }
    }

    for tool in &settings.tools.allowed {
        push_tool_rule(&mut out, tool, Decision::Allow, TOOL_ALLOWED_PRIORITY, "tools.allowed");
    }

    for server in &settings.mcp.excluded {
        push_server_rule(&mut out, server, Decision::Deny, MCP_EXCLUDED_PRIORITY, "mcp.excluded");
    }

    for tool in &settings.tools.exclude {
        push_tool_rule(&mut out, tool, Decision::Deny, TOOL_EXCLUDED_PRIORITY, "tools.exclude");
    }

    out
}

fn push_server_rule(
    out: &mut SynthesizedRules,
    server: &str,
    decision: Decision,
    declared: f64,
    setting: &str,
) {
    let result = server_rule(server, decision, declared, setting);
    collect(out, result, setting);
}

fn push_tool_rule(
    out: &mut SynthesizedRules,
    entry: &str,
    decision: Decision,
    declared: f64,
    setting: &str,
) {
    let result = tool_rule(entry, decision, declared, setting);
    collect(out, result, setting);
}

fn collect(out: &mut SynthesizedRules, result: Result<PolicyRule, PolicyError>, setting: &str) {
    match result {
        Ok(rule) => out.rules.push(rule),
        Err(e) => {
            tracing::warn!("ignoring {} entry: {}", setting, e);
            out.errors.push(e);
        }
    }
}

fn server_rule(
    server: &str,
    decision: Decision,
    declared: f64,
    setting: &str,
) -> Result<PolicyRule, PolicyError> {
    let server = server.trim();
    if server.is_empty() || server.contains(char::is_whitespace) {
        return Err(PolicyError::InvalidRule {
            reason: format!("invalid MCP server name '{}'", server),
        });
    }
    Ok(PolicyRule::new(
        ToolPattern::parse(&server_wildcard(server)),
        decision,
        compile_priority(declared, TrustTier::User)?,
        RuleSource::Settings {
            setting: setting.to_string(),
        },
    ))
}

fn tool_rule(
    entry: &str,
    decision: Decision,
    declared: f64,
    setting: &str,
) -> Result<PolicyRule, PolicyError> {
    let (tool, command_prefix) = split_command_shorthand(entry)?;
    let mut rule = PolicyRule::new(
        ToolPattern::parse(tool),
        decision,
        compile_priority(declared, TrustTier::User)?,
        RuleSource::Settings {
            setting: setting.to_string(),
        },
    );
    if let Some(prefix) = command_prefix {
        rule = rule.with_args_pattern(ArgsPattern::command_prefix(prefix)?);
    }
    Ok(rule)
}

/// Split `tool(prefix)` into `("tool", Some("prefix"))`; plain names pass through.
fn split_command_shorthand(entry: &str) -> Result<(&str, Option<&str>), PolicyError> {
    let entry = entry.trim();
    let invalid = |reason: &str| PolicyError::InvalidRule {
        reason: format!("invalid tool entry '{}': {}", entry, reason),
    };

    let (tool, prefix) = match entry.split_once('(') {
        None => (entry, None),
        Some((tool, rest)) => {
            let prefix = rest
                .strip_suffix(')')
                .ok_or_else(|| invalid("missing closing parenthesis"))?
                .trim();
            if prefix.is_empty() {
                return Err(invalid("empty command prefix"));
            }
            (tool.trim(), Some(prefix))
        }
    };

    if tool.is_empty() || tool.contains(char::is_whitespace) {
        return Err(invalid("tool name must be a single non-empty word"));
    }
    Ok((tool, prefix))
}
