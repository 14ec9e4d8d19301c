// matcher.rs — Tool identity and argument matching.
//
// Every string comparison the engine makes goes through this module:
//
// - ToolPattern: exact names, trailing-wildcard prefixes ("read_*"),
//   server wildcards ("github__*") and the match-all pattern.
// - ArgsPattern: a compiled regex searched inside the canonical JSON form
//   of a call's arguments.
// - canonical_args(): the canonical JSON form itself (compact, keys sorted),
//   so that the same arguments always produce the same string.
//
// New pattern kinds belong here as new ToolPattern variants; the engine only
// calls `matches_request()`.

use std::fmt;

use regex::Regex;
use serde_json::Value;

use crate::error::PolicyError;

/// Separator between server and tool in a composite MCP identity.
pub const MCP_SEPARATOR: &str = "__";

/// Trailing marker meaning "any suffix".
pub const WILDCARD: char = '*';

/// Build the composite identity `server__tool`.
pub fn mcp_identity(server: &str, tool: &str) -> String {
    format!("{}{}{}", server, MCP_SEPARATOR, tool)
}

/// Build the pattern `server__*` that matches every tool of a server.
pub fn server_wildcard(server: &str) -> String {
    format!("{}{}{}", server, MCP_SEPARATOR, WILDCARD)
}

/// A pattern over tool identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolPattern {
    /// Matches every tool. Produced by rule entries with no tool or server name.
    Any,
    /// Matches one identity exactly.
    Exact(String),
    /// Matches every identity starting with the literal prefix.
    Prefix(String),
}

impl ToolPattern {
    /// Parse a pattern string. A trailing `*` turns the rest into a prefix;
    /// a lone `*` matches everything.
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix(WILDCARD) {
            Some("") => ToolPattern::Any,
            Some(prefix) => ToolPattern::Prefix(prefix.to_string()),
            None => ToolPattern::Exact(pattern.to_string()),
        }
    }

    /// Match a single identity string.
    pub fn matches(&self, identity: &str) -> bool {
        match self {
            ToolPattern::Any => true,
            ToolPattern::Exact(name) => name == identity,
            ToolPattern::Prefix(prefix) => identity.starts_with(prefix.as_str()),
        }
    }

    /// The server named by a `server__*` pattern, if this is one.
    pub fn wildcard_server(&self) -> Option<&str> {
        match self {
            ToolPattern::Prefix(prefix) => prefix
                .strip_suffix(MCP_SEPARATOR)
                .filter(|server| !server.is_empty() && !server.contains(MCP_SEPARATOR)),
            _ => None,
        }
    }

    /// Match a request, trying the bare tool name and, when the request comes
    /// from an MCP server, the composite `server__tool` identity.
    ///
    /// A server wildcard never matches a request that names a different
    /// server, even if the bare tool name happens to carry its prefix.
    pub fn matches_request(&self, tool_name: &str, mcp_server: Option<&str>) -> bool {
        if let (Some(wildcard), Some(server)) = (self.wildcard_server(), mcp_server) {
            if wildcard != server {
                return false;
            }
        }

        if self.matches(tool_name) {
            return true;
        }

        match mcp_server {
            Some(server) if !is_qualified_by(tool_name, server) => {
                self.matches(&mcp_identity(server, tool_name))
            }
            _ => false,
        }
    }

    /// True for patterns that can never be satisfied (empty exact names).
    pub fn is_empty(&self) -> bool {
        matches!(self, ToolPattern::Exact(name) if name.is_empty())
    }
}

impl fmt::Display for ToolPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolPattern::Any => write!(f, "{}", WILDCARD),
            ToolPattern::Exact(name) => f.write_str(name),
            ToolPattern::Prefix(prefix) => write!(f, "{}{}", prefix, WILDCARD),
        }
    }
}

/// Whether `tool_name` already carries the `server__` qualifier.
fn is_qualified_by(tool_name: &str, server: &str) -> bool {
    tool_name
        .strip_prefix(server)
        .is_some_and(|rest| rest.starts_with(MCP_SEPARATOR))
}

/// Argument key the shell shorthands look at.
pub const COMMAND_KEY: &str = "command";

/// A compiled pattern over the canonical argument string.
///
/// A plain pattern searches the whole canonical form. The `command`
/// shorthands are scoped to the top-level `command` entry only, so a nested
/// object carrying its own `command` key cannot satisfy them.
#[derive(Debug, Clone)]
pub struct ArgsPattern {
    regex: Regex,
    /// Top-level key whose canonical `"key":value` entry is searched instead
    /// of the whole argument string.
    field: Option<String>,
}

impl ArgsPattern {
    /// Compile regex source text.
    pub fn compile(source: &str) -> Result<Self, PolicyError> {
        Regex::new(source)
            .map(|regex| Self { regex, field: None })
            .map_err(|source_err| PolicyError::InvalidArgsPattern {
                pattern: source.to_string(),
                source: source_err,
            })
    }

    /// Pattern matching a shell call whose `command` argument starts with `prefix`.
    pub fn command_prefix(prefix: &str) -> Result<Self, PolicyError> {
        // The prefix is matched as it appears inside a JSON string literal.
        let quoted = serde_json::to_string(prefix).unwrap_or_default();
        let escaped = quoted
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(prefix);
        Self::command_field(&regex::escape(escaped))
    }

    /// Pattern matching a shell call whose `command` argument matches `pattern`
    /// from its start.
    pub fn command_regex(pattern: &str) -> Result<Self, PolicyError> {
        Self::command_field(pattern)
    }

    fn command_field(value_pattern: &str) -> Result<Self, PolicyError> {
        let mut compiled = Self::compile(&format!("^\"{}\":\"(?:{})", COMMAND_KEY, value_pattern))?;
        compiled.field = Some(COMMAND_KEY.to_string());
        Ok(compiled)
    }

    /// Match a call's arguments. `canonical` must be `canonical_args(args)`.
    pub fn matches(&self, args: &Value, canonical: &str) -> bool {
        match &self.field {
            None => self.regex.is_match(canonical),
            Some(key) => args.get(key).is_some_and(|value| {
                let mut entry = Value::String(key.clone()).to_string();
                entry.push(':');
                write_canonical(value, &mut entry);
                self.regex.is_match(&entry)
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// The top-level argument key this pattern is scoped to, if any.
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

impl PartialEq for ArgsPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str() && self.field == other.field
    }
}

/// Canonical string form of a call's arguments: compact JSON with object
/// keys sorted at every level.
pub fn canonical_args(args: &Value) -> String {
    let mut out = String::new();
    write_canonical(args, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
