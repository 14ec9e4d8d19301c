// update.rs — Runtime rule injection.
//
// When the user answers a confirmation prompt with "always allow", the
// interactive layer sends a PolicyUpdate over this channel. The engine
// listens on the receiving end (subscribed once, at construction) and turns
// each update into a User-tier ALLOW rule at the fixed absolute priority
// 2.95: above every other User rule, below every Admin rule.
//
// Updates are fire-and-forget. An invalid update is logged and dropped;
// it never touches the compiled rule set.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::PolicyEngineConfig;
use crate::engine::PolicyEngine;
use crate::error::PolicyError;
use crate::matcher::{ToolPattern, WILDCARD};
use crate::priority::ALWAYS_ALLOW_PRIORITY;
use crate::rule::{Decision, PolicyRule, RuleSource};

/// An "always allow this tool" event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyUpdate {
    /// Tool identity to allow: a bare name or `server__tool`.
    pub tool_name: String,
}

impl PolicyUpdate {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
        }
    }

    /// Validate the identity and build the rule it stands for.
    pub fn to_rule(&self) -> Result<PolicyRule, PolicyError> {
        let name = self.tool_name.as_str();
        let invalid = |reason: &str| PolicyError::InvalidToolName {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if name.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if name.contains(char::is_whitespace) {
            return Err(invalid("must not contain whitespace"));
        }
        if name.contains(WILDCARD) {
            return Err(invalid("wildcards cannot be approved interactively"));
        }
        Ok(PolicyRule::new(
            ToolPattern::parse(name),
            Decision::Allow,
            ALWAYS_ALLOW_PRIORITY,
            RuleSource::Runtime,
        ))
    }
}

/// Sending half held by the interactive layer.
#[derive(Debug, Clone)]
pub struct PolicyUpdateSender {
    tx: mpsc::UnboundedSender<PolicyUpdate>,
}

impl PolicyUpdateSender {
    /// Publish an update. Returns false once the engine side is gone.
    pub fn send(&self, update: PolicyUpdate) -> bool {
        self.tx.send(update).is_ok()
    }

    /// Shorthand for `send(PolicyUpdate::new(tool_name))`.
    pub fn always_allow(&self, tool_name: impl Into<String>) -> bool {
        self.send(PolicyUpdate::new(tool_name))
    }
}

/// Receiving half handed to the engine at construction.
#[derive(Debug)]
pub struct PolicyUpdateReceiver {
    rx: mpsc::UnboundedReceiver<PolicyUpdate>,
}

/// Create a connected update channel.
pub fn update_channel() -> (PolicyUpdateSender, PolicyUpdateReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PolicyUpdateSender { tx }, PolicyUpdateReceiver { rx })
}

impl PolicyEngine {
    /// Apply one update: validate, synthesize the runtime rule, append it.
    pub fn apply_update(&self, update: &PolicyUpdate) -> Result<(), PolicyError> {
        let rule = update.to_rule()?;
        self.add_rule(rule)
    }

    /// Subscribe the engine to an update channel.
    ///
    /// Updates are applied in arrival order. The task waits for the initial
    /// rule set before applying anything, and ends when every sender is
    /// dropped.
    pub fn spawn_update_listener(
        self: &Arc<Self>,
        mut updates: PolicyUpdateReceiver,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.wait_ready().await;
            while let Some(update) = updates.rx.recv().await {
                if let Err(e) = engine.apply_update(&update) {
                    tracing::warn!("ignoring policy update for '{}': {}", update.tool_name, e);
                }
            }
            tracing::debug!("policy update channel closed");
        })
    }

    /// Create an engine already subscribed to `updates`.
    pub fn with_updates(
        config: PolicyEngineConfig,
        updates: PolicyUpdateReceiver,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let engine = Arc::new(Self::new(config));
        let listener = engine.spawn_update_listener(updates);
        (engine, listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PolicyRequest;

    #[test]
    fn update_builds_runtime_allow_rule() {
        let rule = PolicyUpdate::new("replace").to_rule().unwrap();
        assert_eq!(rule.decision, Decision::Allow);
        assert_eq!(rule.priority, ALWAYS_ALLOW_PRIORITY);
        assert_eq!(rule.source, RuleSource::Runtime);
        assert_eq!(rule.tool_pattern, ToolPattern::Exact("replace".to_string()));
    }

    #[test]
    fn update_rejects_bad_identities() {
        for name in ["", "run shell", "*", "github__*"] {
            let err = PolicyUpdate::new(name).to_rule().unwrap_err();
            assert!(matches!(err, PolicyError::InvalidToolName { .. }), "{}", name);
        }
    }

    #[test]
    fn update_deserializes_from_camel_case() {
        let update: PolicyUpdate = serde_json::from_str(r#"{"toolName":"replace"}"#).unwrap();
        assert_eq!(update, PolicyUpdate::new("replace"));
    }

    #[test]
    fn apply_update_appends_rule() {
        let engine = PolicyEngine::default();
        engine.apply_update(&PolicyUpdate::new("replace")).unwrap();
        assert_eq!(
            engine.evaluate(&PolicyRequest::new("replace")).unwrap(),
            Decision::Allow
        );
    }

    #[test]
    fn invalid_update_leaves_rules_alone() {
        let engine = PolicyEngine::default();
        assert!(engine.apply_update(&PolicyUpdate::new("*")).is_err());
        assert_eq!(engine.rule_count(), 0);
    }

    #[tokio::test]
    async fn listener_applies_updates_in_order() {
        let (sender, receiver) = update_channel();
        let (engine, listener) = PolicyEngine::with_updates(PolicyEngineConfig::default(), receiver);

        assert!(sender.always_allow("replace"));
        assert!(sender.always_allow("bad name"));
        assert!(sender.always_allow("github__create_issue"));
        drop(sender);
        listener.await.unwrap();

        assert_eq!(engine.rule_count(), 2);
        assert_eq!(
            engine
                .evaluate(&PolicyRequest::new("create_issue").with_server("github"))
                .unwrap(),
            Decision::Allow
        );
    }

    #[tokio::test]
    async fn listener_waits_for_initial_load() {
        let (sender, receiver) = update_channel();
        let engine = Arc::new(PolicyEngine::pending());
        let listener = engine.spawn_update_listener(receiver);

        sender.always_allow("replace");
        engine.publish(PolicyEngineConfig::default()).unwrap();
        drop(sender);
        listener.await.unwrap();

        assert_eq!(
            engine.evaluate(&PolicyRequest::new("replace")).unwrap(),
            Decision::Allow
        );
    }

    #[test]
    fn send_reports_closed_channel() {
        let (sender, receiver) = update_channel();
        drop(receiver);
        assert!(!sender.always_allow("replace"));
    }
}
