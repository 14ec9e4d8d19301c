// engine.rs — Policy evaluation engine.
//
// The PolicyEngine owns the compiled rule set. Every tool call request
// passes through `evaluate()`:
//
// 1. Keep rules that apply in the request's approval mode.
// 2. Keep rules whose tool pattern matches the tool (bare or server__tool)
//    and whose args pattern (if any) matches the canonical arguments.
// 3. No match → AskUser. A request never resolves to an implicit Allow.
// 4. Otherwise the highest compiled priority wins; on an exact tie the most
//    restrictive decision wins (Deny > AskUser > Allow).
//
// The rule set is an immutable snapshot behind an atomic pointer. Readers
// never lock; `add_rule()` builds a new snapshot and swaps it in, so an
// evaluation sees either the old set or the new one, never a mix.
//
// An engine created with `pending()` has no snapshot until `load()` (or
// `publish()`) completes. Until then `evaluate()` returns NotReady and
// `wait_ready()` blocks.

use std::cmp::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::{PolicyEngineConfig, PolicyPaths, DEFAULT_DECISION};
use crate::error::PolicyError;
use crate::bundled::load_bundled;
use crate::loader::{load_policy_rules, LoadIssue, LoadedRules};
use crate::matcher::{canonical_args, mcp_identity};
use crate::priority::check_appended_priority;
use crate::rule::{ApprovalMode, Decision, PolicyRule};
use crate::settings::{settings_rules, PolicySettings};

/// A tool call to be checked.
#[derive(Debug, Clone)]
pub struct PolicyRequest {
    /// The tool's name as the agent knows it (e.g. "run_shell_command").
    pub tool_name: String,
    /// The MCP server hosting the tool, if any.
    pub mcp_server: Option<String>,
    /// The call's arguments.
    pub args: Value,
    /// The host's current approval mode.
    pub mode: ApprovalMode,
}

impl PolicyRequest {
    /// A request with no arguments in the default mode.
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            mcp_server: None,
            args: Value::Object(serde_json::Map::new()),
            mode: ApprovalMode::default(),
        }
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.mcp_server = Some(server.into());
        self
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    pub fn in_mode(mut self, mode: impl Into<ApprovalMode>) -> Self {
        self.mode = mode.into();
        self
    }

    /// Identities a rule may match: the bare name, then `server__tool`.
    pub fn identities(&self) -> Vec<String> {
        let mut ids = vec![self.tool_name.clone()];
        if let Some(server) = &self.mcp_server {
            if !self.tool_name.starts_with(&mcp_identity(server, "")) {
                ids.push(mcp_identity(server, &self.tool_name));
            }
        }
        ids
    }

    fn matches(&self, rule: &PolicyRule, canonical: &str) -> bool {
        rule.applies_in(&self.mode)
            && rule
                .tool_pattern
                .matches_request(&self.tool_name, self.mcp_server.as_deref())
            && rule
                .args_pattern
                .as_ref()
                .map_or(true, |pattern| pattern.matches(&self.args, canonical))
    }
}

/// A step in the evaluation chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationStep {
    /// Which check was performed (e.g. "rule_match", "default").
    pub check: String,
    /// What happened.
    pub outcome: String,
    /// Whether this step decided the outcome.
    pub terminal: bool,
}

/// Full evaluation trace returned alongside a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationTrace {
    /// The final decision.
    pub decision: Decision,
    /// Ordered steps the engine evaluated.
    pub steps: Vec<EvaluationStep>,
    /// Rules applicable in the request's mode, in evaluation order, up to the winner.
    pub rules_checked: Vec<String>,
    /// The winning rule, if any matched.
    pub matching_rule: Option<String>,
}

/// An immutable, sorted rule snapshot.
#[derive(Debug)]
struct RuleSet {
    rules: Vec<PolicyRule>,
    non_interactive: bool,
}

impl RuleSet {
    fn new(mut rules: Vec<PolicyRule>, non_interactive: bool) -> Self {
        rules.sort_by(evaluation_order);
        Self {
            rules,
            non_interactive,
        }
    }

    /// A copy of this set with one more rule.
    fn with_rule(&self, rule: PolicyRule) -> Self {
        let mut rules = Vec::with_capacity(self.rules.len() + 1);
        rules.extend(self.rules.iter().cloned());
        rules.push(rule);
        Self::new(rules, self.non_interactive)
    }

    /// The winning rule: the first match in evaluation order.
    fn find(&self, request: &PolicyRequest, canonical: &str) -> Option<&PolicyRule> {
        self.rules.iter().find(|rule| request.matches(rule, canonical))
    }

    fn finalize(&self, decision: Decision) -> Decision {
        if self.non_interactive && decision == Decision::AskUser {
            Decision::Deny
        } else {
            decision
        }
    }
}

/// Highest priority first; on exact ties, most restrictive first. The sort
/// is stable, so rules identical in both keys keep load order, which cannot
/// change the outcome since they share a decision.
fn evaluation_order(a: &PolicyRule, b: &PolicyRule) -> Ordering {
    b.priority.total_cmp(&a.priority).then_with(|| {
        b.decision
            .restrictiveness()
            .cmp(&a.decision.restrictiveness())
    })
}

/// Inputs for building a rule set from persisted sources.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub paths: PolicyPaths,
    /// Use the embedded default rules when `paths.default_dir` is unset.
    pub bundled_defaults: bool,
    pub settings: PolicySettings,
    pub mode: ApprovalMode,
    pub non_interactive: bool,
}

/// What a load produced besides the published rules.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Number of compiled rules published.
    pub rule_count: usize,
    /// Files and rule entries the loader skipped.
    pub issues: Vec<LoadIssue>,
    /// Settings entries that could not be turned into rules.
    pub settings_errors: Vec<PolicyError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.settings_errors.is_empty()
    }
}

/// Run the loader and the settings synthesizer and merge their output.
pub fn compile_sources(options: &LoadOptions) -> (PolicyEngineConfig, LoadReport) {
    let mut loaded = LoadedRules::default();
    if options.bundled_defaults && options.paths.default_dir.is_none() {
        load_bundled(&options.mode, &mut loaded);
    }
    let from_dirs = load_policy_rules(&options.paths, &options.mode);
    loaded.rules.extend(from_dirs.rules);
    loaded.issues.extend(from_dirs.issues);
    let synthesized = settings_rules(&options.settings);

    let mut rules = loaded.rules;
    rules.extend(synthesized.rules);

    let report = LoadReport {
        rule_count: rules.len(),
        issues: loaded.issues,
        settings_errors: synthesized.errors,
    };
    let config = PolicyEngineConfig::new(rules).non_interactive(options.non_interactive);
    (config, report)
}

/// Evaluates tool calls against the published rule set.
pub struct PolicyEngine {
    rules: ArcSwapOption<RuleSet>,
    ready: watch::Sender<bool>,
}

impl PolicyEngine {
    /// Create a ready engine from an already compiled configuration.
    pub fn new(config: PolicyEngineConfig) -> Self {
        let engine = Self::pending();
        engine.install(config);
        engine
    }

    /// Create an engine with no rule set. It rejects evaluations until
    /// `load()` or `publish()` completes.
    pub fn pending() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            rules: ArcSwapOption::empty(),
            ready,
        }
    }

    /// Build a ready engine synchronously from persisted sources.
    pub fn from_sources(options: &LoadOptions) -> (Self, LoadReport) {
        let (config, report) = compile_sources(options);
        (Self::new(config), report)
    }

    /// Publish the initial rule set. Fails if one is already published.
    pub fn publish(&self, config: PolicyEngineConfig) -> Result<(), PolicyError> {
        if self.install(config) {
            Ok(())
        } else {
            Err(PolicyError::AlreadyLoaded)
        }
    }

    /// Install a rule set if none is present; returns whether it was installed.
    fn install(&self, config: PolicyEngineConfig) -> bool {
        let count = config.rules.len();
        let set = Arc::new(RuleSet::new(config.rules, config.non_interactive));
        let previous = self.rules.rcu(|current| match current {
            Some(existing) => Some(Arc::clone(existing)),
            None => Some(Arc::clone(&set)),
        });
        if previous.is_some() {
            return false;
        }
        self.ready.send_replace(true);
        tracing::info!("policy engine ready with {} rules", count);
        true
    }

    /// Load rules from the tier directories and settings off the async
    /// runtime, then publish them in one step.
    ///
    /// Nothing is published if `cancel` fires first.
    pub async fn load(
        &self,
        options: LoadOptions,
        cancel: CancellationToken,
    ) -> Result<LoadReport, PolicyError> {
        let task = tokio::task::spawn_blocking(move || compile_sources(&options));
        let (config, report) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("policy load cancelled before publish");
                return Err(PolicyError::LoadCancelled);
            }
            joined = task => joined.map_err(|e| PolicyError::LoadTask(e.to_string()))?,
        };
        if cancel.is_cancelled() {
            return Err(PolicyError::LoadCancelled);
        }
        self.publish(config)?;
        Ok(report)
    }

    /// Whether the initial rule set has been published.
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Wait until the initial rule set has been published.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives as long as `self`, so this only returns once ready.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Evaluate a request and return a decision.
    ///
    /// Fails only with `NotReady` before the initial rule set is published.
    pub fn evaluate(&self, request: &PolicyRequest) -> Result<Decision, PolicyError> {
        let guard = self.rules.load();
        let set = guard.as_deref().ok_or(PolicyError::NotReady)?;
        let canonical = canonical_args(&request.args);
        let decision = set
            .find(request, &canonical)
            .map_or(DEFAULT_DECISION, |rule| rule.decision);
        Ok(set.finalize(decision))
    }

    /// Evaluate a request and return the decision with a full trace.
    ///
    /// Same logic as `evaluate()` but records what was checked.
    pub fn evaluate_with_trace(
        &self,
        request: &PolicyRequest,
    ) -> Result<EvaluationTrace, PolicyError> {
        let guard = self.rules.load();
        let set = guard.as_deref().ok_or(PolicyError::NotReady)?;
        let canonical = canonical_args(&request.args);

        let mut steps = vec![EvaluationStep {
            check: "identities".to_string(),
            outcome: format!(
                "{} in mode '{}', args {}",
                request.identities().join(" | "),
                request.mode,
                canonical
            ),
            terminal: false,
        }];
        let mut rules_checked = Vec::new();
        let mut matching_rule = None;

        for rule in set.rules.iter().filter(|r| r.applies_in(&request.mode)) {
            rules_checked.push(rule.describe());
            if request.matches(rule, &canonical) {
                matching_rule = Some(rule);
                break;
            }
        }

        let decision = match matching_rule {
            Some(rule) => {
                steps.push(EvaluationStep {
                    check: "rule_match".to_string(),
                    outcome: format!("matched {} from {}", rule.describe(), rule.source),
                    terminal: true,
                });
                rule.decision
            }
            None => {
                steps.push(EvaluationStep {
                    check: "default".to_string(),
                    outcome: format!(
                        "no rule matched among {} checked; default {}",
                        rules_checked.len(),
                        DEFAULT_DECISION
                    ),
                    terminal: true,
                });
                DEFAULT_DECISION
            }
        };

        let finalized = set.finalize(decision);
        if finalized != decision {
            steps.push(EvaluationStep {
                check: "non_interactive".to_string(),
                outcome: format!("{} reported as {}: nobody can confirm", decision, finalized),
                terminal: true,
            });
        }

        Ok(EvaluationTrace {
            decision: finalized,
            steps,
            rules_checked,
            matching_rule: matching_rule.map(PolicyRule::describe),
        })
    }

    /// Append a compiled rule. The single runtime mutator.
    ///
    /// The rule is validated first; on failure the rule set is untouched.
    /// Takes effect for every evaluation that starts after this returns.
    pub fn add_rule(&self, rule: PolicyRule) -> Result<(), PolicyError> {
        check_appended_priority(rule.priority, &rule.source)?;
        if rule.tool_pattern.is_empty() {
            return Err(PolicyError::InvalidRule {
                reason: "tool pattern must not be empty".to_string(),
            });
        }

        let description = rule.describe();
        let previous = self.rules.rcu(|current| {
            current
                .as_ref()
                .map(|set| Arc::new(set.with_rule(rule.clone())))
        });
        if previous.is_none() {
            return Err(PolicyError::NotReady);
        }
        tracing::info!("policy rule added: {}", description);
        Ok(())
    }

    /// Snapshot of the compiled rules in evaluation order.
    pub fn rules(&self) -> Vec<PolicyRule> {
        self.rules
            .load()
            .as_deref()
            .map(|set| set.rules.clone())
            .unwrap_or_default()
    }

    /// Number of compiled rules (0 while pending).
    pub fn rule_count(&self) -> usize {
        self.rules.load().as_deref().map_or(0, |set| set.rules.len())
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(PolicyEngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{ArgsPattern, ToolPattern};
    use crate::priority::compile_priority;
    use crate::rule::{RuleSource, TrustTier};
    use serde_json::json;

    /// Helper: a tier rule with a declared priority.
    fn rule(pattern: &str, decision: Decision, tier: TrustTier, declared: f64) -> PolicyRule {
        PolicyRule::new(
            ToolPattern::parse(pattern),
            decision,
            compile_priority(declared, tier).unwrap(),
            RuleSource::File {
                tier,
                path: "test.toml".into(),
            },
        )
    }

    fn engine(rules: Vec<PolicyRule>) -> PolicyEngine {
        PolicyEngine::new(PolicyEngineConfig::new(rules))
    }

    #[test]
    fn unmatched_request_asks_user() {
        let engine = engine(vec![rule("read_file", Decision::Allow, TrustTier::User, 10.0)]);
        let decision = engine.evaluate(&PolicyRequest::new("write_file")).unwrap();
        assert_eq!(decision, Decision::AskUser);
    }

    #[test]
    fn empty_engine_asks_user() {
        let decision = PolicyEngine::default()
            .evaluate(&PolicyRequest::new("anything"))
            .unwrap();
        assert_eq!(decision, Decision::AskUser);
    }

    #[test]
    fn admin_tier_beats_higher_declared_user_priority() {
        let engine = engine(vec![
            rule("run_shell_command", Decision::Allow, TrustTier::User, 949.0),
            rule("run_shell_command", Decision::Deny, TrustTier::Admin, 0.0),
        ]);
        let decision = engine
            .evaluate(&PolicyRequest::new("run_shell_command"))
            .unwrap();
        assert_eq!(decision, Decision::Deny);
    }

    #[test]
    fn highest_priority_wins_within_tier() {
        let engine = engine(vec![
            rule("write_file", Decision::Deny, TrustTier::User, 10.0),
            rule("write_file", Decision::Allow, TrustTier::User, 20.0),
        ]);
        let decision = engine.evaluate(&PolicyRequest::new("write_file")).unwrap();
        assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn deny_wins_exact_ties_regardless_of_order() {
        for rules in [
            vec![
                rule("replace", Decision::Allow, TrustTier::User, 50.0),
                rule("replace", Decision::Deny, TrustTier::User, 50.0),
            ],
            vec![
                rule("replace", Decision::Deny, TrustTier::User, 50.0),
                rule("replace", Decision::Allow, TrustTier::User, 50.0),
            ],
        ] {
            let decision = engine(rules).evaluate(&PolicyRequest::new("replace")).unwrap();
            assert_eq!(decision, Decision::Deny);
        }
    }

    #[test]
    fn ask_user_beats_allow_on_ties() {
        let engine = engine(vec![
            rule("glob", Decision::Allow, TrustTier::Default, 5.0),
            rule("glob", Decision::AskUser, TrustTier::Default, 5.0),
        ]);
        let decision = engine.evaluate(&PolicyRequest::new("glob")).unwrap();
        assert_eq!(decision, Decision::AskUser);
    }

    #[test]
    fn mode_filter_applies_at_evaluation() {
        let engine = engine(vec![rule(
            "write_file",
            Decision::Allow,
            TrustTier::Default,
            10.0,
        )
        .with_modes(vec![ApprovalMode::new("auto_edit")])]);

        let in_default = engine.evaluate(&PolicyRequest::new("write_file")).unwrap();
        assert_eq!(in_default, Decision::AskUser);

        let in_auto_edit = engine
            .evaluate(&PolicyRequest::new("write_file").in_mode("auto_edit"))
            .unwrap();
        assert_eq!(in_auto_edit, Decision::Allow);
    }

    #[test]
    fn args_pattern_must_match() {
        let engine = engine(vec![rule(
            "run_shell_command",
            Decision::Allow,
            TrustTier::User,
            10.0,
        )
        .with_args_pattern(ArgsPattern::command_prefix("git status").unwrap())]);

        let allowed = engine
            .evaluate(
                &PolicyRequest::new("run_shell_command")
                    .with_args(json!({"command": "git status"})),
            )
            .unwrap();
        assert_eq!(allowed, Decision::Allow);

        let other = engine
            .evaluate(
                &PolicyRequest::new("run_shell_command").with_args(json!({"command": "rm -rf /"})),
            )
            .unwrap();
        assert_eq!(other, Decision::AskUser);
    }

    #[test]
    fn composite_identity_matches_mcp_requests() {
        let engine = engine(vec![rule(
            "github__create_issue",
            Decision::Deny,
            TrustTier::User,
            200.0,
        )]);
        let decision = engine
            .evaluate(&PolicyRequest::new("create_issue").with_server("github"))
            .unwrap();
        assert_eq!(decision, Decision::Deny);
    }

    #[test]
    fn non_interactive_turns_ask_into_deny() {
        let engine = PolicyEngine::new(
            PolicyEngineConfig::new(vec![rule(
                "read_file",
                Decision::Allow,
                TrustTier::Default,
                1.0,
            )])
            .non_interactive(true),
        );
        assert_eq!(
            engine.evaluate(&PolicyRequest::new("write_file")).unwrap(),
            Decision::Deny
        );
        assert_eq!(
            engine.evaluate(&PolicyRequest::new("read_file")).unwrap(),
            Decision::Allow
        );
    }

    #[test]
    fn pending_engine_is_not_ready() {
        let engine = PolicyEngine::pending();
        assert!(!engine.is_ready());
        assert!(matches!(
            engine.evaluate(&PolicyRequest::new("read_file")),
            Err(PolicyError::NotReady)
        ));
        assert!(matches!(
            engine.add_rule(rule("read_file", Decision::Allow, TrustTier::User, 1.0)),
            Err(PolicyError::NotReady)
        ));
    }

    #[test]
    fn publish_makes_engine_ready_once() {
        let engine = PolicyEngine::pending();
        engine.publish(PolicyEngineConfig::default()).unwrap();
        assert!(engine.is_ready());
        assert!(matches!(
            engine.publish(PolicyEngineConfig::default()),
            Err(PolicyError::AlreadyLoaded)
        ));
    }

    #[test]
    fn add_rule_takes_effect_for_later_evaluations() {
        let engine = engine(vec![]);
        let request = PolicyRequest::new("replace");
        assert_eq!(engine.evaluate(&request).unwrap(), Decision::AskUser);

        engine
            .add_rule(rule("replace", Decision::Allow, TrustTier::User, 1.0))
            .unwrap();
        assert_eq!(engine.evaluate(&request).unwrap(), Decision::Allow);
        assert_eq!(engine.rule_count(), 1);
    }

    #[test]
    fn invalid_rule_is_rejected_without_change() {
        let engine = engine(vec![rule("read_file", Decision::Allow, TrustTier::User, 1.0)]);

        let mut bad = rule("write_file", Decision::Allow, TrustTier::User, 1.0);
        bad.priority = f64::NAN;
        assert!(engine.add_rule(bad).is_err());

        let empty = PolicyRule::new(
            ToolPattern::Exact(String::new()),
            Decision::Allow,
            2.0,
            RuleSource::Runtime,
        );
        assert!(engine.add_rule(empty).is_err());
        assert_eq!(engine.rule_count(), 1);
    }

    #[test]
    fn appended_rule_cannot_outrank_admin_tier() {
        let engine = engine(vec![rule("replace", Decision::Deny, TrustTier::Admin, 0.0)]);

        let above_tiers = PolicyRule::new(
            ToolPattern::parse("replace"),
            Decision::Allow,
            5.0,
            RuleSource::Settings {
                setting: "tools.allowed".to_string(),
            },
        );
        assert!(matches!(
            engine.add_rule(above_tiers),
            Err(PolicyError::RulePriorityOutOfBand { .. })
        ));

        let runtime_in_admin_band = PolicyRule::new(
            ToolPattern::parse("replace"),
            Decision::Allow,
            3.5,
            RuleSource::Runtime,
        );
        assert!(engine.add_rule(runtime_in_admin_band).is_err());

        assert_eq!(engine.rule_count(), 1);
        assert_eq!(
            engine.evaluate(&PolicyRequest::new("replace")).unwrap(),
            Decision::Deny
        );
    }

    #[test]
    fn rules_are_listed_in_evaluation_order() {
        let engine = engine(vec![
            rule("a", Decision::Allow, TrustTier::Default, 1.0),
            rule("b", Decision::Allow, TrustTier::Admin, 1.0),
            rule("c", Decision::Allow, TrustTier::User, 1.0),
        ]);
        let order: Vec<String> = engine
            .rules()
            .iter()
            .map(|r| r.tool_pattern.to_string())
            .collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn trace_records_winner() {
        let engine = engine(vec![
            rule("write_file", Decision::Allow, TrustTier::User, 100.0),
            rule("write_file", Decision::Deny, TrustTier::User, 200.0),
        ]);
        let trace = engine
            .evaluate_with_trace(&PolicyRequest::new("write_file"))
            .unwrap();
        assert_eq!(trace.decision, Decision::Deny);
        assert_eq!(trace.rules_checked.len(), 1);
        assert!(trace.matching_rule.unwrap().contains("deny"));
        assert!(trace.steps.last().unwrap().terminal);
    }

    #[test]
    fn trace_records_default_fallback() {
        let engine = engine(vec![rule("read_file", Decision::Allow, TrustTier::User, 1.0)]);
        let trace = engine
            .evaluate_with_trace(&PolicyRequest::new("write_file"))
            .unwrap();
        assert_eq!(trace.decision, Decision::AskUser);
        assert!(trace.matching_rule.is_none());
        assert_eq!(trace.steps.last().unwrap().check, "default");
    }

    #[test]
    fn trace_agrees_with_evaluate() {
        let engine = PolicyEngine::new(
            PolicyEngineConfig::new(vec![
                rule("github__*", Decision::Allow, TrustTier::User, 90.0),
                rule("github__delete_repo", Decision::Deny, TrustTier::User, 200.0),
            ])
            .non_interactive(true),
        );
        for request in [
            PolicyRequest::new("delete_repo").with_server("github"),
            PolicyRequest::new("list_issues").with_server("github"),
            PolicyRequest::new("list_issues").with_server("gitlab"),
        ] {
            let decision = engine.evaluate(&request).unwrap();
            let trace = engine.evaluate_with_trace(&request).unwrap();
            assert_eq!(decision, trace.decision);
        }
    }

    #[test]
    fn identities_include_composite_once() {
        let request = PolicyRequest::new("create_issue").with_server("github");
        assert_eq!(
            request.identities(),
            vec!["create_issue", "github__create_issue"]
        );
        let qualified = PolicyRequest::new("github__create_issue").with_server("github");
        assert_eq!(qualified.identities(), vec!["github__create_issue"]);
    }

    #[tokio::test]
    async fn wait_ready_returns_after_publish() {
        let engine = Arc::new(PolicyEngine::pending());
        let waiter = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine.wait_ready().await;
                engine.evaluate(&PolicyRequest::new("read_file"))
            })
        };
        engine.publish(PolicyEngineConfig::default()).unwrap();
        let decision = waiter.await.unwrap().unwrap();
        assert_eq!(decision, Decision::AskUser);
    }

    #[tokio::test]
    async fn cancelled_load_publishes_nothing() {
        let engine = PolicyEngine::pending();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = engine.load(LoadOptions::default(), cancel).await;
        assert!(matches!(result, Err(PolicyError::LoadCancelled)));
        assert!(!engine.is_ready());
    }
}
