// check.rs — Evaluate one tool call against the loaded policies.

use anyhow::Context;
use serde_json::Value;

use gk_policy::{ApprovalMode, EvaluationTrace, PolicyEngine, PolicyRequest};

pub fn execute(
    engine: &PolicyEngine,
    tool: &str,
    server: Option<&str>,
    args: Option<&str>,
    mode: &ApprovalMode,
    trace: bool,
) -> anyhow::Result<()> {
    let request = build_request(tool, server, args, mode)?;

    if trace {
        let trace = engine.evaluate_with_trace(&request)?;
        print!("{}", render_trace(&trace));
    } else {
        println!("{}", engine.evaluate(&request)?);
    }
    Ok(())
}

fn build_request(
    tool: &str,
    server: Option<&str>,
    args: Option<&str>,
    mode: &ApprovalMode,
) -> anyhow::Result<PolicyRequest> {
    let mut request = PolicyRequest::new(tool).in_mode(mode.clone());
    if let Some(server) = server {
        request = request.with_server(server);
    }
    if let Some(raw) = args {
        let value: Value =
            serde_json::from_str(raw).with_context(|| format!("--args is not valid JSON: {}", raw))?;
        if !value.is_object() {
            anyhow::bail!("--args must be a JSON object, got: {}", raw);
        }
        request = request.with_args(value);
    }
    Ok(request)
}

fn render_trace(trace: &EvaluationTrace) -> String {
    let mut out = format!("Decision: {}\n", trace.decision);
    out.push_str(&format!("Rules checked: {}\n", trace.rules_checked.len()));
    for (i, rule) in trace.rules_checked.iter().enumerate() {
        out.push_str(&format!("  {:>3}. {}\n", i + 1, rule));
    }
    match &trace.matching_rule {
        Some(rule) => out.push_str(&format!("Matched: {}\n", rule)),
        None => out.push_str("Matched: (none)\n"),
    }
    out.push_str("Steps:\n");
    for step in &trace.steps {
        let marker = if step.terminal { "*" } else { " " };
        out.push_str(&format!("  {} {}: {}\n", marker, step.check, step.outcome));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gk_policy::{Decision, PolicyEngineConfig};

    #[test]
    fn args_must_be_a_json_object() {
        let mode = ApprovalMode::default();
        assert!(build_request("run_shell_command", None, Some("[1,2]"), &mode).is_err());
        assert!(build_request("run_shell_command", None, Some("{oops"), &mode).is_err());
        assert!(build_request("run_shell_command", None, Some(r#"{"command":"ls"}"#), &mode).is_ok());
    }

    #[test]
    fn request_carries_server_and_mode() {
        let request =
            build_request("create_issue", Some("github"), None, &ApprovalMode::new("yolo")).unwrap();
        assert_eq!(request.mcp_server.as_deref(), Some("github"));
        assert_eq!(request.mode, ApprovalMode::new("yolo"));
    }

    #[test]
    fn trace_rendering_names_default_outcome() {
        let engine = PolicyEngine::new(PolicyEngineConfig::default());
        let trace = engine
            .evaluate_with_trace(&PolicyRequest::new("unknown_tool"))
            .unwrap();
        assert_eq!(trace.decision, Decision::AskUser);
        let rendered = render_trace(&trace);
        assert!(rendered.starts_with("Decision: ask_user"));
        assert!(rendered.contains("Matched: (none)"));
        assert!(rendered.contains("* default:"));
    }
}
