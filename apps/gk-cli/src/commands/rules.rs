// rules.rs — List compiled rules in evaluation order.

use gk_policy::{ApprovalMode, PolicyEngine, PolicyRule};

pub fn execute(engine: &PolicyEngine, mode: &ApprovalMode) -> anyhow::Result<()> {
    let rules = engine.rules();
    if rules.is_empty() {
        println!("No policy rules loaded; every tool call asks the user.");
        return Ok(());
    }

    println!("{} rule(s) for mode '{}', highest priority first:", rules.len(), mode);
    for (i, rule) in rules.iter().enumerate() {
        println!("{}", format_rule(i + 1, rule));
    }
    Ok(())
}

fn format_rule(position: usize, rule: &PolicyRule) -> String {
    format!("{:>4}. {}  [{}]", position, rule.describe(), rule.source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gk_policy::{Decision, RuleSource, ToolPattern};

    #[test]
    fn rule_line_includes_source() {
        let rule = PolicyRule::new(
            ToolPattern::parse("replace"),
            Decision::Allow,
            2.95,
            RuleSource::Runtime,
        );
        let line = format_rule(1, &rule);
        assert!(line.starts_with("   1. replace -> allow @ 2.950"));
        assert!(line.ends_with("[runtime]"));
    }
}
