// validate.rs — Report every policy input the loader skipped.

use gk_policy::LoadReport;

pub fn execute(report: &LoadReport) -> anyhow::Result<()> {
    for issue in &report.issues {
        println!("SKIPPED {}", issue);
    }
    for error in &report.settings_errors {
        println!("SKIPPED [settings] {}", error);
    }

    let problems = report.issues.len() + report.settings_errors.len();
    if problems > 0 {
        anyhow::bail!(
            "{} policy input(s) skipped; {} rule(s) still loaded",
            problems,
            report.rule_count
        );
    }

    println!("Policies valid: {} rule(s) loaded.", report.rule_count);
    Ok(())
}
