use std::path::Path;

use seedsmith_core::SchemaGraph;
use seedsmith_plan::{ValidationIssue, plan_json_schema_value, validate_plan};
use serde_json::Value;

// usage: validate_plan <plan.json> <graph.json>
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [plan_path, graph_path] = args.as_slice() else {
        return Err("usage: validate_plan <plan.json> <graph.json>".into());
    };

    let plan_json = read_json(Path::new(plan_path))?;
    let graph: SchemaGraph = serde_json::from_value(read_json(Path::new(graph_path))?)?;

    match validate_plan(&plan_json, &plan_json_schema_value()?, &graph) {
        Ok(validated) => {
            for issue in &validated.warnings {
                print_issue("warning", issue);
            }
            let targets: Vec<&str> = validated
                .plan
                .targets
                .iter()
                .map(|target| target.model.as_str())
                .collect();
            println!("ok: {} target(s): {}", targets.len(), targets.join(", "));
            Ok(())
        }
        Err(report) => {
            for issue in &report.errors {
                print_issue("error", issue);
            }
            for issue in &report.warnings {
                print_issue("warning", issue);
            }
            Err(format!("{} validation error(s)", report.errors.len()).into())
        }
    }
}

fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

fn print_issue(level: &str, issue: &ValidationIssue) {
    eprintln!("{level} [{}] at {}: {}", issue.code, issue.path, issue.message);
    if let Some(hint) = &issue.hint {
        eprintln!("    hint: {hint}");
    }
}
