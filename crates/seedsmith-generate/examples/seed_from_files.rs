use std::env;
use std::path::PathBuf;

use seedsmith_core::SchemaGraph;
use seedsmith_generate::{
    EngineConfig, LogTarget, Session, init_logging, run_plan_json, verify_store, write_store_csv,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&LogTarget::Stderr, "info")?;

    let mut args = env::args().skip(1);
    let mut graph_path: Option<PathBuf> = None;
    let mut plan_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut out_dir = PathBuf::from("out");

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--graph" => graph_path = args.next().map(PathBuf::from),
            "--plan" => plan_path = args.next().map(PathBuf::from),
            "--config" => config_path = args.next().map(PathBuf::from),
            "--out" => out_dir = args.next().map(PathBuf::from).ok_or("missing --out value")?,
            _ => return Err(format!("unexpected argument '{arg}'").into()),
        }
    }

    let graph_path = graph_path.ok_or("missing --graph path")?;
    let plan_path = plan_path.ok_or("missing --plan path")?;
    let config = match config_path {
        Some(path) => EngineConfig::load(&path)?,
        None => EngineConfig::default(),
    };

    let graph: SchemaGraph = serde_json::from_str(&std::fs::read_to_string(&graph_path)?)?;
    let plan: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&plan_path)?)?;

    let mut session = Session::new(graph).with_config(config);
    let outcomes = run_plan_json(&mut session, &plan).await?;

    let integrity = verify_store(session.graph(), session.store());
    if !integrity.is_ok() {
        return Err(format!("{} integrity issue(s): {:?}", integrity.issues.len(), integrity.issues).into());
    }

    for file in write_store_csv(&out_dir, session.graph(), session.store())? {
        println!("{} rows={} path={}", file.model, file.rows, file.path.display());
    }
    for outcome in &outcomes {
        println!("{}", serde_json::to_string(&outcome.report)?);
    }
    Ok(())
}
