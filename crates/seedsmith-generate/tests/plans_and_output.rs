use std::fs;
use std::path::PathBuf;

use serde_json::json;

use seedsmith_core::{ModelBuilder, RelationSpec, ScalarField, ScalarType, SchemaGraph};
use seedsmith_generate::{
    EngineConfig, GenerateOptions, GenerationError, Input, Row, Session, run_document,
    run_plan_json, verify_store, write_store_csv,
};
use seedsmith_plan::{PlanDocument, PlanError};

fn league() -> SchemaGraph {
    SchemaGraph::builder()
        .model(
            ModelBuilder::new("Team")
                .id(ScalarField::new("id", ScalarType::Int).sequence("team_id_seq"))
                .scalar(ScalarField::new("name", ScalarType::Text))
                .unique("Team_name_key", &["name"]),
        )
        .model(
            ModelBuilder::new("Player")
                .id(ScalarField::new("id", ScalarType::Int).sequence("player_id_seq"))
                .scalar(ScalarField::new("name", ScalarType::Text))
                .scalar(ScalarField::new("position", ScalarType::Text))
                .scalar(ScalarField::new("teamId", ScalarType::Int)),
        )
        .relation(RelationSpec::new("Player", "team", "Team", "players").columns(&["teamId"], &["id"]))
        .build()
        .expect("league graph")
}

fn league_plan() -> serde_json::Value {
    json!({
        "plan_version": "0.1",
        "seed": "league-2024",
        "connect": true,
        "models": {
            "Player": {"data": [{"field": "position", "rule": {"one_of": ["keeper", "defender", "striker"]}}]}
        },
        "targets": [
            {
                "model": "Team",
                "count": 2,
                "data": [{"field": "name", "rule": {"pattern": "team-{index}"}}],
                "children": [{"field": "players", "count": 3}]
            },
            {"model": "Player", "count": 2}
        ]
    })
}

#[tokio::test]
async fn json_plans_run_every_target_in_order() {
    let mut session = Session::new(league());
    let outcomes = run_plan_json(&mut session, &league_plan())
        .await
        .expect("run league plan");

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].report.rows_total, 8);
    assert_eq!(outcomes[0].report.seed, "league-2024");
    assert_eq!(outcomes[1].rows.len(), 2);
    assert_eq!(outcomes[1].report.connects_total, 2);

    assert_eq!(session.store().rows_of("Team").len(), 2);
    assert_eq!(session.store().rows_of("Player").len(), 8);
    for player in session.store().rows_of("Player") {
        let position = player
            .get("position")
            .and_then(|value| value.as_str())
            .expect("position");
        assert!(["keeper", "defender", "striker"].contains(&position));
    }

    let report = verify_store(session.graph(), session.store());
    assert!(report.is_ok(), "{:?}", report.issues);
    assert_eq!(report.rows_checked, 10);
}

#[tokio::test]
async fn parsed_documents_match_json_runs() {
    let plan = PlanDocument::from_json(league_plan()).expect("parse plan");

    let mut from_document = Session::new(league());
    run_document(&mut from_document, &plan)
        .await
        .expect("run parsed document");

    let mut from_json = Session::new(league());
    run_plan_json(&mut from_json, &league_plan())
        .await
        .expect("run json plan");

    assert_eq!(
        serde_json::to_value(from_document.store().rows_of("Player")).expect("encode"),
        serde_json::to_value(from_json.store().rows_of("Player")).expect("encode")
    );
}

#[tokio::test]
async fn invalid_plans_report_every_issue() {
    let mut session = Session::new(league());
    let plan = json!({
        "plan_version": "0.1",
        "seed": "league-2024",
        "targets": [
            {"model": "Stadium", "count": 1},
            {"model": "Team", "data": [{"field": "mascot", "rule": "Lion"}]}
        ]
    });

    let err = run_plan_json(&mut session, &plan)
        .await
        .expect_err("plan references unknown names");

    let GenerationError::Plan(PlanError::Invalid(report)) = &err else {
        panic!("expected validation report, got {err}");
    };
    let codes: Vec<&str> = report.errors.iter().map(|issue| issue.code.as_str()).collect();
    assert!(codes.contains(&"unknown_model"), "{codes:?}");
    assert!(codes.contains(&"unknown_column"), "{codes:?}");
    assert!(session.store().is_empty());
}

#[tokio::test]
async fn configured_default_seed_is_used_without_an_explicit_one() {
    let config = EngineConfig {
        default_seed: "club".to_string(),
        ..EngineConfig::default()
    };
    let mut configured = Session::new(league()).with_config(config);
    let implicit = configured
        .generate("Team", Input::count(2), GenerateOptions::default())
        .await
        .expect("generate with configured seed");

    let mut explicit = Session::new(league());
    let seeded = explicit
        .generate("Team", Input::count(2), GenerateOptions::default().seed("club"))
        .await
        .expect("generate with explicit seed");

    assert_eq!(
        serde_json::to_value(&implicit).expect("encode"),
        serde_json::to_value(&seeded).expect("encode")
    );
}

#[tokio::test]
async fn store_is_written_as_csv_in_load_order() {
    let mut session = Session::new(league());
    run_plan_json(&mut session, &league_plan())
        .await
        .expect("run league plan");

    let out_dir = temp_out_dir("league_csv");
    let files = write_store_csv(&out_dir, session.graph(), session.store()).expect("write csv");

    let names: Vec<&str> = files.iter().map(|file| file.model.as_str()).collect();
    assert_eq!(names, vec!["Team", "Player"]);
    assert_eq!(files[0].rows, 2);
    assert_eq!(files[1].rows, 8);

    let teams = fs::read_to_string(out_dir.join("00_Team.csv")).expect("read Team csv");
    let mut lines = teams.lines();
    assert_eq!(lines.next(), Some("id,name"));
    assert_eq!(lines.next(), Some("1,team-0"));
    assert_eq!(lines.next(), Some("2,team-1"));
    assert_eq!(files[0].bytes, teams.len() as u64);

    let players = fs::read_to_string(out_dir.join("01_Player.csv")).expect("read Player csv");
    assert_eq!(players.lines().next(), Some("id,name,position,teamId"));
    assert_eq!(players.lines().count(), 9);
}

#[test]
fn verify_flags_rows_imported_without_parents() {
    let mut session = Session::new(league());
    session
        .import_rows(
            "Player",
            vec![Row::new().with("id", 1).with("name", "Ada").with("teamId", 3)],
        )
        .expect("import player");

    let report = verify_store(session.graph(), session.store());
    assert_eq!(report.count("dangling_reference"), 1);
}

fn temp_out_dir(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!(
        "seedsmith_generate_{label}_{}",
        uuid::Uuid::new_v4()
    ));
    fs::create_dir_all(&dir).expect("create temp out dir");
    dir
}
