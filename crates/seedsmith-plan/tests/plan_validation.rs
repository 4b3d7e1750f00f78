use seedsmith_core::{ModelBuilder, RelationSpec, ScalarField, ScalarType, SchemaGraph};
use seedsmith_plan::{plan_json_schema_value, validate_plan, validate_plan_json};
use serde_json::json;

fn league_graph() -> SchemaGraph {
    SchemaGraph::builder()
        .model(
            ModelBuilder::new("Team")
                .id(ScalarField::new("id", ScalarType::Int).sequence("Team_id_seq"))
                .scalar(ScalarField::new("name", ScalarType::Text)),
        )
        .model(
            ModelBuilder::new("Player")
                .id(ScalarField::new("id", ScalarType::Int).sequence("Player_id_seq"))
                .scalar(ScalarField::new("teamId", ScalarType::Int))
                .scalar(ScalarField::new("score", ScalarType::Int).generated()),
        )
        .relation(RelationSpec::new("Player", "team", "Team", "players").columns(&["teamId"], &["id"]))
        .build()
        .expect("build graph")
}

#[test]
fn nested_plan_validates_against_graph() {
    let plan = json!({
        "plan_version": "0.1",
        "seed": "league",
        "connect": true,
        "models": {
            "Team": {"data": [{"field": "name", "rule": {"one_of": ["Lions", "Tigers"]}}]}
        },
        "targets": [{
            "model": "Team",
            "count": 2,
            "children": [{"field": "players", "count": {"min": 1, "max": 3}}]
        }]
    });
    let plan_schema = plan_json_schema_value().expect("plan json schema");

    let structural = validate_plan_json(&plan, &plan_schema).expect("compile plan schema");
    assert!(structural.is_ok(), "structural errors: {}", structural.summary());

    let validated = validate_plan(&plan, &plan_schema, &league_graph()).expect("plan is valid");
    assert!(validated.warnings.is_empty());
    assert_eq!(validated.plan.targets.len(), 1);
}

#[test]
fn reports_unknown_fields_relations_and_ranges() {
    let plan = json!({
        "plan_version": "0.1",
        "seed": "league",
        "targets": [{
            "model": "Player",
            "count": {"min": 5, "max": 2},
            "data": [{"field": "nickname", "rule": "x"}],
            "children": [{"field": "team"}]
        }]
    });
    let plan_schema = plan_json_schema_value().expect("plan json schema");

    let report = validate_plan(&plan, &plan_schema, &league_graph()).unwrap_err();
    let codes: Vec<&str> = report.errors.iter().map(|issue| issue.code.as_str()).collect();
    assert!(codes.contains(&"invalid_count_range"));
    assert!(codes.contains(&"unknown_column"));
    assert!(codes.contains(&"not_a_child_relation"));

    let unknown = report
        .errors
        .iter()
        .find(|issue| issue.code == "unknown_column")
        .unwrap();
    assert_eq!(unknown.path, "/targets/0/data/0/field");
}

#[test]
fn warns_when_overriding_generated_column() {
    let plan = json!({
        "plan_version": "0.1",
        "seed": "league",
        "targets": [{"model": "Player", "data": [{"field": "score", "rule": 10}]}]
    });
    let plan_schema = plan_json_schema_value().expect("plan json schema");

    let validated = validate_plan(&plan, &plan_schema, &league_graph()).expect("plan is valid");
    assert_eq!(validated.warnings.len(), 1);
    assert_eq!(validated.warnings[0].code, "overrides_generated_column");
}

#[test]
fn structural_validation_rejects_missing_seed() {
    let plan = json!({"plan_version": "0.1", "targets": []});
    let plan_schema = plan_json_schema_value().expect("plan json schema");

    let report = validate_plan_json(&plan, &plan_schema).expect("compile plan schema");
    assert!(!report.is_ok());
    assert_eq!(report.errors[0].code, "schema_violation");
}
