use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use seedsmith_core::{ModelBuilder, RelationSpec, ScalarField, ScalarType, SchemaGraph};
use seedsmith_generate::seed::seed_u64;
use seedsmith_generate::{
    ConnectPolicy, Count, GenerateOptions, GeneratedValue, GenerationError, Input, RowSpec,
    Session, UserModels,
};

fn serial(name: &str, sequence: &str) -> ScalarField {
    ScalarField::new(name, ScalarType::Int).sequence(sequence)
}

fn text(name: &str) -> ScalarField {
    ScalarField::new(name, ScalarType::Text)
}

fn int(name: &str) -> ScalarField {
    ScalarField::new(name, ScalarType::Int)
}

fn league() -> SchemaGraph {
    SchemaGraph::builder()
        .model(
            ModelBuilder::new("Team")
                .id(serial("id", "team_id_seq"))
                .scalar(text("name")),
        )
        .model(
            ModelBuilder::new("Player")
                .id(serial("id", "player_id_seq"))
                .scalar(text("name"))
                .scalar(int("teamId")),
        )
        .relation(RelationSpec::new("Player", "team", "Team", "players").columns(&["teamId"], &["id"]))
        .build()
        .expect("league graph")
}

fn users() -> SchemaGraph {
    SchemaGraph::builder()
        .model(
            ModelBuilder::new("User")
                .id(serial("id", "user_id_seq"))
                .scalar(text("email"))
                .unique("User_email_key", &["email"]),
        )
        .build()
        .expect("users graph")
}

fn organizations() -> SchemaGraph {
    SchemaGraph::builder()
        .model(
            ModelBuilder::new("Organization")
                .id(serial("id", "organization_id_seq"))
                .scalar(text("name")),
        )
        .model(
            ModelBuilder::new("Member")
                .id(serial("id", "member_id_seq"))
                .scalar(text("name"))
                .scalar(int("organizationId")),
        )
        .relation(
            RelationSpec::new("Member", "organization", "Organization", "members")
                .columns(&["organizationId"], &["id"]),
        )
        .build()
        .expect("organizations graph")
}

fn fixtures() -> SchemaGraph {
    SchemaGraph::builder()
        .model(ModelBuilder::new("Team").id(serial("id", "team_id_seq")))
        .model(ModelBuilder::new("Game").id(serial("id", "game_id_seq")))
        .model(
            ModelBuilder::new("Match")
                .id(serial("id", "match_id_seq"))
                .scalar(int("teamId"))
                .scalar(int("gameId"))
                .unique("Match_teamId_gameId_key", &["teamId", "gameId"]),
        )
        .relation(RelationSpec::new("Match", "team", "Team", "matches").columns(&["teamId"], &["id"]))
        .relation(RelationSpec::new("Match", "game", "Game", "matches").columns(&["gameId"], &["id"]))
        .build()
        .expect("fixtures graph")
}

#[tokio::test]
async fn nested_children_reference_their_parent() {
    let mut session = Session::new(league());
    let input = Input::repeat(
        Count::Fixed(2),
        RowSpec::new().children("players", Input::count(3)),
    );

    let teams = session
        .generate("Team", input, GenerateOptions::default())
        .await
        .expect("generate teams");

    assert_eq!(teams.len(), 2);
    assert_eq!(session.store().rows_of("Team").len(), 2);
    let players = session.store().rows_of("Player");
    assert_eq!(players.len(), 6);

    for team in &teams {
        let id = team.get("id").expect("team id");
        let roster = players
            .iter()
            .filter(|player| player.get("teamId") == Some(id))
            .count();
        assert_eq!(roster, 3, "team {id:?} should have three players");
    }
}

#[tokio::test]
async fn parents_are_generated_when_missing() {
    let mut session = Session::new(league());
    let players = session
        .generate("Player", Input::count(2), GenerateOptions::default())
        .await
        .expect("generate players");

    let teams = session.store().rows_of("Team");
    assert_eq!(teams.len(), 2);
    for (player, team) in players.iter().zip(teams) {
        assert_eq!(player.get("teamId"), team.get("id"));
    }
}

#[tokio::test]
async fn exhausted_unique_values_report_the_constraint() {
    let mut session = Session::new(users());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let models = UserModels::new().model(
        "User",
        RowSpec::new().generate("email", move |_ctx| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let email = if n % 2 == 0 { "a@example.com" } else { "b@example.com" };
            Ok(GeneratedValue::from(email))
        }),
    );

    let err = session
        .generate("User", Input::count(5), GenerateOptions::default().models(models))
        .await
        .expect_err("only two emails exist");

    let violation = match err {
        GenerationError::UnrepairableConstraint(violation) => violation,
        other => panic!("expected unrepairable constraint, got {other}"),
    };
    assert_eq!(violation.model, "User");
    assert_eq!(violation.constraint, "User_email_key");
    assert_eq!(violation.columns.len(), 1);
    assert_eq!(violation.columns[0].0, "email");
    assert!(matches!(
        violation.columns[0].1.as_str(),
        Some("a@example.com" | "b@example.com")
    ));
    assert!(violation.to_string().contains("email"));
    assert!(calls.load(Ordering::SeqCst) > 5, "generator should be retried");
}

#[tokio::test]
async fn colliding_values_are_regenerated() {
    let mut session = Session::new(users());
    let models = UserModels::new().model(
        "User",
        RowSpec::new().generate("email", |ctx| {
            Ok(GeneratedValue::Text(format!(
                "user{}@example.com",
                seed_u64(ctx.seed) % 8
            )))
        }),
    );

    let outcome = session
        .run("User", Input::count(5), GenerateOptions::default().models(models))
        .await
        .expect("generate users");

    let emails: HashSet<&str> = outcome
        .rows
        .iter()
        .filter_map(|row| row.get("email").and_then(GeneratedValue::as_str))
        .collect();
    assert_eq!(emails.len(), 5);
    assert_eq!(outcome.report.rows_total, 5);
}

#[tokio::test]
async fn connect_reuses_existing_parents() {
    let mut session = Session::new(organizations());
    let orgs = session
        .generate("Organization", Input::count(1), GenerateOptions::default())
        .await
        .expect("generate organization");
    let org_id = orgs[0].get("id").cloned().expect("organization id");

    let outcome = session
        .run(
            "Member",
            Input::count(5),
            GenerateOptions::default().connect(ConnectPolicy::All),
        )
        .await
        .expect("generate members");

    assert_eq!(session.store().rows_of("Organization").len(), 1);
    assert!(outcome.store.rows_of("Organization").is_empty());
    assert!(
        outcome
            .rows
            .iter()
            .all(|member| member.get("organizationId") == Some(&org_id))
    );
    assert_eq!(outcome.report.connects_total, 5);
}

#[tokio::test]
async fn composite_unique_pairs_stay_distinct() {
    let mut session = Session::new(fixtures());
    session
        .generate("Team", Input::count(2), GenerateOptions::default())
        .await
        .expect("generate teams");
    session
        .generate("Game", Input::count(3), GenerateOptions::default())
        .await
        .expect("generate games");

    let connect = || GenerateOptions::default().connect(ConnectPolicy::All);
    session
        .generate("Match", Input::count(3), connect())
        .await
        .expect("first matches");
    session
        .generate("Match", Input::count(3), connect())
        .await
        .expect("remaining matches");

    let pairs: HashSet<(i64, i64)> = session
        .store()
        .rows_of("Match")
        .iter()
        .map(|row| {
            (
                row.get("teamId").and_then(GeneratedValue::as_i64).expect("team id"),
                row.get("gameId").and_then(GeneratedValue::as_i64).expect("game id"),
            )
        })
        .collect();
    assert_eq!(pairs.len(), 6);
    assert_eq!(session.store().rows_of("Team").len(), 2);
    assert_eq!(session.store().rows_of("Game").len(), 3);

    let err = session
        .generate("Match", Input::count(1), connect())
        .await
        .expect_err("every pair is taken");
    assert!(matches!(err, GenerationError::UnrepairableConstraint(_)));
}

#[tokio::test]
async fn explicit_parent_and_connect_overrides() {
    let mut session = Session::new(league());
    let first = session
        .generate(
            "Player",
            Input::one(RowSpec::new().parent("team", RowSpec::new().value("name", "Lions"))),
            GenerateOptions::default(),
        )
        .await
        .expect("player with explicit team");
    let lions = session.store().rows_of("Team")[0].clone();
    assert_eq!(lions.get("name"), Some(&GeneratedValue::from("Lions")));
    assert_eq!(first[0].get("teamId"), lions.get("id"));

    let second = session
        .generate(
            "Player",
            Input::one(RowSpec::new().connect("team", |ctx| {
                ctx.global_store
                    .rows_of(ctx.model)
                    .first()
                    .cloned()
                    .ok_or_else(|| GenerationError::generator("no team to connect"))
            })),
            GenerateOptions::default(),
        )
        .await
        .expect("player connected to existing team");
    assert_eq!(second[0].get("teamId"), lions.get("id"));
    assert_eq!(session.store().rows_of("Team").len(), 1);
}

#[tokio::test]
async fn candidate_tables_supply_parents() {
    let mut session = Session::new(league());
    let mut candidates = std::collections::BTreeMap::new();
    candidates.insert(
        "Team".to_string(),
        vec![seedsmith_generate::Row::new().with("id", 42).with("name", "Remote")],
    );

    let players = session
        .generate(
            "Player",
            Input::count(3),
            GenerateOptions::default().connect(ConnectPolicy::Candidates(candidates)),
        )
        .await
        .expect("generate players");

    assert!(session.store().rows_of("Team").is_empty());
    assert!(
        players
            .iter()
            .all(|player| player.get("teamId") == Some(&GeneratedValue::Int(42)))
    );
}
