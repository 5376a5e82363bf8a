// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// END-TO-END PIPELINE TESTS
//
// Full runs (history → resolve → thin → infer → filters → export) against an
// in-memory index, checking the documents left on disk.
// Run: cargo test --test pipeline_e2e
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use ballot_core::filters::RemovalReason;
use ballot_core::{
    load_wallets, BallotError, EnrichedRecommendations, HistoryStore, MemoryIndex, Pipeline,
    PipelineConfig, PipelineContext, ProposalState, RecommendationMap, VoteChoice,
    VotingHistory, Wallet,
};
use ballot_integration_tests::{cast, closed, config_in, proposal, voted};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::fs;
use tempfile::TempDir;

const A: &str = "0xaaaa";
const B: &str = "0xbbbb";

fn wallets(ws: &[&str]) -> BTreeSet<Wallet> {
    ws.iter().map(|w| w.to_string()).collect()
}

fn run(index: &MemoryIndex, config: PipelineConfig, ws: &BTreeSet<Wallet>) -> ballot_core::Result<ballot_core::PipelineOutcome> {
    let pipeline = Pipeline::new(index, PipelineContext::new(config)?);
    pipeline.run(ws, &mut StdRng::seed_from_u64(2024))
}

/// A and B follow X; X has one active proposal P1 with 60 sampled votes,
/// 40 of them for choice 1; B is one of the voters.
fn scenario() -> MemoryIndex {
    let mut index = MemoryIndex::new();
    index
        .follow(A, "x.eth")
        .follow(B, "x.eth")
        .add_proposal(proposal("P1", "x.eth", "Fund the treasury", ProposalState::Active, 100));
    cast(&mut index, "P1", 1, 40, "1");
    cast(&mut index, "P1", 2, 19, "2");
    voted(&mut index, "P1", B, VoteChoice::Single(2));
    index
}

#[test]
fn test_end_to_end_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(temp_dir.path());
    let index = scenario();

    let outcome = run(&index, config.clone(), &wallets(&[A, B])).unwrap();

    let recs = outcome.recommendations();
    assert_eq!(recs[A], vec!["P1".to_string()]);
    assert!(recs[B].is_empty());
    assert_eq!(outcome.enriched[A]["P1"].pop_choice, Some(1));
    assert_eq!(outcome.enriched[A]["P1"].vote_count, 60);

    // history bootstrapped with B's prior vote
    let history: VotingHistory =
        serde_json::from_str(&fs::read_to_string(&config.history_path).unwrap()).unwrap();
    assert!(history.has_voted(B, "P1"));
    assert_eq!(history.voted(A).map(BTreeSet::len), Some(0));

    // documents
    let exported: RecommendationMap =
        serde_json::from_str(&fs::read_to_string(&config.export_json_path).unwrap()).unwrap();
    assert_eq!(exported, recs);

    let choices: EnrichedRecommendations =
        serde_json::from_str(&fs::read_to_string(&config.choices_json_path).unwrap()).unwrap();
    assert_eq!(choices[A]["P1"].pop_choice, Some(1));
    assert!(choices[B].is_empty());

    let csv = fs::read_to_string(&config.export_csv_path).unwrap();
    assert_eq!(csv, format!("wallet,spaces\n{},x.eth DAO\n{},\n", A, B));
}

#[test]
fn test_second_run_is_byte_identical() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(temp_dir.path());
    let index = scenario();
    let ws = wallets(&[A, B]);

    run(&index, config.clone(), &ws).unwrap();
    let first = fs::read_to_string(&config.export_json_path).unwrap();
    let first_choices = fs::read_to_string(&config.choices_json_path).unwrap();

    run(&index, config.clone(), &ws).unwrap();
    assert_eq!(fs::read_to_string(&config.export_json_path).unwrap(), first);
    assert_eq!(fs::read_to_string(&config.choices_json_path).unwrap(), first_choices);
}

#[test]
fn test_empty_wallet_set_produces_empty_documents() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(temp_dir.path());
    let index = scenario();

    let outcome = run(&index, config.clone(), &BTreeSet::new()).unwrap();
    assert!(outcome.enriched.is_empty());
    assert_eq!(fs::read_to_string(&config.export_json_path).unwrap(), "{}\n");
    assert_eq!(fs::read_to_string(&config.choices_json_path).unwrap(), "{}\n");
    assert_eq!(fs::read_to_string(&config.export_csv_path).unwrap(), "wallet,spaces\n");
}

#[test]
fn test_wallet_without_follows_gets_empty_row() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(temp_dir.path());
    let index = scenario();

    let outcome = run(&index, config.clone(), &wallets(&["0xlonely"])).unwrap();
    assert_eq!(outcome.recommendations()["0xlonely"], Vec::<String>::new());
    assert_eq!(
        fs::read_to_string(&config.export_csv_path).unwrap(),
        "wallet,spaces\n0xlonely,\n"
    );
}

#[test]
fn test_engagement_filter_against_closed_baseline() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(temp_dir.path());

    let mut index = MemoryIndex::new();
    index
        .follow(A, "y.eth")
        .add_proposal(closed("C1", "y.eth", 100, 10))
        .add_proposal(closed("C2", "y.eth", 100, 20))
        .add_proposal(closed("C0", "y.eth", 5_000, 1))
        .add_proposal(proposal("P2", "y.eth", "Quiet proposal", ProposalState::Active, 30))
        .add_proposal(proposal("P3", "y.eth", "Busy proposal", ProposalState::Active, 40));
    cast(&mut index, "P2", 1, 10, "a");
    cast(&mut index, "P3", 1, 40, "b");

    let outcome = run(&index, config, &wallets(&[A])).unwrap();

    assert_eq!(outcome.recommendations()[A], vec!["P3".to_string()]);
    match &outcome.engagement_removed["P2"].reason {
        RemovalReason::LowEngagement {
            vote_count,
            baseline,
        } => {
            assert_eq!(*vote_count, 10);
            assert_eq!(*baseline, 100.0);
        }
        other => panic!("unexpected reason {:?}", other),
    }
}

#[test]
fn test_keyword_filter_case_modes() {
    let temp_dir = TempDir::new().unwrap();
    let mut index = MemoryIndex::new();
    index
        .follow(A, "x.eth")
        .follow(B, "x.eth")
        .add_proposal(proposal(
            "P9",
            "x.eth",
            "Bot Check: please don't vote",
            ProposalState::Active,
            100,
        ));
    let ws = wallets(&[A, B]);

    // default triggers are matched case-sensitively
    let outcome = run(&index, config_in(temp_dir.path()), &ws).unwrap();
    assert!(outcome.keyword_removed.is_empty());
    assert_eq!(outcome.recommendations()[A], vec!["P9".to_string()]);

    let mut config = config_in(temp_dir.path());
    config.keyword_case_sensitive = false;
    let outcome = run(&index, config, &ws).unwrap();
    assert_eq!(
        outcome.keyword_removed["P9"].reason,
        RemovalReason::Keyword {
            trigger: "bot".to_string()
        }
    );
    assert!(outcome.recommendations()[A].is_empty());
    assert!(outcome.recommendations()[B].is_empty());
}

#[test]
fn test_failed_filter_leaves_previous_documents_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(temp_dir.path());
    fs::write(&config.export_json_path, "{\"previous\": []}\n").unwrap();

    // closed proposal without a vote total makes the baseline malformed
    let mut index = MemoryIndex::new();
    index
        .follow(A, "z.eth")
        .add_proposal(proposal("C1", "z.eth", "Old", ProposalState::Closed, 1))
        .add_proposal(proposal("P1", "z.eth", "New", ProposalState::Active, 2));

    let err = run(&index, config.clone(), &wallets(&[A])).unwrap_err();
    assert!(matches!(err, BallotError::MalformedResponse(_)));
    assert_eq!(
        fs::read_to_string(&config.export_json_path).unwrap(),
        "{\"previous\": []}\n"
    );
    assert!(!config.choices_json_path.exists());
    assert!(!config.export_csv_path.exists());
}

#[test]
fn test_corrupt_history_aborts_run_and_is_kept() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(temp_dir.path());
    let truncated = format!("{{\"{}\": [\"old-closed-proposal\"]", A);
    fs::write(&config.history_path, &truncated).unwrap();
    let index = scenario();

    let err = run(&index, config.clone(), &wallets(&[A, B])).unwrap_err();
    assert!(matches!(err, BallotError::Json(_)));
    assert_eq!(fs::read_to_string(&config.history_path).unwrap(), truncated);
    assert!(!config.export_json_path.exists());
}

#[test]
fn test_new_wallet_is_added_to_existing_history() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(temp_dir.path());
    let index = scenario();

    run(&index, config.clone(), &wallets(&[A])).unwrap();
    let store = HistoryStore::new(&config.history_path, 3);
    assert_eq!(store.read().unwrap().len(), 1);

    let outcome = run(&index, config.clone(), &wallets(&[A, B])).unwrap();
    let history = store.read().unwrap();
    assert_eq!(history.len(), 2);
    // added with an empty set, not queried
    assert_eq!(history.voted(B).map(BTreeSet::len), Some(0));
    assert_eq!(outcome.recommendations()[B], vec!["P1".to_string()]);
}

#[test]
fn test_ignore_list_and_wallet_file() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = config_in(temp_dir.path());
    config.ignore_list = vec!["P1".to_string()];
    fs::write(
        &config.wallet_path,
        format!("# fleet\n{}\n\n  {}  \n{}\n", A, B, A),
    )
    .unwrap();

    let ws = load_wallets(&config.wallet_path).unwrap();
    assert_eq!(ws, wallets(&[A, B]));

    let outcome = run(&scenario(), config, &ws).unwrap();
    assert!(outcome.recommendations().values().all(Vec::is_empty));
}

#[test]
fn test_thinning_drops_one_per_wallet_when_certain() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = config_in(temp_dir.path());
    config.thinning_probability = 1.0;

    let mut index = MemoryIndex::new();
    index
        .follow(A, "x.eth")
        .add_proposal(proposal("P1", "x.eth", "First", ProposalState::Active, 1))
        .add_proposal(proposal("P2", "x.eth", "Second", ProposalState::Active, 2));

    let outcome = run(&index, config, &wallets(&[A])).unwrap();
    assert_eq!(outcome.recommendations()[A].len(), 1);
    assert_eq!(outcome.thinned[A].len(), 1);
    assert_ne!(outcome.thinned[A][0], outcome.recommendations()[A][0]);
}
