//! Integration tests for session files and the bdm-payoff CLI
//!
//! These tests load `tests/fixtures/session.toml`, run the engine through the
//! public API, and drive the binary end to end.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use bdm_payoff::elicitation::{EngineError, MechanismRng, PaymentMethod, PoolSlot, Stage};
use bdm_payoff::SessionFile;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("session.toml")
}

fn fixture() -> SessionFile {
    SessionFile::load(fixture_path()).expect("fixture session should load")
}

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_bdm-payoff"))
}

// =============================================================================
// LIBRARY
// =============================================================================

#[test]
fn test_fixture_active_rounds() {
    let session = fixture();
    let stage2 = session.start_session(MechanismRng::new(1)).unwrap();
    assert_eq!(stage2.state().active_rounds(), &[1, 2, 4, 6]);
    assert_eq!(stage2.state().stage1_round_count(), 3);
    assert_eq!(stage2.next_round(), None);
}

#[test]
fn test_fixture_resolves_consistently_across_seeds() {
    let session = fixture();
    for seed in 0..500 {
        let mut stage2 = session.start_session(MechanismRng::new(seed)).unwrap();
        let outcome = stage2.finalize().unwrap().clone();
        let state = stage2.state();

        let paying = state.paying_round_stage2().unwrap();
        let price = state.comparison_price().unwrap();
        let ce = stage2.log().ce_for(paying).unwrap();
        let expected_method = if price < ce {
            PaymentMethod::Lottery
        } else {
            PaymentMethod::SureAmount
        };
        assert_eq!(outcome.resolved.method, expected_method);
        assert_eq!(outcome.resolved.paying_round, Some(paying));

        match outcome.pool_slot {
            PoolSlot::Stage1 { .. } => {
                assert_eq!(outcome.pool_slot.stage(), Stage::One);
                assert_eq!(outcome.final_payment.stage, Stage::One);
                assert_eq!(outcome.final_payment.round, 2);
                assert_eq!(outcome.final_payment.today, 15.0);
                assert_eq!(outcome.final_payment.one_month, 25.0);
            }
            PoolSlot::Stage2 { round, .. } => {
                assert_eq!(outcome.pool_slot.stage(), Stage::Two);
                assert!(state.is_active(round));
                assert_eq!(outcome.final_payment.stage, Stage::Two);
                assert_eq!(outcome.final_payment.round, paying);
                assert_eq!(outcome.final_payment.today, outcome.resolved.payoff_today + 5.0);
                assert_eq!(
                    outcome.final_payment.one_month,
                    outcome.resolved.payoff_one_month + 5.0
                );
            }
        }
    }
}

#[test]
fn test_out_of_range_response_is_recoverable_error() {
    let mut session = fixture();
    session.stage2.responses[1].ce = 55.0;
    let err = session.start_session(MechanismRng::new(1)).unwrap_err();
    assert!(err.is_recoverable());
    assert!(err.to_string().contains("Please enter a value between 30 and 50."));
}

#[test]
fn test_missing_stage1_result_is_fatal() {
    let mut session = fixture();
    session.stage1.result = None;
    let err = session.start_session(MechanismRng::new(1)).unwrap_err();
    assert_eq!(err, EngineError::MissingStage1Result);
    assert!(!err.is_recoverable());
}

#[test]
fn test_stage1_paying_round_outside_catalog_is_fatal() {
    let mut session = fixture();
    if let Some(result) = session.stage1.result.as_mut() {
        result.paying_round = 99;
    }
    let err = session.start_session(MechanismRng::new(1)).unwrap_err();
    assert_eq!(
        err,
        EngineError::RoundOutOfRange {
            stage: Stage::One,
            index: 99,
            len: 3
        }
    );
}

#[test]
fn test_demo_length_truncates_stage2() {
    let mut session = fixture();
    session.engine.stage2_length = Some(2);
    session.stage2.responses.truncate(2);
    let mut stage2 = session.start_session(MechanismRng::new(3)).unwrap();
    assert_eq!(stage2.state().active_rounds(), &[1, 2]);
    assert!(stage2.state().final_paying_round() <= 5);
    stage2.finalize().unwrap();
}

// =============================================================================
// CLI
// =============================================================================

#[test]
fn test_cli_check_accepts_fixture() {
    let output = cli()
        .args(["check", "--session"])
        .arg(fixture_path())
        .output()
        .expect("failed to run bdm-payoff");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("4 active [1, 2, 4, 6]"));
    assert!(stdout.trim_end().ends_with("ok"));
}

#[test]
fn test_cli_check_flags_bad_response() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    let mut session = fixture();
    session.stage2.responses[0].ce = 99.0;
    session.save(&path).unwrap();

    let output = cli().args(["check", "--session"]).arg(&path).output().unwrap();
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Please enter a value between 20 and 40."));
}

#[test]
fn test_cli_resolve_writes_replayable_report() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");

    for out in [&first, &second] {
        let status = cli()
            .args(["resolve", "--session"])
            .arg(fixture_path())
            .arg("--output")
            .arg(out)
            .status()
            .unwrap();
        assert!(status.success());
    }

    let a: serde_json::Value = serde_json::from_str(&fs::read_to_string(&first).unwrap()).unwrap();
    let b: serde_json::Value = serde_json::from_str(&fs::read_to_string(&second).unwrap()).unwrap();
    assert_eq!(a, b, "seeded runs must replay identically");
    assert_eq!(a["seed"], 20240611);
    let stage = a["outcome"]["final_payment"]["stage"].as_str().unwrap();
    assert!(stage == "one" || stage == "two");
}

#[test]
fn test_cli_check_flags_stage1_paying_round() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stage1.toml");
    let mut session = fixture();
    if let Some(result) = session.stage1.result.as_mut() {
        result.paying_round = 4;
    }
    session.save(&path).unwrap();

    let output = cli().args(["check", "--session"]).arg(&path).output().unwrap();
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("stage 1: paying round 4 outside 3 rounds"));
}

#[test]
fn test_cli_reads_session_path_from_env() {
    let output = cli()
        .arg("check")
        .env("BDM_SESSION_PATH", fixture_path())
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("4 active [1, 2, 4, 6]"));
}

fn simulate(session: &std::path::Path, extra: &[&str]) -> std::process::Output {
    cli()
        .args(["simulate", "--session"])
        .arg(session)
        .args(extra)
        .output()
        .expect("failed to run bdm-payoff")
}

#[test]
fn test_cli_simulate_rejects_zero_participants() {
    let output = simulate(&fixture_path(), &["--participants", "0"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--participants must be positive"));
}

#[test]
fn test_cli_simulate_same_seed_same_summary() {
    let args = ["--participants", "300", "--seed", "7"];
    let first = simulate(&fixture_path(), &args);
    let second = simulate(&fixture_path(), &args);
    assert!(first.status.success(), "stderr: {}", String::from_utf8_lossy(&first.stderr));
    assert!(second.status.success());
    assert_eq!(first.stdout, second.stdout);

    let stdout = String::from_utf8_lossy(&first.stdout);
    assert!(stdout.contains("participants:      300"));
    assert!(stdout.contains("base seed:         7"));
}

#[test]
fn test_cli_simulate_without_active_rounds_never_pays_stage2() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("degenerate.toml");
    let mut session = fixture();
    for round in session.stage2.rounds.iter_mut() {
        round.outcome_b = round.outcome_a;
    }
    session.stage2.responses.clear();
    session.save(&path).unwrap();

    let output = simulate(&path, &["--participants", "200", "--seed", "3"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("stage 2 governs:   0.0%"), "{}", stdout);
}

#[test]
fn test_cli_check_reports_duplicates_in_round_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dupes.toml");
    let mut session = fixture();
    let mut repeated = session.stage2.responses.clone();
    repeated.reverse();
    session.stage2.responses.extend(repeated);
    session.save(&path).unwrap();

    let output = cli().args(["check", "--session"]).arg(&path).output().unwrap();
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let dupes: Vec<&str> = stdout.lines().filter(|l| l.contains("answered 2 times")).collect();
    assert_eq!(
        dupes,
        vec![
            "  round 1: answered 2 times",
            "  round 2: answered 2 times",
            "  round 4: answered 2 times",
            "  round 6: answered 2 times",
        ]
    );
}
