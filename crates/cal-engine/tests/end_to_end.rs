//! End-to-end calibration runs against stub simulator and evaluator scripts.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::TempDir;

use cal_engine::Engine;
use cal_types::{CalError, Calibration};

fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Simulator: copy the first input to the output slot. Evaluator: absolute
/// difference between the simulated value and the reference value.
fn write_fixture(dir: &TempDir, config: serde_json::Value) -> PathBuf {
    let config_path = dir.path().join("config.json");
    fs::write(&config_path, config.to_string()).unwrap();
    config_path
}

fn fixture_config(dir: &TempDir, algorithm: serde_json::Value) -> serde_json::Value {
    let simulator = write_script(dir, "sim.sh", "cat \"$1\" > \"$5\"");
    let evaluator = write_script(
        dir,
        "eval.sh",
        "awk -v t=\"$(cat \"$2\")\" 'NR==1{d=$1-t; if (d<0) d=-d; print d; exit}' \"$1\" > \"$3\"",
    );
    let template = dir.path().join("model.in");
    fs::write(&template, "@value1@\n").unwrap();
    let data = dir.path().join("reference.dat");
    fs::write(&data, "5.0\n").unwrap();

    let mut config = serde_json::json!({
        "simulator": simulator,
        "evaluator": evaluator,
        "experiments": [{ "data": data, "templates": [template] }],
        "variables": [{
            "name": "k", "minimum": 0.0, "maximum": 10.0,
            "format": "%.6f", "sweeps": 3
        }]
    });
    if let serde_json::Value::Object(ref mut map) = config {
        if let serde_json::Value::Object(extra) = algorithm {
            map.extend(extra);
        }
    }
    config
}

#[test]
fn sweep_finds_the_reference_value() {
    let dir = TempDir::new().unwrap();
    let config = fixture_config(&dir, serde_json::json!({ "algorithm": "sweep", "bests": 3 }));
    let calibration = Calibration::from_path(write_fixture(&dir, config)).unwrap();

    let report = Engine::new(&calibration, 1).run().unwrap().unwrap();
    assert_eq!(report.nsimulations, 3);

    // Levels are 0, 5, 10 against a reference of 5: errors 5, 0, 5.
    let best = report.best().unwrap();
    assert_eq!(best.candidate, 1);
    assert_eq!(best.value, 0.0);
    assert_eq!(best.parameters, vec![5.0]);

    let values: Vec<f64> = report.bests.iter().map(|b| b.value).collect();
    assert_eq!(values, vec![0.0, 5.0, 5.0]);
}

#[test]
fn thread_count_does_not_change_the_result() {
    let dir = TempDir::new().unwrap();
    let config = fixture_config(&dir, serde_json::json!({ "algorithm": "sweep" }));
    let calibration = Calibration::from_path(write_fixture(&dir, config)).unwrap();

    let single = Engine::new(&calibration, 1).run().unwrap().unwrap();
    let pooled = Engine::new(&calibration, 4).run().unwrap().unwrap();

    assert_eq!(single.best(), pooled.best());
}

#[test]
fn monte_carlo_is_reproducible_across_runs_and_thread_counts() {
    let dir = TempDir::new().unwrap();
    let config = fixture_config(&dir, serde_json::json!({ "simulations": 12, "bests": 2 }));
    let calibration = Calibration::from_path(write_fixture(&dir, config)).unwrap();

    let first = Engine::new(&calibration, 2).run().unwrap().unwrap();
    let second = Engine::new(&calibration, 2).run().unwrap().unwrap();
    let wider = Engine::new(&calibration, 3).run().unwrap().unwrap();

    assert_eq!(first.bests, second.bests);
    assert_eq!(first.bests, wider.bests);
}

#[test]
fn genetic_mode_is_an_explicit_gap() {
    let dir = TempDir::new().unwrap();
    let config = fixture_config(&dir, serde_json::json!({ "algorithm": "genetic" }));
    let calibration = Calibration::from_path(write_fixture(&dir, config)).unwrap();

    match Engine::new(&calibration, 1).run() {
        Err(CalError::Unsupported(message)) => assert!(message.contains("genetic")),
        other => panic!("expected Unsupported, got {other:?}"),
    }
}

#[test]
fn failing_evaluator_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let mut config = fixture_config(&dir, serde_json::json!({ "algorithm": "sweep" }));
    let broken = write_script(&dir, "broken-eval.sh", "exit 9");
    config["evaluator"] = serde_json::json!(broken);
    let calibration = Calibration::from_path(write_fixture(&dir, config)).unwrap();

    assert!(matches!(
        Engine::new(&calibration, 2).run(),
        Err(CalError::Simulation(_))
    ));
}
