use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Command;

fn temp_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "prima-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

fn dataset() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../prima-core/tests/fixtures/dataset")
}

fn run_batch(results: &Path, extra: &[&str]) -> std::process::Output {
    let exe = env!("CARGO_BIN_EXE_prima-runner");
    Command::new(exe)
        .arg("--dataset")
        .arg(dataset())
        .arg("--results")
        .arg(results)
        .args(extra)
        .output()
        .expect("run cli")
}

fn digest(path: &Path) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(std::fs::read(path).expect("read report"));
    let digest = hasher.finalize();
    let mut bytes = [0_u8; 32];
    bytes.copy_from_slice(&digest);
    bytes
}

#[test]
fn cli_list_configs_writes_output() {
    let exe = env!("CARGO_BIN_EXE_prima-runner");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-configs", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Available configurations"));
    assert!(content.contains("CheapInsert"));
}

#[test]
fn cli_writes_one_report_per_selected_configuration() {
    let results = temp_path("e2e");
    let output = run_batch(&results, &["--configs", "Random,CheapInsert", "--threads", "2"]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Prima Experiment Runner"));
    assert!(stdout.contains("Done, computed 4 simulations in"));

    let mut names: Vec<String> = std::fs::read_dir(&results)
        .expect("results dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["CheapInsert.csv", "Random.csv"]);
    for name in &names {
        let text = std::fs::read_to_string(results.join(name)).expect("read report");
        assert_eq!(text.lines().count(), 3, "{name}");
    }
}

#[test]
fn cli_reports_do_not_depend_on_thread_count() {
    let one = temp_path("threads-1");
    let four = temp_path("threads-4");
    for (dir, threads) in [(&one, "1"), (&four, "4")] {
        let output = run_batch(dir, &["--threads", threads, "--repeat", "2", "--quiet"]);
        assert!(output.status.success());
    }
    for name in ["CheapInsert.csv", "Random.csv", "Auction-R-opt2cih-B-cih.csv"] {
        assert_eq!(digest(&one.join(name)), digest(&four.join(name)), "{name}");
    }
}

#[test]
fn cli_seed_changes_random_seeds_in_reports() {
    let a = temp_path("seed-a");
    let b = temp_path("seed-b");
    assert!(run_batch(&a, &["--configs", "Random", "--seed", "1", "--quiet"]).status.success());
    assert!(run_batch(&b, &["--configs", "Random", "--seed", "2", "--quiet"]).status.success());
    assert_ne!(digest(&a.join("Random.csv")), digest(&b.join("Random.csv")));
}

#[test]
fn cli_json_summary() {
    let results = temp_path("json");
    let summary = temp_path("json-summary");
    let output = run_batch(
        &results,
        &[
            "--configs",
            "CheapInsert",
            "--report",
            "json",
            "--quiet",
            "--output",
            summary.to_str().expect("utf-8 temp path"),
        ],
    );
    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(summary).expect("read summary"))
            .expect("valid json");
    assert_eq!(value["simulations"], 2);
    assert_eq!(value["failed"], 0);
}

#[test]
fn cli_fails_on_missing_dataset_and_unknown_config() {
    let exe = env!("CARGO_BIN_EXE_prima-runner");
    let missing = Command::new(exe)
        .arg("--dataset")
        .arg(temp_path("no-such-dir"))
        .arg("--quiet")
        .output()
        .expect("run cli");
    assert!(!missing.status.success());
    assert!(String::from_utf8_lossy(&missing.stderr).contains("does not exist"));

    let unknown = run_batch(&temp_path("unknown"), &["--configs", "Nope"]);
    assert!(!unknown.status.success());
    assert!(String::from_utf8_lossy(&unknown.stderr).contains("Nope"));

    let zero = run_batch(&temp_path("zero"), &["--repeat", "0", "--quiet"]);
    assert!(!zero.status.success());
}
