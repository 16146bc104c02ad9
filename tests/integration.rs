use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn envsync_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("envsync");
    path
}

const FIXTURE: &str = r#"{
  "games": [
    {
      "id": "g1",
      "date": "2024-03-10T15:00:00Z",
      "homeTeam": { "id": "t1", "name": "Manchester United" },
      "awayTeam": { "id": "t2", "name": "Liverpool" },
      "competition": { "id": "c1", "name": "Premier League" },
      "season": { "id": "s1", "name": "2023/24" },
      "venue": "Old Trafford",
      "homeScore": 2,
      "awayScore": 1
    },
    {
      "id": "g2",
      "date": "2024-04-07T16:30:00Z",
      "homeTeam": { "id": "t2", "name": "Liverpool" },
      "awayTeam": { "id": "t1", "name": "Manchester United" },
      "competition": { "id": "c1", "name": "Premier League" },
      "season": { "id": "s1", "name": "2023/24" }
    },
    {
      "id": "g3",
      "date": "2024-05-01T19:00:00Z",
      "homeTeam": { "id": "t3", "name": "Everton" },
      "awayTeam": { "id": "t9", "name": "Ghost Town" }
    }
  ],
  "teams": [
    { "id": "t1", "name": "Manchester United", "players": [{ "id": "p1" }] },
    { "id": "t2", "name": "Liverpool" },
    { "id": "t3", "name": "Everton" }
  ],
  "players": [{ "id": "p1", "name": "Bruno Fernandes" }],
  "competitions": [{ "id": "c1", "name": "Premier League", "code": "PL" }],
  "seasons": [{ "id": "s1", "name": "2023/24", "isCurrent": true }]
}"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(root.join("production.json"), FIXTURE).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/envsync.sqlite"

[sync]
actor = "integration-test"
default_source = "Production"
default_target = "Local"

[server]
bind = "127.0.0.1:7341"
"#,
        root.display()
    );

    let config_path = config_dir.join("envsync.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_envsync(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = envsync_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run envsync binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn setup_imported() -> (TempDir, PathBuf) {
    let (tmp, config_path) = setup_test_env();
    let fixture = tmp.path().join("production.json");

    let (_, stderr, success) = run_envsync(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    let (stdout, stderr, success) = run_envsync(
        &config_path,
        &["import", "Production", fixture.to_str().unwrap()],
    );
    assert!(success, "import failed: {}", stderr);
    assert!(stdout.contains("Imported 9 record(s) into 'Production'."));

    (tmp, config_path)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_envsync(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully."));
    assert!(tmp.path().join("data/envsync.sqlite").exists());

    // Idempotent.
    let (_, stderr, success) = run_envsync(&config_path, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_import_twice_conflicts() {
    let (tmp, config_path) = setup_imported();
    let fixture = tmp.path().join("production.json");

    let (_, stderr, success) = run_envsync(
        &config_path,
        &["import", "Production", fixture.to_str().unwrap()],
    );
    assert!(!success);
    assert!(stderr.contains("already exist in 'Production'"), "stderr: {}", stderr);
}

#[test]
fn test_preview_counts_without_writing() {
    let (_tmp, config_path) = setup_imported();

    let (stdout, stderr, success) = run_envsync(&config_path, &["preview", "g1", "--json"]);
    assert!(success, "preview failed: {}", stderr);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["mode"], "preview");
    assert_eq!(report["totalCount"], 5);
    assert_eq!(report["perCollectionCounts"]["teams"], 2);
    assert_eq!(report["notFound"], false);

    let (stdout, _, success) = run_envsync(&config_path, &["envs"]);
    assert!(success);
    assert!(!stdout.contains("Local"));
}

#[test]
fn test_commit_copies_closure_with_provenance() {
    let (_tmp, config_path) = setup_imported();

    let (stdout, stderr, success) = run_envsync(&config_path, &["commit", "g1", "--json"]);
    assert!(success, "commit failed: {}", stderr);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["targetEnvironment"], "Local");
    assert_eq!(report["perCollectionCounts"]["games"], 1);
    assert_eq!(report["perCollectionCounts"]["teams"], 2);
    assert_eq!(report["perCollectionCounts"]["competitions"], 1);
    assert_eq!(report["perCollectionCounts"]["seasons"], 1);
    assert_eq!(report["totalCount"], 5);

    let (stdout, stderr, success) =
        run_envsync(&config_path, &["get", "games", "g1", "--env", "Local"]);
    assert!(success, "get failed: {}", stderr);
    let game: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(game["syncInfo"]["sourceEnvironment"], "Production");
    assert_eq!(game["syncInfo"]["syncedBy"], "integration-test");
    assert_eq!(game["syncInfo"]["version"], 1);

    // One hop only: the team's players stay behind.
    let (_, _, success) = run_envsync(&config_path, &["get", "players", "p1", "--env", "Local"]);
    assert!(!success);
}

#[test]
fn test_commit_is_idempotent() {
    let (_tmp, config_path) = setup_imported();

    let (first, _, success) = run_envsync(&config_path, &["commit", "g1", "--json"]);
    assert!(success);
    let (second, _, success) = run_envsync(&config_path, &["commit", "g1", "--json"]);
    assert!(success);

    let first: serde_json::Value = serde_json::from_str(&first).unwrap();
    let second: serde_json::Value = serde_json::from_str(&second).unwrap();
    assert_eq!(first["perCollectionCounts"], second["perCollectionCounts"]);

    let (stdout, _, success) = run_envsync(&config_path, &["envs"]);
    assert!(success);
    let local = stdout.split("Local").nth(1).unwrap();
    assert!(local.contains("teams          2"), "envs output: {}", stdout);
}

#[test]
fn test_dangling_reference_listed_as_missing() {
    let (_tmp, config_path) = setup_imported();

    let (stdout, stderr, success) = run_envsync(&config_path, &["commit", "g3", "--json"]);
    assert!(success, "commit failed: {}", stderr);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["perCollectionCounts"]["teams"], 1);
    assert_eq!(report["missing"][0]["id"], "t9");
    assert_eq!(report["failed"], serde_json::json!([]));
}

#[test]
fn test_missing_root_reports_not_found() {
    let (_tmp, config_path) = setup_imported();

    let (stdout, stderr, success) = run_envsync(&config_path, &["commit", "nope"]);
    assert!(success, "commit failed: {}", stderr);
    assert!(stdout.contains("game 'nope' not found in environment 'Production'."));

    let (stdout, _, _) = run_envsync(&config_path, &["envs"]);
    assert!(!stdout.contains("Local"));
}

#[test]
fn test_same_environment_rejected() {
    let (_tmp, config_path) = setup_imported();

    let (_, stderr, success) = run_envsync(
        &config_path,
        &["commit", "g1", "--source", "Production", "--target", "Production"],
    );
    assert!(!success);
    assert!(stderr.contains("both 'Production'"), "stderr: {}", stderr);
}

#[test]
fn test_find_games_newest_first() {
    let (_tmp, config_path) = setup_imported();

    let (stdout, stderr, success) = run_envsync(&config_path, &["find-games", "MANCHESTER"]);
    assert!(success, "find-games failed: {}", stderr);
    assert!(stdout.starts_with("2 game(s) involving 'MANCHESTER'"));
    let g2 = stdout.find("g2").unwrap();
    let g1 = stdout.find("g1").unwrap();
    assert!(g2 < g1, "expected newest first: {}", stdout);

    let (stdout, _, success) = run_envsync(
        &config_path,
        &["find-games", "liverpool", "--start", "2024-04-01", "--end", "garbage"],
    );
    assert!(success);
    assert!(stdout.contains("g2"));
    assert!(!stdout.contains("g1"));
}

#[test]
fn test_clear_environment() {
    let (_tmp, config_path) = setup_imported();
    run_envsync(&config_path, &["commit", "g1"]);

    let (stdout, _, success) = run_envsync(&config_path, &["clear", "Local"]);
    assert!(success);
    assert!(stdout.contains("Cleared environment 'Local'."));

    let (stdout, _, _) = run_envsync(&config_path, &["envs"]);
    assert!(stdout.contains("Production"));
    assert!(!stdout.contains("Local"));
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(
        &config_path,
        "[db]\npath = \"x.sqlite\"\n[sync]\ndefault_source = \"A\"\ndefault_target = \"A\"\n",
    )
    .unwrap();

    let (_, stderr, success) = run_envsync(&config_path, &["envs"]);
    assert!(!success);
    assert!(stderr.contains("must differ"));
}
