mod support;

use predicates::str::contains;
use support::{data_id, tl_bin, TestResult, TestStore};
use tempfile::TempDir;

#[test]
fn tl_help_works() {
    tl_bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("append-only task graph"));
}

#[test]
fn tl_version_works() {
    tl_bin()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains("tl"));
}

#[test]
fn init_creates_store_and_refuses_twice() -> TestResult {
    let temp = TempDir::new()?;

    tl_bin()
        .current_dir(temp.path())
        .env_remove("TL_DIR")
        .arg("init")
        .assert()
        .success()
        .stdout(contains(".tl"));
    assert!(temp.path().join(".tl/events.jsonl").is_file());
    assert!(temp.path().join(".tl/lock").is_file());

    tl_bin()
        .current_dir(temp.path())
        .env_remove("TL_DIR")
        .arg("init")
        .assert()
        .code(2)
        .stderr(contains("already"));
    Ok(())
}

#[test]
fn commands_outside_a_store_fail_with_user_error() -> TestResult {
    let temp = TempDir::new()?;
    tl_bin()
        .current_dir(temp.path())
        .env_remove("TL_DIR")
        .arg("ready")
        .assert()
        .code(2)
        .stderr(contains("tl init"));
    Ok(())
}

#[test]
fn create_ready_claim_close_flow() -> TestResult {
    let project = TestStore::new()?;

    let created = project.tl_json(&["create", "Write the parser", "-p", "1"])?;
    assert_eq!(created["schema_version"], "tl.v1");
    assert_eq!(created["status"], "success");
    assert_eq!(created["data"]["status"], "open");
    assert_eq!(created["data"]["priority"], 1);
    assert_eq!(created["data"]["created_by"], "tester");
    let id = data_id(&created);
    assert!(id.starts_with("tl-"));

    let ready = project.tl_json(&["ready"])?;
    assert_eq!(ready["data"][0]["id"], id.as_str());

    let claimed = project.tl_json(&["claim", id.as_str(), "--agent", "agent-7"])?;
    assert_eq!(claimed["data"]["status"], "in_progress");
    assert_eq!(claimed["data"]["assignee"], "agent-7");

    let ready = project.tl_json(&["ready"])?;
    assert_eq!(ready["data"].as_array().map(Vec::len), Some(0));

    let closed = project.tl_json(&["close", id.as_str(), "--reason", "done"])?;
    assert_eq!(closed["data"]["status"], "closed");
    assert_eq!(closed["data"]["close_reason"], "done");
    assert!(closed["data"]["closed_at"].is_string());

    let lines = project.event_lines()?;
    let kinds: Vec<String> = lines
        .iter()
        .map(|line| -> TestResult<String> {
            let value: serde_json::Value = serde_json::from_str(line)?;
            Ok(value["type"].as_str().unwrap_or_default().to_string())
        })
        .collect::<TestResult<_>>()?;
    assert_eq!(kinds, vec!["create", "claim", "close"]);
    Ok(())
}

#[test]
fn dependencies_gate_the_ready_queue() -> TestResult {
    let project = TestStore::new()?;
    let schema = data_id(&project.tl_json(&["create", "Schema"])?);
    let api = data_id(&project.tl_json(&["create", "API"])?);

    project
        .tl()
        .args(["dep", "add", api.as_str(), schema.as_str()])
        .assert()
        .success();

    let ready = project.tl_json(&["ready"])?;
    let ids: Vec<&str> = ready["data"]
        .as_array()
        .map(|items| items.iter().filter_map(|item| item["id"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(ids, vec![schema.as_str()]);

    let blocked = project.tl_json(&["blocked"])?;
    assert_eq!(blocked["data"][0]["id"], api.as_str());
    assert_eq!(blocked["data"][0]["blocked_by"][0], schema.as_str());

    project.tl().args(["close", schema.as_str()]).assert().success();
    let ready = project.tl_json(&["ready"])?;
    assert_eq!(ready["data"][0]["id"], api.as_str());
    Ok(())
}

#[test]
fn cycle_is_rejected_with_exit_three() -> TestResult {
    let project = TestStore::new()?;
    let a = data_id(&project.tl_json(&["create", "A"])?);
    let b = data_id(&project.tl_json(&["create", "B"])?);

    project.tl().args(["dep", "add", a.as_str(), b.as_str()]).assert().success();
    let before = project.event_lines()?.len();

    let rejected = project
        .tl()
        .args(["--json", "dep", "add", b.as_str(), a.as_str()])
        .assert()
        .code(3);
    let envelope: serde_json::Value = serde_json::from_slice(&rejected.get_output().stdout)?;
    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["error"]["kind"], "cycle");
    assert_eq!(envelope["error"]["code"], 3);

    project.tl().args(["dep", "add", a.as_str(), a.as_str()]).assert().code(3);
    assert_eq!(project.event_lines()?.len(), before);
    Ok(())
}

#[test]
fn claim_of_claimed_issue_is_rejected() -> TestResult {
    let project = TestStore::new()?;
    let id = data_id(&project.tl_json(&["create", "Contended"])?);

    project.tl().args(["claim", id.as_str()]).assert().success();
    project
        .tl()
        .args(["claim", id.as_str(), "--agent", "other"])
        .assert()
        .code(3)
        .stderr(contains("in_progress"));
    Ok(())
}

#[test]
fn actor_comes_from_environment() -> TestResult {
    let project = TestStore::new()?;
    let output = project
        .tl()
        .env("TL_ACTOR", "robot-1")
        .args(["--json", "create", "Env actor"])
        .output()?;
    let envelope: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(envelope["data"]["created_by"], "robot-1");

    let line = project.event_lines()?.pop().unwrap_or_default();
    let event: serde_json::Value = serde_json::from_str(&line)?;
    assert_eq!(event["actor"], "robot-1");
    Ok(())
}

#[test]
fn update_show_and_list_filters() -> TestResult {
    let project = TestStore::new()?;
    let id = data_id(&project.tl_json(&["create", "Tune cache", "-t", "bug"])?);
    project.tl_json(&["create", "Unrelated"])?;

    let updated = project.tl_json(&[
        "update", id.as_str(), "--title", "Tune LRU cache", "-l", "perf", "--set", "estimate=3",
    ])?;
    assert_eq!(updated["data"]["title"], "Tune LRU cache");
    assert_eq!(updated["data"]["labels"][0], "perf");
    assert_eq!(updated["data"]["metadata"]["estimate"], 3);

    let shown = project.tl_json(&["show", id.as_str()])?;
    assert_eq!(shown["data"]["issue_type"], "bug");
    assert_eq!(shown["data"]["blocked"], false);

    let listed = project.tl_json(&["list", "--label", "perf"])?;
    assert_eq!(listed["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(listed["data"][0]["id"], id.as_str());

    let missing = project.tl().args(["show", "tl-nothere"]).assert().code(2);
    assert!(!missing.get_output().stderr.is_empty());
    Ok(())
}

#[test]
fn stats_counts_statuses() -> TestResult {
    let project = TestStore::new()?;
    let a = data_id(&project.tl_json(&["create", "A"])?);
    project.tl_json(&["create", "B"])?;
    project.tl().args(["close", a.as_str()]).assert().success();

    let stats = project.tl_json(&["stats"])?;
    assert_eq!(stats["data"]["total"], 2);
    assert_eq!(stats["data"]["open"], 1);
    assert_eq!(stats["data"]["closed"], 1);
    Ok(())
}

#[test]
fn export_then_import_into_fresh_store() -> TestResult {
    let source = TestStore::new()?;
    let a = data_id(&source.tl_json(&["create", "Exported A"])?);
    let b = data_id(&source.tl_json(&["create", "Exported B"])?);
    source.tl().args(["dep", "add", b.as_str(), a.as_str()]).assert().success();

    let file = source.root().join("issues.jsonl");
    let file_arg = file.to_string_lossy().to_string();
    let exported = source.tl_json(&["export", "--to", file_arg.as_str()])?;
    assert_eq!(exported["data"]["exported"], 2);

    let target = TestStore::new()?;
    let imported = target.tl_json(&["import", "--from", file_arg.as_str()])?;
    assert_eq!(imported["data"]["imported"], 2);
    assert_eq!(imported["data"]["dependencies"], 1);

    let again = target.tl_json(&["import", "--from", file_arg.as_str()])?;
    assert_eq!(again["data"]["imported"], 0);
    assert_eq!(again["data"]["skipped"], 2);

    let graph = target.load()?;
    assert!(graph.has_edge(&b, &a));
    Ok(())
}

#[test]
fn sync_exports_and_stages_in_git() -> TestResult {
    let project = TestStore::new()?;
    let repo = git2::Repository::init(project.root())?;
    let id = data_id(&project.tl_json(&["create", "Synced"])?);

    let synced = project.tl_json(&["sync"])?;
    assert_eq!(synced["command"], "sync");
    assert_eq!(synced["data"]["exported"], 1);
    assert_eq!(synced["data"]["staged"], ".beads/issues.jsonl");

    let exported = std::fs::read_to_string(project.root().join(".beads/issues.jsonl"))?;
    assert!(exported.contains(id.as_str()));

    let index = repo.index()?;
    assert!(index
        .get_path(std::path::Path::new(".beads/issues.jsonl"), 0)
        .is_some());
    Ok(())
}

#[test]
fn sync_outside_a_git_repository_fails() -> TestResult {
    let project = TestStore::new()?;
    project.tl_json(&["create", "Unsynced"])?;

    project
        .tl()
        .arg("sync")
        .assert()
        .code(4)
        .stderr(contains("Git error"));
    // the export itself still landed
    assert!(project.root().join(".beads/issues.jsonl").is_file());
    Ok(())
}
