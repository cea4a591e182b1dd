#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

use tl::event::EventStamp;
use tl::graph::Graph;
use tl::ops::{self, NewIssue};
use tl::store::Store;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// A temp project directory with an initialized `.tl` store.
pub struct TestStore {
    _temp: TempDir,
    root: PathBuf,
    store: Store,
}

impl TestStore {
    pub fn new() -> TestResult<Self> {
        let temp = TempDir::new()?;
        let root = temp.path().to_path_buf();
        let store = Store::init(&root)?;
        Ok(Self {
            _temp: temp,
            root,
            store,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn events_path(&self) -> PathBuf {
        self.store.events_path()
    }

    /// `tl` pinned to this project with a fixed actor.
    pub fn tl(&self) -> Command {
        let mut cmd = tl_bin();
        cmd.current_dir(&self.root)
            .env_remove("TL_DIR")
            .env("TL_ACTOR", "tester");
        cmd
    }

    /// Run `tl --json <args>` and return the parsed envelope.
    pub fn tl_json(&self, args: &[&str]) -> TestResult<Value> {
        let output = self.tl().arg("--json").args(args).output()?;
        let envelope: Value = serde_json::from_slice(&output.stdout)?;
        Ok(envelope)
    }

    /// Create an issue through the library and return its id.
    pub fn create(&self, title: &str, priority: i32) -> TestResult<String> {
        let ids = self.store.config().ids.clone();
        let stamp = EventStamp::now("tester");
        let id = self.store.mutate_with(|graph| {
            let id = tl::id::generate_id(graph, &ids);
            let mut new = NewIssue::new(title);
            new.priority = priority;
            let event = ops::create(graph, &stamp, &id, new)?;
            Ok((vec![event], id))
        })?;
        Ok(id)
    }

    pub fn depend(&self, issue: &str, depends_on: &str) -> TestResult {
        let stamp = EventStamp::now("tester");
        self.store.mutate(|graph| {
            let event = ops::add_dependency(
                graph,
                &stamp,
                issue,
                depends_on,
                tl::model::DependencyType::Blocks,
            )?;
            Ok(vec![event])
        })?;
        Ok(())
    }

    pub fn load(&self) -> tl::Result<Graph> {
        self.store.load()
    }

    pub fn event_lines(&self) -> TestResult<Vec<String>> {
        let raw = std::fs::read_to_string(self.events_path())?;
        Ok(raw.lines().map(str::to_string).collect())
    }
}

pub fn tl_bin() -> Command {
    match Command::cargo_bin("tl") {
        Ok(cmd) => cmd,
        Err(err) => panic!("tl binary not built: {err}"),
    }
}

/// `data.id` out of a success envelope.
pub fn data_id(envelope: &Value) -> String {
    envelope["data"]["id"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| panic!("no data.id in {envelope}"))
}
