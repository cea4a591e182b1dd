//! On-disk store.
//!
//! ```text
//! .tl/
//!   events.jsonl   # append-only event log (source of truth)
//!   lock           # empty sentinel, flock'd by writers
//!   config.toml    # optional
//! ```
//!
//! Reads replay the whole log without locking. Writes lock, replay, plan
//! events against the fresh graph, append, and unlock.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::graph::Graph;
use crate::lock::FileLock;
use crate::log::EventLog;
use crate::replay::replay;

pub const STORE_DIR: &str = ".tl";
pub const EVENTS_FILE: &str = "events.jsonl";
pub const LOCK_FILE: &str = "lock";

#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
    config: Config,
}

impl Store {
    /// Create `<path>/.tl` with an empty log and lock file.
    pub fn init(path: &Path) -> Result<Self> {
        let dir = path.join(STORE_DIR);
        if dir.exists() {
            return Err(Error::AlreadyInitialized(dir));
        }
        fs::create_dir_all(&dir)?;
        for file in [EVENTS_FILE, LOCK_FILE] {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(dir.join(file))?;
        }
        tracing::debug!(dir = %dir.display(), "initialized store");
        Self::open(dir)
    }

    /// Open an existing `.tl` directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(Error::InvalidStore(dir));
        }
        let config = Config::load_from_store(&dir)?;
        Ok(Self { dir, config })
    }

    /// Find the store for `start`: `start` itself when it is a `.tl`
    /// directory, otherwise the nearest `.tl` in `start` or an ancestor.
    pub fn resolve(start: &Path) -> Result<Self> {
        let start = if start.is_absolute() {
            start.to_path_buf()
        } else {
            std::env::current_dir()?.join(start)
        };

        for dir in start.ancestors() {
            let candidate = dir.join(STORE_DIR);
            if candidate.is_dir() {
                return Self::open(candidate);
            }
            if candidate.exists() {
                return Err(Error::InvalidStore(candidate));
            }
        }

        // `--dir` may name the store directory itself
        if start.file_name().is_some_and(|name| name == STORE_DIR) {
            if start.is_dir() {
                return Self::open(start);
            }
            if start.exists() {
                return Err(Error::InvalidStore(start));
            }
        }
        Err(Error::NoStore(start))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn events_path(&self) -> PathBuf {
        self.dir.join(EVENTS_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(crate::config::CONFIG_FILE)
    }

    pub fn log(&self) -> EventLog {
        EventLog::new(self.events_path()).with_max_record_bytes(self.config.log.max_record_bytes)
    }

    /// Replay the current log. Takes no lock.
    pub fn load(&self) -> Result<Graph> {
        let events = self.log().read()?;
        tracing::debug!(events = events.len(), "replaying log");
        Ok(replay(&events))
    }

    /// Locked read-modify-append. `plan` sees a graph replayed under the
    /// lock and returns the events to append plus a value for the caller.
    pub fn mutate_with<T, F>(&self, plan: F) -> Result<T>
    where
        F: FnOnce(&mut Graph) -> Result<(Vec<Event>, T)>,
    {
        let _lock = FileLock::acquire(self.lock_path())?;
        let mut graph = self.load()?;
        let (events, value) = plan(&mut graph)?;
        if !events.is_empty() {
            self.log().append(&events)?;
            tracing::debug!(appended = events.len(), "appended events");
        }
        Ok(value)
    }

    pub fn mutate<F>(&self, plan: F) -> Result<()>
    where
        F: FnOnce(&mut Graph) -> Result<Vec<Event>>,
    {
        self.mutate_with(|graph| Ok((plan(graph)?, ())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CreateData, EventStamp};
    use tempfile::TempDir;

    fn create_event(id: &str) -> Event {
        let data = CreateData {
            title: format!("issue {id}"),
            priority: 2,
            ..CreateData::default()
        };
        EventStamp::now("tester").create(id, &data).expect("create")
    }

    #[test]
    fn init_creates_layout_once() {
        let dir = TempDir::new().expect("tempdir");
        let store = Store::init(dir.path()).expect("init");
        assert!(store.events_path().is_file());
        assert!(store.lock_path().is_file());

        let err = Store::init(dir.path()).expect_err("second init");
        assert!(matches!(err, Error::AlreadyInitialized(_)));
    }

    #[test]
    fn resolve_walks_up_from_subdirectory() {
        let dir = TempDir::new().expect("tempdir");
        Store::init(dir.path()).expect("init");
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).expect("mkdir");

        let store = Store::resolve(&nested).expect("resolve");
        assert_eq!(store.dir(), dir.path().join(STORE_DIR));

        let direct = Store::resolve(&dir.path().join(STORE_DIR)).expect("direct");
        assert_eq!(direct.dir(), store.dir());
    }

    #[test]
    fn resolve_prefers_a_store_found_by_walking() {
        let dir = TempDir::new().expect("tempdir");
        let outer = Store::init(dir.path()).expect("outer");
        let inner = Store::init(outer.dir()).expect("inner");

        let store = Store::resolve(outer.dir()).expect("resolve");
        assert_eq!(store.dir(), inner.dir());
    }

    #[test]
    fn store_path_that_is_a_file_is_invalid() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join(STORE_DIR), b"").expect("write");
        let err = Store::resolve(dir.path()).expect_err("invalid");
        assert!(matches!(err, Error::InvalidStore(_)));
    }

    #[test]
    fn mutate_appends_and_load_sees_it() {
        let dir = TempDir::new().expect("tempdir");
        let store = Store::init(dir.path()).expect("init");

        let title = store
            .mutate_with(|graph| {
                assert!(graph.is_empty());
                Ok((vec![create_event("tl-a")], "issue tl-a".to_string()))
            })
            .expect("mutate");
        assert_eq!(title, "issue tl-a");

        let graph = store.load().expect("load");
        assert!(graph.contains("tl-a"));
    }

    #[test]
    fn empty_plan_does_not_touch_log() {
        let dir = TempDir::new().expect("tempdir");
        let store = Store::init(dir.path()).expect("init");
        store.mutate(|_| Ok(Vec::new())).expect("mutate");
        assert_eq!(fs::metadata(store.events_path()).expect("meta").len(), 0);
    }

    #[test]
    fn failed_plan_appends_nothing_and_releases_lock() {
        let dir = TempDir::new().expect("tempdir");
        let store = Store::init(dir.path()).expect("init");
        let err = store
            .mutate(|_| Err(Error::NotFound("tl-x".to_string())))
            .expect_err("plan error");
        assert!(matches!(err, Error::NotFound(_)));
        assert!(FileLock::try_acquire(store.lock_path()).expect("lock").is_some());
    }

    #[test]
    fn held_lock_rejects_writer() {
        let dir = TempDir::new().expect("tempdir");
        let store = Store::init(dir.path()).expect("init");
        let _held = FileLock::acquire(store.lock_path()).expect("hold");
        let err = store
            .mutate(|_| Ok(vec![create_event("tl-a")]))
            .expect_err("busy");
        assert!(matches!(err, Error::LockBusy(_)));
        assert!(store.load().expect("load").is_empty());
    }
}
