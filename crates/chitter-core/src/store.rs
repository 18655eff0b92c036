//! Durable store: JSON documents on disk
//!
//! ```text
//! <root>/workflows/<workflow_id>.json
//! <root>/queues/<session_id>.json
//! <root>/locks/<session_id>.lock
//! <root>/active/<session_id>.md
//! <root>/chitter.log
//! ```
//!
//! Writes go to a temp file that is renamed over the target, so readers
//! never see a partial document. A document that fails to parse is deleted
//! and reported as absent.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};

use crate::{
    ids::{SessionId, WorkflowId},
    lock::SessionLock,
    queue::SessionQueue,
    workflow::{Workflow, WorkflowStatus},
    Error, Result,
};

const WORKFLOWS_DIR: &str = "workflows";
const QUEUES_DIR: &str = "queues";
const LOCKS_DIR: &str = "locks";
const ACTIVE_DIR: &str = "active";
const LOG_FILE: &str = "chitter.log";

/// Handle to a state directory; every operation takes one explicitly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Create the directory layout under `root` and return a handle.
    ///
    /// Idempotent: re-initialising an existing store is a no-op.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { root: root.into() };
        for dir in [WORKFLOWS_DIR, QUEUES_DIR, LOCKS_DIR, ACTIVE_DIR] {
            let path = store.root.join(dir);
            fs::create_dir_all(&path).map_err(|e| {
                Error::Io(format!("Failed to create {}: {e}", path.display()))
            })?;
        }
        tracing::debug!(root = %store.root.display(), "store ready");
        Ok(store)
    }

    /// Open an existing store, creating any missing directories
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::init(root)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the append-only diagnostic log
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    /// Path of a session's rendered coordination artifact
    #[must_use]
    pub fn artifact_path(&self, session: &SessionId) -> PathBuf {
        self.root.join(ACTIVE_DIR).join(format!("{session}.md"))
    }

    fn workflow_path(&self, id: &WorkflowId) -> PathBuf {
        self.root.join(WORKFLOWS_DIR).join(format!("{id}.json"))
    }

    fn queue_path(&self, session: &SessionId) -> PathBuf {
        self.root.join(QUEUES_DIR).join(format!("{session}.json"))
    }

    // ───────────────────────────────────────────────────────────────────
    // Locking
    // ───────────────────────────────────────────────────────────────────

    /// Run `f` while holding the session's exclusive lock.
    ///
    /// `f` re-reads whatever it needs through the store handle it is given
    /// and persists its result before returning. The lock is released on
    /// every exit path, including an error from `f`.
    pub fn with_lock<T>(&self, session: &SessionId, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let _guard = SessionLock::acquire(&self.root.join(LOCKS_DIR), session)?;
        f(self)
    }

    // ───────────────────────────────────────────────────────────────────
    // Workflows
    // ───────────────────────────────────────────────────────────────────

    pub fn load_workflow(&self, id: &WorkflowId) -> Result<Option<Workflow>> {
        load_document(&self.workflow_path(id))
    }

    pub fn save_workflow(&self, workflow: &Workflow) -> Result<()> {
        write_document(&self.workflow_path(&workflow.id), workflow)
    }

    pub fn delete_workflow(&self, id: &WorkflowId) -> Result<()> {
        remove_if_exists(&self.workflow_path(id))
    }

    /// Every parseable workflow document; corrupted ones are removed
    pub fn list_workflows(&self) -> Result<Vec<Workflow>> {
        let mut workflows: Vec<Workflow> = list_documents(&self.root.join(WORKFLOWS_DIR))?;
        workflows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(workflows)
    }

    /// The session's active workflow, oldest first if several exist
    pub fn find_active_workflow(&self, session: &SessionId) -> Result<Option<Workflow>> {
        Ok(self.list_workflows()?.into_iter().find(|w| {
            &w.session_id == session && w.status == WorkflowStatus::Active
        }))
    }

    // ───────────────────────────────────────────────────────────────────
    // Queues
    // ───────────────────────────────────────────────────────────────────

    pub fn load_queue(&self, session: &SessionId) -> Result<Option<SessionQueue>> {
        load_document(&self.queue_path(session))
    }

    pub fn save_queue(&self, queue: &SessionQueue) -> Result<()> {
        write_document(&self.queue_path(&queue.session_id), queue)
    }

    pub fn delete_queue(&self, session: &SessionId) -> Result<()> {
        remove_if_exists(&self.queue_path(session))
    }

    pub fn list_queues(&self) -> Result<Vec<SessionQueue>> {
        list_documents(&self.root.join(QUEUES_DIR))
    }

    // ───────────────────────────────────────────────────────────────────
    // Coordination artifacts
    // ───────────────────────────────────────────────────────────────────

    /// Overwrite the session's artifact in place
    pub fn write_artifact(&self, session: &SessionId, contents: &str) -> Result<PathBuf> {
        let path = self.artifact_path(session);
        write_atomic(&path, contents)?;
        Ok(path)
    }

    pub fn read_artifact(&self, session: &SessionId) -> Result<Option<String>> {
        let path = self.artifact_path(session);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(format!("Failed to read {}: {e}", path.display()))),
        }
    }

    pub fn delete_artifact(&self, session: &SessionId) -> Result<()> {
        remove_if_exists(&self.artifact_path(session))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// DOCUMENT HELPERS
// ═══════════════════════════════════════════════════════════════════════════

/// Load a JSON document; missing → `None`, corrupted → deleted and `None`
fn load_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::Io(format!("Failed to read {}: {e}", path.display())));
        }
    };

    match serde_json::from_str(&content) {
        Ok(doc) => Ok(Some(doc)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "deleting corrupted record");
            remove_if_exists(path)?;
            Ok(None)
        }
    }
}

fn list_documents<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(Error::Io(format!("Failed to read {}: {e}", dir.display())));
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        if let Some(doc) = load_document(&path)? {
            docs.push(doc);
        }
    }
    Ok(docs)
}

fn write_document<T: Serialize>(path: &Path, doc: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(doc)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Write via temp file + rename. The temp name is unique per write, so
/// concurrent writers of one document never share a temp file.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::Io(format!("path missing parent {}", path.display())))?;
    fs::create_dir_all(parent)
        .map_err(|e| Error::Io(format!("Failed to create {}: {e}", parent.display())))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = parent.join(format!(
        ".{file_name}.{}.{}.tmp",
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    ));

    fs::write(&tmp_path, contents)
        .map_err(|e| Error::Io(format!("Failed to write {}: {e}", tmp_path.display())))?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        Error::Io(format!("Failed to replace {}: {e}", path.display()))
    })
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(format!("Failed to delete {}: {e}", path.display()))),
    }
}
