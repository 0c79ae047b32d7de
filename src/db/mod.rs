use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

use crate::error::{StoreError, StoreResult};
use migrations::run_migrations;

pub use models::{
    AnalysisPage, AnalysisStatus, AnalysisUpdate, Diagnosis, HistoryFilter, PatientSnapshot,
    ResultSnapshot, StoreStats, StoredAnalysis,
};

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join store thread: {join_err:?}");
            }
        }
    }
}

/// Handle to the local analysis store.
///
/// All access funnels through one worker thread that owns the SQLite
/// connection; callers submit closures and await the reply. Cloning the
/// handle shares the same worker. Tests open their own instance on a
/// temporary path instead of sharing process-global state.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    /// Open (or create, on first run) the store at `db_path` and bring the
    /// schema up to date. Repeated opens of the same path are idempotent.
    pub fn new(db_path: PathBuf) -> StoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                StoreError::StorageUnavailable(format!(
                    "failed to create store directory {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("osteoscan-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(StoreError::StorageUnavailable(format!(
                            "failed to open store: {err}"
                        ))));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result = run_migrations(&mut conn);
                if ready_tx.send(init_result).is_err() {
                    error!("Store initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Store thread shutting down");
            })
            .map_err(|err| {
                StoreError::StorageUnavailable(format!("failed to spawn store worker: {err}"))
            })?;

        ready_rx.recv().map_err(|_| {
            StoreError::StorageUnavailable("store worker exited before signaling readiness".into())
        })??;

        info!("Analysis store initialized at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub(crate) async fn execute<F, T>(&self, task: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Store caller dropped before receiving result");
            }
        }));

        sender.send(command).map_err(|_| {
            StoreError::StorageUnavailable("store thread is no longer accepting work".into())
        })?;

        reply_rx.await.map_err(|_| {
            StoreError::StorageUnavailable("store thread terminated unexpectedly".into())
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_and_reopens_idempotently() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("history.sqlite3");

        let first = Database::new(path.clone()).expect("first open");
        drop(first);
        let second = Database::new(path.clone()).expect("second open");
        assert_eq!(second.path(), path.as_path());
    }

    #[test]
    fn refuses_stores_from_the_future() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("history.sqlite3");

        {
            let conn = Connection::open(&path).expect("raw open");
            conn.pragma_update(None, "user_version", 99)
                .expect("bump version");
        }

        let err = Database::new(path).err().expect("open must fail");
        match err {
            StoreError::StorageUnavailable(msg) => {
                assert!(msg.contains("newer"), "unexpected message: {msg}");
            }
            other => panic!("expected StorageUnavailable, got {other}"),
        }
    }
}
