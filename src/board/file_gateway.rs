use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fs2::FileExt;
use tracing::debug;

use super::gateway::{Gateway, RemoteState};
use super::models::RemoteId;
use super::remote::{CardPatch, CreateCard, CreateList, RawBoard, RawCard, RawList};
use crate::errors::GatewayError;

/// Gateway backed by a JSON snapshot on disk.
///
/// Each call runs on tokio's blocking pool, takes an exclusive `flock` on
/// the snapshot, applies one operation and writes the result back, so
/// concurrent CLI invocations serialize on the file.
#[derive(Clone)]
pub struct FileGateway {
    path: PathBuf,
    board_title: String,
    guard: Arc<Mutex<()>>,
}

impl FileGateway {
    /// Point at `path`. The file is created with an empty board on first use.
    pub fn open(path: impl Into<PathBuf>, board_title: &str) -> Self {
        Self {
            path: path.into(),
            board_title: board_title.to_string(),
            guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against the snapshot on a blocking thread and persist the result.
    /// All data passed into `f` must be owned (`'static`).
    async fn call<F, R>(&self, f: F) -> Result<R, GatewayError>
    where
        F: FnOnce(&mut RemoteState) -> Result<R, GatewayError> + Send + 'static,
        R: Send + 'static,
    {
        let path = self.path.clone();
        let title = self.board_title.clone();
        let guard = self.guard.clone();
        tokio::task::spawn_blocking(move || {
            let _held = guard
                .lock()
                .map_err(|_| GatewayError::Unavailable("snapshot lock poisoned".into()))?;
            with_locked_snapshot(&path, &title, f)
        })
        .await
        .map_err(|e| GatewayError::Unavailable(format!("gateway task panicked: {}", e)))?
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> GatewayError + '_ {
    move |source| GatewayError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn with_locked_snapshot<R>(
    path: &Path,
    board_title: &str,
    f: impl FnOnce(&mut RemoteState) -> Result<R, GatewayError>,
) -> Result<R, GatewayError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(io_error(path))?;
    file.lock_exclusive().map_err(io_error(path))?;

    let result = apply(&mut file, path, board_title, f);
    let unlocked = FileExt::unlock(&file).map_err(io_error(path));
    let value = result?;
    unlocked?;
    Ok(value)
}

fn apply<R>(
    file: &mut File,
    path: &Path,
    board_title: &str,
    f: impl FnOnce(&mut RemoteState) -> Result<R, GatewayError>,
) -> Result<R, GatewayError> {
    let mut content = String::new();
    file.read_to_string(&mut content).map_err(io_error(path))?;
    let mut state = if content.trim().is_empty() {
        debug!(path = %path.display(), "initializing empty board snapshot");
        RemoteState::new(board_title)
    } else {
        serde_json::from_str(&content)?
    };

    let value = f(&mut state)?;

    let json = serde_json::to_string_pretty(&state)?;
    file.set_len(0).map_err(io_error(path))?;
    file.seek(SeekFrom::Start(0)).map_err(io_error(path))?;
    file.write_all(json.as_bytes()).map_err(io_error(path))?;
    file.sync_data().map_err(io_error(path))?;
    Ok(value)
}

#[async_trait]
impl Gateway for FileGateway {
    async fn fetch_board(&self) -> Result<RawBoard, GatewayError> {
        self.call(|state| Ok(state.board.clone())).await
    }

    async fn create_list(&self, request: CreateList) -> Result<RawList, GatewayError> {
        self.call(move |state| Ok(state.create_list(request))).await
    }

    async fn create_card(&self, request: CreateCard) -> Result<RawCard, GatewayError> {
        self.call(move |state| state.create_card(request)).await
    }

    async fn update_card(&self, id: &RemoteId, patch: CardPatch) -> Result<RawCard, GatewayError> {
        let id = id.clone();
        self.call(move |state| state.update_card(&id, patch)).await
    }

    async fn delete_list(&self, id: &RemoteId) -> Result<(), GatewayError> {
        let id = id.clone();
        self.call(move |state| state.delete_list(&id)).await
    }

    async fn delete_card(&self, id: &RemoteId) -> Result<(), GatewayError> {
        let id = id.clone();
        self.call(move |state| state.delete_card(&id)).await
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn test_snapshot_is_created_on_first_call() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("board.json");
        let gw = FileGateway::open(&path, "Home");

        let board = gw.fetch_board().await.unwrap();
        assert_eq!(board.title.as_deref(), Some("Home"));
        assert!(board.lists.is_empty());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("board.json");

        let gw = FileGateway::open(&path, "Home");
        let list = gw
            .create_list(CreateList {
                title: "Todo".into(),
            })
            .await
            .unwrap();
        gw.create_card(CreateCard {
            title: "Write docs".into(),
            list_id: RemoteId::new(list.id.clone()),
        })
        .await
        .unwrap();

        let reopened = FileGateway::open(&path, "ignored");
        let board = reopened.fetch_board().await.unwrap();
        assert_eq!(board.title.as_deref(), Some("Home"));
        assert_eq!(board.lists.len(), 1);
        assert_eq!(board.lists[0].cards[0].title.as_deref(), Some("Write docs"));

        // ids keep counting from where the previous handle stopped
        let next = reopened
            .create_list(CreateList {
                title: "Done".into(),
            })
            .await
            .unwrap();
        assert_eq!(next.id, "srv-3");
    }

    #[tokio::test]
    async fn test_concurrent_updates_all_land() {
        let dir = tempdir().unwrap();
        let gw = FileGateway::open(dir.path().join("board.json"), "Home");
        let list = gw.create_list(CreateList { title: "A".into() }).await.unwrap();
        let list_id = RemoteId::new(list.id.clone());
        let mut ids = Vec::new();
        for i in 0..5 {
            let card = gw
                .create_card(CreateCard {
                    title: format!("c{i}"),
                    list_id: list_id.clone(),
                })
                .await
                .unwrap();
            ids.push(RemoteId::new(card.id));
        }

        // reverse the order with one concurrent batch
        let futures = ids.iter().enumerate().map(|(i, id)| {
            let patch = CardPatch::placement(list_id.clone(), (4 - i) as i32);
            gw.update_card(id, patch)
        });
        let results = futures::future::join_all(futures).await;
        assert!(results.iter().all(Result::is_ok));

        let board = gw.fetch_board().await.unwrap();
        let titles: Vec<_> = board.lists[0]
            .cards
            .iter()
            .map(|c| c.title.clone().unwrap())
            .collect();
        assert_eq!(titles, vec!["c4", "c3", "c2", "c1", "c0"]);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_a_serialization_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("board.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = FileGateway::open(&path, "Home").fetch_board().await.unwrap_err();
        assert!(matches!(err, GatewayError::Serialization(_)));
    }
}
