//! Integration tests for FileStorage

use async_trait::async_trait;
use futures::TryStreamExt;
use objstore::{
    read_to_end, FileStorage, ObjectReader, ObjectStorage, SliceReader, StorageError,
    StorageResult, LIST_PAGE_SIZE,
};
use std::sync::Arc;

fn bytes(data: &[u8]) -> SliceReader {
    SliceReader::new(Arc::from(data), 0, -1)
}

fn storage(dir: &tempfile::TempDir) -> FileStorage {
    FileStorage::new(dir.path().to_str().unwrap())
}

/// Yields some bytes, then fails
struct FailingReader {
    sent: bool,
}

#[async_trait]
impl ObjectReader for FailingReader {
    async fn read(&mut self, buf: &mut [u8]) -> StorageResult<usize> {
        if self.sent {
            return Err(StorageError::Io(std::io::Error::other("source went away")));
        }
        self.sent = true;
        buf[..3].copy_from_slice(b"abc");
        Ok(3)
    }

    async fn close(&mut self) -> StorageResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_put_creates_parents_and_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let fs = storage(&dir);

    fs.put("a/b/c.txt", &mut bytes(b"hello")).await.unwrap();
    assert_eq!(
        std::fs::read(dir.path().join("a/b/c.txt")).unwrap(),
        b"hello"
    );

    let mut tail = fs.get("a/b/c.txt", 2, 0).await.unwrap();
    assert_eq!(read_to_end(&mut tail).await.unwrap(), b"llo");

    let mut reader = fs.get("a/b/c.txt", 1, 3).await.unwrap();
    assert_eq!(read_to_end(&mut reader).await.unwrap(), b"ell");
    reader.close().await.unwrap();
    let mut buf = [0u8; 1];
    assert!(matches!(reader.read(&mut buf).await, Err(StorageError::Closed)));
}

#[tokio::test]
async fn test_failed_put_leaves_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let fs = storage(&dir);

    let result = fs.put("k", &mut FailingReader { sent: false }).await;
    assert!(result.is_err());
    assert!(fs.head("k").await.unwrap_err().is_not_found());
    assert!(fs.list("", "", -1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_head_and_directories() {
    let dir = tempfile::tempdir().unwrap();
    let fs = storage(&dir);
    fs.put("d/", &mut bytes(b"")).await.unwrap();
    fs.put("d/f", &mut bytes(b"1234")).await.unwrap();

    let file = fs.head("d/f").await.unwrap();
    assert_eq!(file.size(), 4);
    assert!(!file.is_dir());

    let d = fs.head("d").await.unwrap();
    assert_eq!(d.key(), "d/");
    assert!(d.is_dir());
    assert_eq!(d.size(), 0);

    assert!(matches!(
        fs.get("d/", 0, -1).await,
        Err(StorageError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_list_walks_tree_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let fs = storage(&dir);
    for key in ["b/2", "a", "b/1", "c/x/y"] {
        fs.put(key, &mut bytes(b"")).await.unwrap();
    }

    let keys: Vec<_> = fs
        .list("", "", -1)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.key().to_string())
        .collect();
    assert_eq!(keys, vec!["a", "b/", "b/1", "b/2", "c/", "c/x/", "c/x/y"]);

    let keys: Vec<_> = fs
        .list("b/", "b/1", 10)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.key().to_string())
        .collect();
    assert_eq!(keys, vec!["b/2"]);

    let keys: Vec<_> = fs
        .list("c/x", "", -1)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.key().to_string())
        .collect();
    assert_eq!(keys, vec!["c/x/", "c/x/y"]);
}

#[tokio::test]
async fn test_list_all_matches_list() {
    let dir = tempfile::tempdir().unwrap();
    let fs = storage(&dir);
    let total = usize::try_from(LIST_PAGE_SIZE).unwrap() + 5;
    for i in 0..total {
        fs.put(&format!("p/{i:05}"), &mut bytes(b"")).await.unwrap();
    }
    fs.put("q", &mut bytes(b"")).await.unwrap();

    let all: Vec<_> = fs
        .list_all("p/", "")
        .await
        .unwrap()
        .map_ok(|o| o.key().to_string())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(all.len(), total + 1);
    assert_eq!(all[0], "p/");
    assert!(all.windows(2).all(|w| w[0] < w[1]));

    let listed: Vec<_> = fs
        .list("p/", "p/00500", -1)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.key().to_string())
        .collect();
    let streamed: Vec<String> = fs
        .list_all("p/", "p/00500")
        .await
        .unwrap()
        .map_ok(|o| o.key().to_string())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(streamed, listed);
    assert_eq!(streamed.len(), total - 501);
}

#[tokio::test]
async fn test_delete() {
    let dir = tempfile::tempdir().unwrap();
    let fs = storage(&dir);
    fs.put("k", &mut bytes(b"v")).await.unwrap();

    fs.delete("k").await.unwrap();
    assert!(!dir.path().join("k").exists());
    fs.delete("k").await.unwrap();
}

#[tokio::test]
async fn test_keys_cannot_escape_root() {
    let dir = tempfile::tempdir().unwrap();
    let fs = storage(&dir);

    assert!(matches!(
        fs.put("../evil", &mut bytes(b"x")).await,
        Err(StorageError::InvalidKey(_))
    ));
    assert!(matches!(
        fs.head("/etc/passwd").await,
        Err(StorageError::InvalidKey(_))
    ));
}

#[tokio::test]
async fn test_create_makes_root() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("nested/root");
    let fs = FileStorage::new(root.to_str().unwrap());

    fs.create().await.unwrap();
    assert!(root.is_dir());
    assert_eq!(fs.describe(), format!("file://{}/", root.display()));
}
