//! Integration tests for MemStorage

#[macro_use]
extern crate hamcrest;

use futures::TryStreamExt;
use hamcrest::prelude::*;
use objstore::{
    read_to_end, MemStorage, ObjectReader, ObjectStorage, SliceReader, StorageError,
    LIST_PAGE_SIZE,
};
use std::sync::Arc;

fn bytes(data: &[u8]) -> SliceReader {
    SliceReader::new(Arc::from(data), 0, -1)
}

async fn put(storage: &MemStorage, key: &str, data: &[u8]) {
    storage.put(key, &mut bytes(data)).await.unwrap();
}

async fn keys(storage: &MemStorage, prefix: &str, marker: &str, limit: i64) -> Vec<String> {
    storage
        .list(prefix, marker, limit)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.key().to_string())
        .collect()
}

#[tokio::test]
async fn test_put_then_get() {
    let storage = MemStorage::new("bucket");
    put(&storage, "a/b", b"hello world").await;

    let mut reader = storage.get("a/b", 0, -1).await.unwrap();
    assert_eq!(read_to_end(&mut reader).await.unwrap(), b"hello world");
    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_get_range() {
    let storage = MemStorage::new("bucket");
    put(&storage, "k", b"0123456789").await;

    let mut reader = storage.get("k", 3, 4).await.unwrap();
    assert_eq!(read_to_end(&mut reader).await.unwrap(), b"3456");

    // Zero limit reads to the end, like -1
    let mut reader = storage.get("k", 7, 0).await.unwrap();
    assert_eq!(read_to_end(&mut reader).await.unwrap(), b"789");

    // Offset past the end yields an empty stream
    let mut reader = storage.get("k", 42, -1).await.unwrap();
    assert_eq!(read_to_end(&mut reader).await.unwrap(), b"");
}

#[tokio::test]
async fn test_get_not_found() {
    let storage = MemStorage::new("bucket");

    match storage.get("nonexistent", 0, -1).await {
        Err(StorageError::NotFound(key)) => assert_eq!(key, "nonexistent"),
        Err(e) => panic!("Expected NotFound error, got {e}"),
        Ok(_) => panic!("Expected NotFound error"),
    }
}

#[tokio::test]
async fn test_put_overwrites() {
    let storage = MemStorage::new("bucket");
    put(&storage, "k", b"initial data").await;
    put(&storage, "k", b"new").await;

    let head = storage.head("k").await.unwrap();
    assert_that!(head.size(), is(equal_to(3)));
    assert_that!(storage.len(), is(equal_to(1)));
}

#[tokio::test]
async fn test_open_reader_survives_overwrite() {
    let storage = MemStorage::new("bucket");
    put(&storage, "k", b"old").await;

    let mut reader = storage.get("k", 0, -1).await.unwrap();
    put(&storage, "k", b"new").await;
    storage.delete("k").await.unwrap();

    assert_eq!(read_to_end(&mut reader).await.unwrap(), b"old");
}

#[tokio::test]
async fn test_head() {
    let storage = MemStorage::new("bucket");
    put(&storage, "dir/", b"").await;
    put(&storage, "dir/file", b"abc").await;

    let file = storage.head("dir/file").await.unwrap();
    assert_eq!(file.key(), "dir/file");
    assert_eq!(file.size(), 3);
    assert!(!file.is_dir());
    assert!(file.mtime_unix() > 0);

    let dir = storage.head("dir/").await.unwrap();
    assert!(dir.is_dir());

    assert!(storage.head("missing").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_delete() {
    let storage = MemStorage::new("bucket");
    put(&storage, "k", b"v").await;

    storage.delete("k").await.unwrap();
    assert!(storage.is_empty());

    // Deleting a missing key is fine
    storage.delete("k").await.unwrap();
}

#[tokio::test]
async fn test_list_prefix_and_order() {
    let storage = MemStorage::new("bucket");
    for key in ["dir2/file1", "dir1/file2", "dir1/file1", "dir10/x", "other"] {
        put(&storage, key, b"").await;
    }

    assert_eq!(
        keys(&storage, "dir1/", "", -1).await,
        vec!["dir1/file1", "dir1/file2"]
    );
    assert_eq!(
        keys(&storage, "dir1", "", -1).await,
        vec!["dir1/file1", "dir1/file2", "dir10/x"]
    );
    assert_eq!(keys(&storage, "", "", -1).await.len(), 5);
}

#[tokio::test]
async fn test_list_marker_and_limit() {
    let storage = MemStorage::new("bucket");
    for key in ["a", "b", "c", "d"] {
        put(&storage, key, b"").await;
    }

    assert_eq!(keys(&storage, "", "b", -1).await, vec!["c", "d"]);
    assert_eq!(keys(&storage, "", "", 2).await, vec!["a", "b"]);
    assert_eq!(keys(&storage, "", "", 0).await, Vec::<String>::new());
    // Marker before the prefix range is ignored
    assert_eq!(keys(&storage, "c", "a", -1).await, vec!["c"]);
}

#[tokio::test]
async fn test_list_pages_do_not_overlap() {
    let storage = MemStorage::new("bucket");
    for i in 0..5 {
        put(&storage, &format!("k{i}"), b"").await;
    }

    let first = keys(&storage, "", "", 2).await;
    let second = keys(&storage, "", first.last().unwrap(), 2).await;
    let third = keys(&storage, "", second.last().unwrap(), 2).await;
    assert_eq!(first, vec!["k0", "k1"]);
    assert_eq!(second, vec!["k2", "k3"]);
    assert_eq!(third, vec!["k4"]);
}

#[tokio::test]
async fn test_list_all_crosses_pages() {
    let storage = MemStorage::new("bucket");
    let total = usize::try_from(LIST_PAGE_SIZE).unwrap() * 2 + 5;
    for i in 0..total {
        put(&storage, &format!("p/{i:05}"), b"x").await;
    }
    put(&storage, "q/outside", b"").await;

    let all: Vec<_> = storage
        .list_all("p/", "")
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_that!(all.len(), is(equal_to(total)));
    assert!(all.windows(2).all(|w| w[0].key() < w[1].key()));

    let tail: Vec<_> = storage
        .list_all("p/", "p/02000")
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(tail.len(), total - 2001);
}

#[tokio::test]
async fn test_list_all_empty() {
    let storage = MemStorage::new("bucket");
    let all: Vec<_> = storage
        .list_all("", "")
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn test_describe() {
    assert_eq!(MemStorage::new("bucket").describe(), "mem://bucket/");
    assert_eq!(MemStorage::default().describe(), "mem:///");
}
