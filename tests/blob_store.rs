//! Blob store integration tests
//!
//! Run with:
//! ```bash
//! cargo test --test blob_store
//! ```

mod common;

use blogkv::codec;
use blogkv::{BlobStore, Config, Error, KvStore, MemoryStore, QuotaStore, Upload};
use common::{assert_index_consistent, sample_bytes, FaultyStore};
use std::sync::Arc;

fn store_with_ceiling(config: &Config) -> MemoryStore {
    MemoryStore::with_value_limit(config.max_value_size)
}

// ============================================================================
// Upload Scenarios
// ============================================================================

#[tokio::test]
async fn test_small_upload_is_inline() {
    let config = Config::default();
    let blobs = BlobStore::new(store_with_ceiling(&config), config).unwrap();
    blobs
        .put("old.png", b"older", "image/png", "old.png", 5)
        .await
        .unwrap();

    let data = sample_bytes(10 * 1024);
    let receipt = blobs
        .upload(Upload::new(data.clone(), "image/png", "photo.png"))
        .await
        .unwrap();
    assert_eq!(receipt.url, format!("/uploads/{}", receipt.filename));
    assert!(receipt.filename.ends_with(".png"));

    let stored = blobs.fetch(&receipt.filename).await.unwrap();
    assert!(!stored.meta.chunked);
    assert_eq!(stored.meta.total_chunks, None);
    assert_eq!(stored.meta.content_type, "image/png");
    assert_eq!(stored.meta.original_name, "photo.png");
    assert_eq!(stored.bytes.as_ref(), data.as_slice());

    let store = blobs.store();
    let data_keys: Vec<String> = store
        .keys()
        .into_iter()
        .filter(|k| k.starts_with(&format!("image:{}", receipt.filename)))
        .collect();
    assert_eq!(data_keys, vec![format!("image:{}", receipt.filename)]);

    let index = blobs.list().await.unwrap();
    assert_eq!(index.len(), 2);
    assert_eq!(index[0].filename, receipt.filename);
    assert_eq!(index[0].size_bytes, 10 * 1024);
    assert_eq!(index[1].filename, "old.png");
}

#[tokio::test]
async fn test_large_upload_is_chunked_under_value_ceiling() {
    let config = Config::default();
    let chunk_size = config.chunk_size;
    let blobs = BlobStore::new(store_with_ceiling(&config), config).unwrap();

    let data = sample_bytes(2 * 1024 * 1024);
    let receipt = blobs
        .upload(Upload::new(data.clone(), "model/gltf-binary", "scene.glb"))
        .await
        .unwrap();

    let encoded_len = codec::encoded_len(data.len());
    let expected_chunks = encoded_len.div_ceil(chunk_size) as u32;
    let stored = blobs.fetch(&receipt.filename).await.unwrap();
    assert!(stored.meta.chunked);
    assert_eq!(stored.meta.total_chunks, Some(expected_chunks));
    assert_eq!(stored.bytes.as_ref(), data.as_slice());

    for i in 0..expected_chunks {
        let key = format!("image:{}:chunk:{}", receipt.filename, i);
        let chunk = blobs.store().get(&key).await.unwrap().unwrap();
        assert!(chunk.len() <= chunk_size);
    }
    let past_end = format!("image:{}:chunk:{}", receipt.filename, expected_chunks);
    assert!(!blobs.store().contains(&past_end));

    let marker = blobs
        .store()
        .get(&format!("image:{}", receipt.filename))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        marker,
        format!(r#"{{"chunked":true,"totalChunks":{}}}"#, expected_chunks)
    );
}

#[tokio::test]
async fn test_roundtrip_around_threshold() {
    // 400 encoded chars == 300 raw bytes
    let config = Config {
        max_value_size: 1000,
        chunk_size: 400,
        ..Default::default()
    };
    let blobs = BlobStore::new(store_with_ceiling(&config), config).unwrap();

    for (len, chunked) in [(0, false), (297, false), (300, false), (301, true), (900, true)] {
        let name = format!("f{}.png", len);
        let data = sample_bytes(len);
        blobs
            .put(&name, &data, "image/png", &name, len as u64)
            .await
            .unwrap();
        let stored = blobs.fetch(&name).await.unwrap();
        assert_eq!(stored.meta.chunked, chunked, "len {}", len);
        assert_eq!(stored.bytes.as_ref(), data.as_slice(), "len {}", len);
    }
    assert_index_consistent(blobs.store());
}

#[tokio::test]
async fn test_rejected_upload_makes_no_store_calls() {
    let backing = MemoryStore::new();
    let blobs = BlobStore::new(QuotaStore::new(&backing, 0), Config::default()).unwrap();

    let err = blobs
        .upload(Upload::new(vec![1u8; 10], "application/x-msdownload", "setup.exe"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedType(_)));

    let too_big = vec![0u8; 10 * 1024 * 1024 + 1];
    let err = blobs
        .upload(Upload::new(too_big, "image/png", "huge.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Oversize { .. }));
    assert!(err.is_client_error());

    assert_eq!(blobs.store().calls(), 0);
    assert!(backing.is_empty());
}

#[tokio::test]
async fn test_large_upload_fits_call_budget() {
    let backing = MemoryStore::new();
    let blobs = BlobStore::new(QuotaStore::new(&backing, 11), Config::default()).unwrap();

    // 2 MB -> 6 chunks: 2 reads, 8 writes, 1 index write
    let data = sample_bytes(2_000_000);
    blobs
        .put("big.glb", &data, "model/gltf-binary", "big.glb", data.len() as u64)
        .await
        .unwrap();
    assert_eq!(blobs.store().calls(), 11);
}

// ============================================================================
// Read Failures
// ============================================================================

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let blobs = BlobStore::new(MemoryStore::new(), Config::default()).unwrap();
    let err = blobs.get("nope.png").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_missing_primary_is_not_found() {
    let blobs = BlobStore::new(MemoryStore::new(), Config::default()).unwrap();
    blobs.put("a.png", b"abc", "image/png", "a.png", 3).await.unwrap();
    blobs.store().delete("image:a.png").await.unwrap();
    assert!(matches!(blobs.get("a.png").await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_chunked_blob_without_marker_is_not_found() {
    let config = Config {
        max_value_size: 100,
        chunk_size: 40,
        ..Default::default()
    };
    let blobs = BlobStore::new(MemoryStore::new(), config).unwrap();
    blobs
        .put("m.glb", &sample_bytes(200), "model/gltf-binary", "m.glb", 200)
        .await
        .unwrap();

    blobs.store().delete("image:m.glb").await.unwrap();
    match blobs.get("m.glb").await {
        Err(Error::NotFound(key)) => assert_eq!(key, "image:m.glb"),
        other => panic!("expected NotFound, got {:?}", other.map(|b| b.len())),
    }
}

#[tokio::test]
async fn test_marker_count_mismatch_is_corrupt() {
    let config = Config {
        max_value_size: 100,
        chunk_size: 40,
        ..Default::default()
    };
    let blobs = BlobStore::new(MemoryStore::new(), config).unwrap();
    blobs
        .put("m.glb", &sample_bytes(200), "model/gltf-binary", "m.glb", 200)
        .await
        .unwrap();

    blobs
        .store()
        .put("image:m.glb", r#"{"chunked":true,"totalChunks":2}"#)
        .await
        .unwrap();
    assert!(matches!(blobs.get("m.glb").await, Err(Error::CorruptBlob(_))));
}

#[tokio::test]
async fn test_missing_chunk_is_corrupt_not_truncated() {
    let config = Config {
        max_value_size: 100,
        chunk_size: 40,
        ..Default::default()
    };
    let blobs = BlobStore::new(MemoryStore::new(), config).unwrap();
    let data = sample_bytes(200);
    blobs.put("m.glb", &data, "model/gltf-binary", "m.glb", 200).await.unwrap();

    blobs.store().delete("image:m.glb:chunk:2").await.unwrap();
    let err = blobs.get("m.glb").await.unwrap_err();
    match err {
        Error::CorruptBlob(reason) => assert!(reason.contains("image:m.glb:chunk:2")),
        other => panic!("expected CorruptBlob, got {:?}", other),
    }
}

#[tokio::test]
async fn test_garbled_payload_is_corrupt() {
    let blobs = BlobStore::new(MemoryStore::new(), Config::default()).unwrap();
    blobs.put("g.png", b"hello", "image/png", "g.png", 5).await.unwrap();
    blobs.store().put("image:g.png", "not*base64").await.unwrap();
    assert!(matches!(blobs.get("g.png").await, Err(Error::CorruptBlob(_))));
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_is_idempotent() {
    let config = Config {
        max_value_size: 100,
        chunk_size: 40,
        ..Default::default()
    };
    let blobs = BlobStore::new(MemoryStore::new(), config).unwrap();
    blobs
        .put("d.glb", &sample_bytes(500), "model/gltf-binary", "d.glb", 500)
        .await
        .unwrap();
    blobs.put("keep.png", b"k", "image/png", "keep.png", 1).await.unwrap();

    blobs.delete("d.glb").await.unwrap();
    let after_first = blobs.store().snapshot();
    blobs.delete("d.glb").await.unwrap();
    assert_eq!(blobs.store().snapshot(), after_first);

    assert!(after_first.keys().all(|k| !k.contains("d.glb")));
    assert!(matches!(blobs.get("d.glb").await, Err(Error::NotFound(_))));
    assert_eq!(blobs.get("keep.png").await.unwrap().as_ref(), b"k");
    assert_index_consistent(blobs.store());
}

#[tokio::test]
async fn test_delete_never_uploaded() {
    let blobs = BlobStore::new(MemoryStore::new(), Config::default()).unwrap();
    blobs.delete("ghost.png").await.unwrap();
    assert!(blobs.store().is_empty());
}

#[tokio::test]
async fn test_index_consistent_after_mixed_operations() {
    let config = Config {
        max_value_size: 200,
        chunk_size: 64,
        ..Default::default()
    };
    let blobs = BlobStore::new(MemoryStore::new(), config).unwrap();

    blobs.put("a.png", &sample_bytes(10), "image/png", "a.png", 10).await.unwrap();
    blobs.put("b.glb", &sample_bytes(400), "model/gltf-binary", "b.glb", 400).await.unwrap();
    blobs.put("c.svg", &sample_bytes(60), "image/svg+xml", "c.svg", 60).await.unwrap();
    blobs.delete("a.png").await.unwrap();
    blobs.put("b.glb", &sample_bytes(5), "model/gltf-binary", "b.glb", 5).await.unwrap();
    blobs.delete("c.svg").await.unwrap();
    blobs.put("d.png", &sample_bytes(40), "image/png", "d.png", 40).await.unwrap();

    assert_index_consistent(blobs.store());
    let names: Vec<String> = blobs.list().await.unwrap().into_iter().map(|d| d.filename).collect();
    assert_eq!(names, vec!["d.png", "b.glb"]);
    assert!(blobs.store().keys().iter().all(|k| !k.contains(":chunk:")));
}

// ============================================================================
// Interrupted Writes
// ============================================================================

#[tokio::test]
async fn test_partial_put_reports_keys_and_is_recoverable() {
    let config = Config {
        max_value_size: 100,
        chunk_size: 40,
        ..Default::default()
    };
    let store = Arc::new(FaultyStore::new());
    store.fail_puts("image:p.glb:chunk:2", 1);
    let blobs = BlobStore::new(store.clone(), config).unwrap();
    let data = sample_bytes(300);

    let err = blobs
        .put("p.glb", &data, "model/gltf-binary", "p.glb", 300)
        .await
        .unwrap_err();
    assert_eq!(err.failed_keys(), vec!["image:p.glb:chunk:2"]);
    // The index is only written after every data key landed
    assert!(!store.inner.contains("images:index"));
    assert!(matches!(blobs.get("p.glb").await, Err(Error::CorruptBlob(_))));

    // Retrying the same put repairs the blob
    blobs
        .put("p.glb", &data, "model/gltf-binary", "p.glb", 300)
        .await
        .unwrap();
    assert_eq!(blobs.get("p.glb").await.unwrap().as_ref(), data.as_slice());
    assert_index_consistent(&store.inner);
}

#[tokio::test]
async fn test_failed_shrinking_put_leaves_no_orphan_chunks() {
    let config = Config {
        max_value_size: 100,
        chunk_size: 40,
        ..Default::default()
    };
    let store = Arc::new(FaultyStore::new());
    let blobs = BlobStore::new(store.clone(), config).unwrap();

    // 300 bytes -> 400 characters -> 10 chunks
    blobs
        .put("p.glb", &sample_bytes(300), "model/gltf-binary", "p.glb", 300)
        .await
        .unwrap();

    // 60 bytes -> 80 characters -> 2 chunks; the new metadata lands
    store.fail_puts("image:p.glb:chunk:1", 1);
    let small = sample_bytes(60);
    assert!(blobs
        .put("p.glb", &small, "model/gltf-binary", "p.glb", 60)
        .await
        .is_err());
    assert!(store.inner.keys().iter().all(|k| !k.starts_with("image:p.glb:chunk:9")));

    blobs
        .put("p.glb", &small, "model/gltf-binary", "p.glb", 60)
        .await
        .unwrap();
    assert_eq!(blobs.get("p.glb").await.unwrap().as_ref(), small.as_slice());

    blobs.delete("p.glb").await.unwrap();
    assert!(store.inner.keys().iter().all(|k| !k.contains(":chunk:")));
    assert_index_consistent(&store.inner);
}

#[tokio::test]
async fn test_delete_after_partial_put() {
    let config = Config {
        max_value_size: 100,
        chunk_size: 40,
        ..Default::default()
    };
    let store = Arc::new(FaultyStore::new());
    store.always_fail("image:q.glb:chunk:1");
    let blobs = BlobStore::new(store.clone(), config).unwrap();

    assert!(blobs
        .put("q.glb", &sample_bytes(300), "model/gltf-binary", "q.glb", 300)
        .await
        .is_err());
    blobs.delete("q.glb").await.unwrap();

    assert!(store.inner.keys().iter().all(|k| !k.contains("q.glb")));
    assert_index_consistent(&store.inner);
}

// ============================================================================
// Usage Tracking
// ============================================================================

#[tokio::test]
async fn test_list_usage_cross_references_records() {
    let blobs = BlobStore::new(MemoryStore::new(), Config::default()).unwrap();
    for name in ["cover.png", "inline.webp", "logo.svg", "nav.ico", "orphan.gif"] {
        blobs.put(name, b"x", "image/png", name, 1).await.unwrap();
    }

    let store = blobs.store();
    store
        .put(
            "posts:index",
            r#"[{"id":"p1","title":"First","cover":"/uploads/cover.png"},{"id":"p2"}]"#,
        )
        .await
        .unwrap();
    store
        .put("post:p1", r#"{"content":"![pic](/uploads/inline.webp) text"}"#)
        .await
        .unwrap();
    store.put("post:p2", "not json").await.unwrap();
    store
        .put("site:settings", r#"{"title":"Blog","logo":"/uploads/logo.svg"}"#)
        .await
        .unwrap();
    store
        .put("nav:links", r#"[{"name":"Home","url":"/","image":"/uploads/nav.ico"}]"#)
        .await
        .unwrap();

    let usage = blobs.list_usage().await.unwrap();
    assert_eq!(usage.len(), 5);
    for entry in &usage {
        assert_eq!(entry.url, format!("/uploads/{}", entry.descriptor.filename));
        assert_eq!(
            entry.used,
            entry.descriptor.filename != "orphan.gif",
            "{}",
            entry.descriptor.filename
        );
    }

    // Informational only: nothing was removed
    assert_eq!(blobs.get("orphan.gif").await.unwrap().as_ref(), b"x");
}
