// tests/index_test.rs
//
// Vector index behavior: recall, deletion, capacity and snapshot
// round-trips.

use audioprint::cancel::CancelToken;
use audioprint::error::Error;
use audioprint::fingerprint::DescriptorVector;
use audioprint::index::{IndexConfig, TrackMetadata, VectorIndex};

fn meta(id: &str) -> TrackMetadata {
    TrackMetadata {
        track_id: id.to_string(),
        title: format!("title-{id}"),
        artist: "tester".to_string(),
        duration_s: 300.0,
        added_epoch: 1_700_000_000,
    }
}

/// Deterministic pseudo-random unit vector.
fn descriptor(seed: u32, ref_time_s: f64) -> DescriptorVector {
    let mut state = seed.wrapping_mul(2654435761).wrapping_add(40503);
    let mut values: Vec<f32> = (0..30)
        .map(|_| {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            (state >> 8) as f32 / (1u32 << 24) as f32
        })
        .collect();
    let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    for v in &mut values {
        *v /= norm;
    }
    DescriptorVector {
        values,
        ref_time_s,
    }
}

fn batch(range: std::ops::Range<u32>) -> Vec<DescriptorVector> {
    range.map(|i| descriptor(i, (i % 200) as f64)).collect()
}

#[test]
fn inserted_vectors_are_their_own_nearest_neighbor() {
    let mut index = VectorIndex::new(IndexConfig::default()).unwrap();
    let vectors = batch(0..500);
    index.add(meta("t1"), &vectors).unwrap();

    let mut misses = 0;
    for v in &vectors {
        let hits = index
            .search(std::slice::from_ref(v), 1, &CancelToken::new())
            .unwrap();
        assert_eq!(hits.len(), 1);
        if hits[0].score < 0.999 {
            misses += 1;
        }
    }
    // Perfect recall expected at these parameters; tolerate a stray miss
    // from the probabilistic layer assignment.
    assert!(misses <= 1, "{misses} self-lookups missed");
}

#[test]
fn search_results_carry_track_and_times() {
    let mut index = VectorIndex::new(IndexConfig::default()).unwrap();
    index.add(meta("t1"), &batch(0..50)).unwrap();

    let mut query = descriptor(7, 0.0);
    query.ref_time_s = 4.25;
    let hits = index.search(&[query], 3, &CancelToken::new()).unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].track_id, "t1");
    assert!((hits[0].query_time_s - 4.25).abs() < 1e-9);
    assert!((hits[0].ref_time_s - 7.0).abs() < 1e-9);
    assert!(hits[0].score > 0.999);
}

#[test]
fn delete_then_search_never_returns_the_track() {
    let mut index = VectorIndex::new(IndexConfig::default()).unwrap();
    index.add(meta("a"), &batch(0..100)).unwrap();
    index.add(meta("b"), &batch(1000..1100)).unwrap();

    index.delete("a").unwrap();

    let queries = batch(0..100);
    let hits = index.search(&queries, 5, &CancelToken::new()).unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.track_id == "b"));

    assert!(index.get("a").is_none());
    assert_eq!(index.list().len(), 1);
}

#[test]
fn capacity_exhaustion_reports_index_full() {
    let config = IndexConfig {
        max_elements: 10,
        ..IndexConfig::default()
    };
    let mut index = VectorIndex::new(config).unwrap();
    index.add(meta("t1"), &batch(0..10)).unwrap();
    assert!(matches!(
        index.add(meta("t2"), &batch(100..101)),
        Err(Error::IndexFull { capacity: 10 })
    ));
}

#[test]
fn snapshot_round_trip_preserves_search_results() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot");

    let mut index = VectorIndex::new(IndexConfig::default()).unwrap();
    index.add(meta("a"), &batch(0..150)).unwrap();
    index.add(meta("b"), &batch(500..650)).unwrap();
    index.add(meta("c"), &batch(900..1050)).unwrap();
    index.delete("b").unwrap();

    let queries = batch(2000..2020);
    let before = index.search(&queries, 5, &CancelToken::new()).unwrap();

    index.save(&path).unwrap();
    let restored = VectorIndex::load(&path).unwrap();
    let after = restored.search(&queries, 5, &CancelToken::new()).unwrap();

    assert_eq!(before.len(), after.len());
    for (x, y) in before.iter().zip(after.iter()) {
        assert_eq!(x.track_id, y.track_id);
        assert_eq!(x.matched_vector_id, y.matched_vector_id);
        assert!((x.score - y.score).abs() < 1e-9);
        assert!((x.ref_time_s - y.ref_time_s).abs() < 1e-9);
    }

    // Catalog state survives too, including the deletion.
    assert_eq!(restored.track_count(), 2);
    assert!(restored.get("b").is_none());
    assert_eq!(restored.get("a").unwrap().title, "title-a");
}

#[test]
fn load_rejects_foreign_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot");

    let mut index = VectorIndex::new(IndexConfig::default()).unwrap();
    index.add(meta("t1"), &batch(0..20)).unwrap();
    index.save(&path).unwrap();

    // Bump the version field in the header.
    let header_path = path.join("index.json");
    let mut header: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&header_path).unwrap()).unwrap();
    header["version"] = serde_json::json!(99);
    std::fs::write(&header_path, serde_json::to_vec(&header).unwrap()).unwrap();

    assert!(matches!(
        VectorIndex::load(&path),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn load_rejects_mismatched_magic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot");

    let mut index = VectorIndex::new(IndexConfig::default()).unwrap();
    index.add(meta("t1"), &batch(0..20)).unwrap();
    index.save(&path).unwrap();

    let header_path = path.join("index.json");
    let mut header: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&header_path).unwrap()).unwrap();
    header["magic"] = serde_json::json!("something-else");
    std::fs::write(&header_path, serde_json::to_vec(&header).unwrap()).unwrap();

    assert!(matches!(
        VectorIndex::load(&path),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn load_missing_directory_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist");
    assert!(matches!(VectorIndex::load(&path), Err(Error::Io(_))));
}
