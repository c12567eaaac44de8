//! Cluster integration: writers route blocks to holder tasks, holders
//! persist shards, and the completion barrier makes it all durable
//! before `finish` returns.

use std::sync::Arc;

use bytes::Bytes;
use tempfile::TempDir;

use minato_core::{Error, TableConfig};
use minato_net::LocalCluster;
use minato_storage::{DiskTable, RecordStream, ShardCatalog, TableInfo};

fn config(threshold: usize, capacity: usize) -> TableConfig {
    TableConfig {
        write_enqueue_threshold: threshold,
        queue_capacity: capacity,
        barrier_timeout: None,
    }
}

fn pair(i: usize) -> (Bytes, Bytes) {
    (
        Bytes::from(format!("key-{:04}", i)),
        Bytes::from(format!("value-{:04}", i)),
    )
}

async fn write_pairs(cluster: &LocalCluster, info: TableInfo, cfg: TableConfig, n: usize) {
    let handle = Arc::new(cluster.handle());
    let table = DiskTable::new(info, cfg).unwrap();
    let mut writer = table.into_writer(handle.clone(), handle);
    for i in 0..n {
        let (k, v) = pair(i);
        writer.put(k, v).await;
    }
    writer.finish().await.unwrap();
}

async fn read_pairs(dir: &std::path::Path, table: &str) -> Vec<(Bytes, Bytes)> {
    let table = DiskTable::new(TableInfo::new(table, dir), config(2, 4)).unwrap();
    let mut reader = table.into_reader().await.unwrap();
    let mut pairs = Vec::new();
    while let Some(pair) = reader.next_pair().await {
        pairs.push(pair);
    }
    pairs
}

fn shard_numbers(dir: &std::path::Path, table: &str) -> Vec<u64> {
    let catalog = ShardCatalog::discover(&TableInfo::new(table, dir)).unwrap();
    catalog.shards().iter().map(|s| s.number).collect()
}

#[tokio::test]
async fn single_holder_round_trip() {
    let dir = TempDir::new().unwrap();
    let holder_dir = dir.path().join("h0");
    let cluster = LocalCluster::new();
    cluster.add_holder(&holder_dir).unwrap();

    write_pairs(
        &cluster,
        TableInfo::new("events", dir.path().join("unused")),
        config(2, 4),
        5,
    )
    .await;

    // One block number, three frames: two full and the partial one the
    // barrier flushed.
    let catalog = ShardCatalog::discover(&TableInfo::new("events", &holder_dir)).unwrap();
    assert_eq!(catalog.len(), 1);
    let frames: Vec<usize> = RecordStream::open(&catalog.shards()[0], "events")
        .unwrap()
        .map(|b| b.len())
        .collect();
    assert_eq!(frames, vec![2, 2, 1]);

    let expected: Vec<(Bytes, Bytes)> = (0..5).map(pair).collect();
    assert_eq!(read_pairs(&holder_dir, "events").await, expected);
}

#[tokio::test]
async fn blocks_partition_across_holders() {
    let dir = TempDir::new().unwrap();
    let holder_dirs: Vec<_> = (0..3).map(|i| dir.path().join(format!("h{}", i))).collect();
    let cluster = LocalCluster::new();
    for holder_dir in &holder_dirs {
        cluster.add_holder(holder_dir).unwrap();
    }

    let mut info = TableInfo::new("events", dir.path().join("unused"));
    info.max_block_size = 1;
    write_pairs(&cluster, info, config(1, 4), 4).await;

    // Block numbers 0..=3 over three holders: 3 % 3 wraps back to the
    // first one.
    assert_eq!(shard_numbers(&holder_dirs[0], "events"), vec![0, 3]);
    assert_eq!(shard_numbers(&holder_dirs[1], "events"), vec![1]);
    assert_eq!(shard_numbers(&holder_dirs[2], "events"), vec![2]);

    let first: Vec<Bytes> = read_pairs(&holder_dirs[0], "events")
        .await
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    assert_eq!(first, vec![pair(0).0, pair(3).0]);
}

#[tokio::test]
async fn fixed_destination_collects_everything_on_one_holder() {
    let dir = TempDir::new().unwrap();
    let holder_dirs: Vec<_> = (0..3).map(|i| dir.path().join(format!("h{}", i))).collect();
    let cluster = LocalCluster::new();
    for holder_dir in &holder_dirs {
        cluster.add_holder(holder_dir).unwrap();
    }

    let mut info = TableInfo::new("events", dir.path().join("unused"));
    info.max_block_size = 1;
    info.destination = Some(1);
    write_pairs(&cluster, info, config(1, 4), 4).await;

    assert!(shard_numbers(&holder_dirs[0], "events").is_empty());
    assert_eq!(shard_numbers(&holder_dirs[1], "events"), vec![0, 1, 2, 3]);
    assert!(shard_numbers(&holder_dirs[2], "events").is_empty());

    let expected: Vec<(Bytes, Bytes)> = (0..4).map(pair).collect();
    assert_eq!(read_pairs(&holder_dirs[1], "events").await, expected);
}

#[tokio::test]
async fn two_tables_share_a_cluster() {
    let dir = TempDir::new().unwrap();
    let holder_dir = dir.path().join("h0");
    let cluster = LocalCluster::new();
    cluster.add_holder(&holder_dir).unwrap();

    write_pairs(
        &cluster,
        TableInfo::new("events", dir.path().join("unused")),
        config(2, 4),
        4,
    )
    .await;
    write_pairs(
        &cluster,
        TableInfo::new("labels", dir.path().join("unused")),
        config(2, 4),
        2,
    )
    .await;

    assert_eq!(shard_numbers(&holder_dir, "events"), vec![0]);
    assert_eq!(shard_numbers(&holder_dir, "labels"), vec![0]);

    // Each table reads back only its own records.
    assert_eq!(read_pairs(&holder_dir, "events").await.len(), 4);
    assert_eq!(read_pairs(&holder_dir, "labels").await.len(), 2);
}

#[tokio::test]
async fn cluster_metrics_count_dumped_blocks() {
    let dir = TempDir::new().unwrap();
    let cluster = LocalCluster::new();
    cluster.add_holder(dir.path().join("h0")).unwrap();

    write_pairs(
        &cluster,
        TableInfo::new("events", dir.path().join("unused")),
        config(2, 4),
        5,
    )
    .await;

    // finish() returns only after the holders acknowledged, so the
    // dump counters are settled by now.
    assert_eq!(cluster.metrics().snapshot().blocks_dumped, 3);
}

#[tokio::test]
async fn holder_that_lost_a_block_refuses_the_barrier() {
    let dir = TempDir::new().unwrap();
    let holder_dir = dir.path().join("h0");
    let cluster = LocalCluster::new();
    cluster.add_holder(&holder_dir).unwrap();

    // The holder's directory vanishes before the first block arrives,
    // so persistence fails and finish must surface it instead of
    // acknowledging a write that never reached disk.
    std::fs::remove_dir_all(&holder_dir).unwrap();

    let handle = Arc::new(cluster.handle());
    let table = DiskTable::new(
        TableInfo::new("events", dir.path().join("unused")),
        config(1, 4),
    )
    .unwrap();
    let mut writer = table.into_writer(handle.clone(), handle);
    writer.put("k", "v").await;

    let err = writer.finish().await.unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
}

#[tokio::test]
async fn large_write_survives_partitioning_and_reassembly() {
    let dir = TempDir::new().unwrap();
    let holder_dirs: Vec<_> = (0..2).map(|i| dir.path().join(format!("h{}", i))).collect();
    let cluster = LocalCluster::new();
    for holder_dir in &holder_dirs {
        cluster.add_holder(holder_dir).unwrap();
    }

    let mut info = TableInfo::new("events", dir.path().join("unused"));
    info.max_block_size = 10;
    write_pairs(&cluster, info, config(3, 2), 100).await;

    // Reassemble from both holders; per-holder order is preserved, so
    // a sort by key recovers the full written set exactly once.
    let mut all = Vec::new();
    for holder_dir in &holder_dirs {
        all.extend(read_pairs(holder_dir, "events").await);
    }
    assert_eq!(all.len(), 100);
    all.sort();
    let mut expected: Vec<(Bytes, Bytes)> = (0..100).map(pair).collect();
    expected.sort();
    assert_eq!(all, expected);
}
