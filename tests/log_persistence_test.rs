//! End-to-end persistence tests for the log store.
//!
//! These tests verify that data survives restarts by:
//! 1. Writing through a `LogStore` handle
//! 2. Stopping the store
//! 3. Reopening the same directory
//! 4. Verifying everything is recovered correctly

use rafter_log::{
    ClusterConfig, ConfigState, EntryKind, LogStore, LogStoreOptions, NewEntry, PeerId,
};
use tempfile::TempDir;

fn open(dir: &TempDir) -> LogStore {
    LogStore::open(
        PeerId::with_node("peer1", "node1"),
        LogStoreOptions::with_dir(dir.path()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_log_entries_survive_restart() {
    let dir = TempDir::new().unwrap();

    {
        let store = open(&dir);
        let last = store
            .append(vec![
                NewEntry::noop(1),
                NewEntry::op(1, b"set k1 v1".to_vec()),
                NewEntry::op(2, b"set k2 v2".to_vec()),
            ])
            .await
            .unwrap();
        assert_eq!(last, 3);
        store.stop().await.unwrap();
    }

    {
        let store = open(&dir);
        assert_eq!(store.get_last_index().await.unwrap(), 3);

        let entry = store.get_entry(2).await.unwrap().unwrap();
        assert_eq!(entry.kind, EntryKind::Op);
        assert_eq!(entry.term, 1);
        assert_eq!(entry.data, b"set k1 v1");

        let last = store.get_last_entry().await.unwrap().unwrap();
        assert_eq!(last.index, 3);
        assert_eq!(last.term, 2);

        // The reopened log keeps assigning indices where it left off.
        let next = store.append(vec![NewEntry::noop(2)]).await.unwrap();
        assert_eq!(next, 4);
        store.stop().await.unwrap();
    }
}

#[tokio::test]
async fn test_config_survives_restart() {
    let dir = TempDir::new().unwrap();
    let members = vec![PeerId::new("peer1"), PeerId::new("peer2"), PeerId::new("peer3")];

    {
        let store = open(&dir);
        store
            .append(vec![NewEntry::config(
                1,
                ClusterConfig::stable(members.clone()).serialize().unwrap(),
            )])
            .await
            .unwrap();
        store.stop().await.unwrap();
    }

    {
        let store = open(&dir);
        let config = store.get_config().await.unwrap();
        assert_eq!(config.state, ConfigState::Stable);
        assert_eq!(config.old_members, members);
        assert_eq!(config.quorum(), 2);
        store.stop().await.unwrap();
    }
}

#[tokio::test]
async fn test_metadata_survives_restart() {
    let dir = TempDir::new().unwrap();

    {
        let store = open(&dir);
        store
            .set_metadata(Some(PeerId::new("peer2")), 42)
            .await
            .unwrap();
        store.stop().await.unwrap();
    }

    {
        let store = open(&dir);
        let metadata = store.get_metadata().await.unwrap();
        assert_eq!(metadata.current_term, 42);
        assert_eq!(metadata.voted_for, Some(PeerId::new("peer2")));
        store.stop().await.unwrap();
    }
}

#[tokio::test]
async fn test_follower_truncation_survives_restart() {
    let dir = TempDir::new().unwrap();

    {
        let store = open(&dir);
        store
            .append(vec![
                NewEntry::noop(1),
                NewEntry::op(1, b"doomed".to_vec()),
                NewEntry::op(1, b"also doomed".to_vec()),
            ])
            .await
            .unwrap();

        // A leader at term 2 rewrites everything after index 1.
        let last = store
            .check_and_append(
                vec![rafter_log::Entry {
                    term: 2,
                    index: 2,
                    kind: EntryKind::Op,
                    data: b"kept".to_vec(),
                }],
                2,
            )
            .await
            .unwrap();
        assert_eq!(last, 2);
        store.stop().await.unwrap();
    }

    {
        let store = open(&dir);
        assert_eq!(store.get_last_index().await.unwrap(), 2);
        assert_eq!(
            store.get_entry(2).await.unwrap().unwrap().data,
            b"kept".to_vec()
        );
        assert_eq!(store.get_entry(3).await.unwrap(), None);
        assert_eq!(store.get_term(1).await.unwrap(), 1);
        assert_eq!(store.get_term(2).await.unwrap(), 2);
        store.stop().await.unwrap();
    }
}
