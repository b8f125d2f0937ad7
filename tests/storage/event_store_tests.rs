//! EventStore interface tests.
//!
//! These tests verify the contract of the EventStore trait.
//! Each storage implementation should run these tests.
//!
//! Stores may be shared with earlier runs, so every test works on fresh
//! stream ids and measures store revisions relative to where it started.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use memimage::interfaces::read_stream_all;
use memimage::posts::{PostEvent, PostId};
use memimage::test_utils::{
    assert_quiet, collect, post_added_with_id, post_deleted, post_edited, ChannelListener,
};
use memimage::{CommitResult, EventStore, StoreError, StoreRevision, StreamRevision};

fn revisions<E>(commits: &[Arc<memimage::Commit<E>>]) -> Vec<u64> {
    commits.iter().map(|c| c.store_revision.value()).collect()
}

// =============================================================================
// EventStore::try_commit tests
// =============================================================================

pub async fn test_commit_to_new_stream<S: EventStore<PostEvent>>(store: &S) {
    let base = store.store_revision().await.expect("store_revision should succeed");
    let id = PostId::generate();
    let event = post_added_with_id(id, "Paul", "Hello", "World");

    let result = store
        .try_commit(&id.to_string(), StreamRevision::INITIAL, event.clone())
        .await
        .expect("commit should succeed");

    let commit = result.commit().expect("should be a commit");
    assert_eq!(commit.stream_id, id.to_string());
    assert_eq!(commit.stream_revision, StreamRevision::new(1));
    assert_eq!(commit.store_revision, base.next());
    assert_eq!(commit.events, vec![event]);
    assert!(commit.timestamp > 0, "timestamp should be set");
}

pub async fn test_commit_sequential_revisions<S: EventStore<PostEvent>>(store: &S) {
    let id = PostId::generate();
    let stream = id.to_string();

    let mut last_store = StoreRevision::INITIAL;
    for expected in 0..4u64 {
        let commit = store
            .try_commit(&stream, StreamRevision::new(expected), post_edited(id, "a", "t", "b"))
            .await
            .expect("commit should succeed")
            .into_commit()
            .expect("should be a commit");
        assert_eq!(commit.stream_revision, StreamRevision::new(expected + 1));
        assert!(commit.store_revision > last_store, "store revision should grow");
        last_store = commit.store_revision;
    }

    assert_eq!(
        store.stream_revision(&stream).await.expect("stream_revision should succeed"),
        StreamRevision::new(4)
    );
}

pub async fn test_commit_conflict<S: EventStore<PostEvent>>(store: &S) {
    let id = PostId::generate();
    let stream = id.to_string();
    let first = store
        .try_commit(
            &stream,
            StreamRevision::INITIAL,
            post_added_with_id(id, "Paul", "Hello", "World"),
        )
        .await
        .expect("commit should succeed")
        .into_commit()
        .expect("should be a commit");
    let head = store.store_revision().await.expect("store_revision should succeed");

    let result = store
        .try_commit(&stream, StreamRevision::INITIAL, post_added_with_id(id, "Paul", "Other", ""))
        .await
        .expect("conflict is not an error");

    let conflict = result.into_conflict().expect("should be a conflict");
    assert_eq!(conflict.stream_id, stream);
    assert_eq!(conflict.actual, StreamRevision::new(1));
    assert_eq!(conflict.expected, StreamRevision::INITIAL);
    assert_eq!(conflict.conflicting, vec![first]);
    assert_eq!(
        store.store_revision().await.expect("store_revision should succeed"),
        head,
        "a conflict must not append"
    );
}

pub async fn test_commit_conflict_after_expected<S: EventStore<PostEvent>>(store: &S) {
    let id = PostId::generate();
    let stream = id.to_string();
    for expected in 0..3u64 {
        store
            .try_commit(&stream, StreamRevision::new(expected), post_edited(id, "a", "t", "b"))
            .await
            .expect("commit should succeed");
    }

    let conflict = store
        .try_commit(&stream, StreamRevision::new(1), post_deleted(id))
        .await
        .expect("conflict is not an error")
        .into_conflict()
        .expect("should be a conflict");

    let stream_revisions: Vec<u64> = conflict
        .conflicting
        .iter()
        .map(|c| c.stream_revision.value())
        .collect();
    assert_eq!(stream_revisions, vec![2, 3]);
    assert_eq!(conflict.actual, StreamRevision::new(3));
}

pub async fn test_commit_expected_ahead_fails<S: EventStore<PostEvent>>(store: &S) {
    let id = PostId::generate();

    let result = store
        .try_commit(&id.to_string(), StreamRevision::new(1), post_deleted(id))
        .await;

    match result {
        Err(StoreError::InvalidRevision {
            expected, actual, ..
        }) => {
            assert_eq!(expected, StreamRevision::new(1));
            assert_eq!(actual, StreamRevision::INITIAL);
        }
        other => panic!("expected InvalidRevision, got {:?}", other.map(|r| r.is_commit())),
    }
}

pub async fn test_concurrent_commits_single_winner<S: EventStore<PostEvent>>(store: &S) {
    let id = PostId::generate();
    let stream = id.to_string();

    let attempts = (0..2).map(|i| {
        let event = post_added_with_id(id, "writer", &format!("title {}", i), "");
        store.try_commit(&stream, StreamRevision::INITIAL, event)
    });
    let results = join_all(attempts).await;

    let mut commits = 0;
    let mut conflicts = 0;
    for result in results {
        match result.expect("commit should not fail") {
            CommitResult::Commit(commit) => {
                assert_eq!(commit.stream_revision, StreamRevision::new(1));
                commits += 1;
            }
            CommitResult::Conflict(conflict) => {
                assert_eq!(conflict.actual, StreamRevision::new(1));
                assert_eq!(conflict.expected, StreamRevision::INITIAL);
                conflicts += 1;
            }
        }
    }
    assert_eq!((commits, conflicts), (1, 1));
}

// =============================================================================
// EventStore reader tests
// =============================================================================

pub async fn test_unknown_stream_is_empty<S: EventStore<PostEvent>>(store: &S) {
    let stream = PostId::generate().to_string();

    assert_eq!(
        store.stream_revision(&stream).await.expect("stream_revision should succeed"),
        StreamRevision::INITIAL
    );
    assert!(read_stream_all(store, &stream)
        .await
        .expect("read_stream should succeed")
        .is_empty());
}

pub async fn test_read_commits_range<S: EventStore<PostEvent>>(store: &S) {
    let base = store.store_revision().await.expect("store_revision should succeed");
    let mut written = Vec::new();
    for _ in 0..4 {
        let id = PostId::generate();
        let commit = store
            .try_commit(
                &id.to_string(),
                StreamRevision::INITIAL,
                post_added_with_id(id, "a", "t", ""),
            )
            .await
            .expect("commit should succeed")
            .into_commit()
            .expect("should be a commit");
        written.push(commit);
    }

    let all = store
        .read_commits(base, StoreRevision::MAXIMUM)
        .await
        .expect("read_commits should succeed");
    assert_eq!(all, written, "reads should return exactly what was committed");

    let middle = store
        .read_commits(base + 1, base + 3)
        .await
        .expect("read_commits should succeed");
    assert_eq!(middle, written[1..3].to_vec());

    assert!(store
        .read_commits(base + 2, base + 2)
        .await
        .expect("read_commits should succeed")
        .is_empty());
    assert!(store
        .read_commits(base + 100, StoreRevision::MAXIMUM)
        .await
        .expect("read_commits should succeed")
        .is_empty());
}

pub async fn test_read_stream_range<S: EventStore<PostEvent>>(store: &S) {
    let id = PostId::generate();
    let stream = id.to_string();
    for expected in 0..5u64 {
        store
            .try_commit(&stream, StreamRevision::new(expected), post_edited(id, "a", "t", "b"))
            .await
            .expect("commit should succeed");
    }

    let slice = store
        .read_stream(&stream, StreamRevision::new(1), StreamRevision::new(3))
        .await
        .expect("read_stream should succeed");
    let stream_revisions: Vec<u64> = slice.iter().map(|c| c.stream_revision.value()).collect();
    assert_eq!(stream_revisions, vec![2, 3]);

    let all = read_stream_all(store, &stream)
        .await
        .expect("read_stream should succeed");
    assert_eq!(all.len(), 5);
    assert!(all.iter().all(|c| c.stream_id == stream));
    assert!(all.windows(2).all(|w| w[0].store_revision < w[1].store_revision));
}

// =============================================================================
// EventStore::subscribe tests
// =============================================================================

pub async fn test_subscribe_history_then_live<S: EventStore<PostEvent>>(store: &S) {
    let base = store.store_revision().await.expect("store_revision should succeed");
    let id = PostId::generate();
    let stream = id.to_string();
    store
        .try_commit(&stream, StreamRevision::new(0), post_added_with_id(id, "a", "t", ""))
        .await
        .expect("commit should succeed");

    let (listener, mut rx) = ChannelListener::<PostEvent>::new();
    let subscription = store
        .subscribe(base, listener)
        .await
        .expect("subscribe should succeed");

    store
        .try_commit(&stream, StreamRevision::new(1), post_deleted(id))
        .await
        .expect("commit should succeed");

    let received = collect(&mut rx, 2).await;
    assert_eq!(revisions(&received), vec![base.value() + 1, base.value() + 2]);
    assert!(matches!(received[1].events[0], PostEvent::PostDeleted { .. }));

    subscription.cancel();
}

pub async fn test_subscribe_concurrent_writers<S: EventStore<PostEvent>>(store: &S) {
    let base = store.store_revision().await.expect("store_revision should succeed");
    let (listener, mut rx) = ChannelListener::<PostEvent>::new();
    let subscription = store
        .subscribe(base, listener)
        .await
        .expect("subscribe should succeed");

    let writers = (0..4).map(|_| async move {
        for _ in 0..5 {
            let id = PostId::generate();
            store
                .try_commit(
                    &id.to_string(),
                    StreamRevision::INITIAL,
                    post_added_with_id(id, "a", "t", ""),
                )
                .await
                .expect("commit should succeed");
        }
    });
    join_all(writers).await;

    let received = collect(&mut rx, 20).await;
    let expected: Vec<u64> = (base.value() + 1..=base.value() + 20).collect();
    assert_eq!(revisions(&received), expected);
    assert_quiet(&mut rx, Duration::from_millis(100)).await;

    subscription.cancel();
}

pub async fn test_subscription_cancel<S: EventStore<PostEvent>>(store: &S) {
    let base = store.store_revision().await.expect("store_revision should succeed");
    let (listener, mut rx) = ChannelListener::<PostEvent>::new();
    let subscription = store
        .subscribe(base, listener)
        .await
        .expect("subscribe should succeed");

    subscription.cancel();
    tokio::time::timeout(Duration::from_secs(5), subscription.join())
        .await
        .expect("subscription task should stop")
        .expect("subscription task should exit cleanly");

    let id = PostId::generate();
    store
        .try_commit(&id.to_string(), StreamRevision::INITIAL, post_deleted(id))
        .await
        .expect("commit should succeed");
    assert_quiet(&mut rx, Duration::from_millis(100)).await;
}

// =============================================================================
// EventStore::close tests
// =============================================================================

/// Closes the store, so it must run last.
pub async fn test_close<S: EventStore<PostEvent>>(store: &S) {
    let base = store.store_revision().await.expect("store_revision should succeed");
    let (listener, _rx) = ChannelListener::<PostEvent>::new();
    let subscription = store
        .subscribe(base, listener)
        .await
        .expect("subscribe should succeed");

    store.close().await.expect("close should succeed");
    tokio::time::timeout(Duration::from_secs(5), subscription.join())
        .await
        .expect("close should stop subscriptions")
        .expect("subscription task should exit cleanly");

    let id = PostId::generate();
    let result = store
        .try_commit(&id.to_string(), StreamRevision::INITIAL, post_deleted(id))
        .await;
    assert!(matches!(result, Err(StoreError::Closed)));
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all EventStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_event_store_tests {
    ($store:expr) => {
        use $crate::storage::event_store_tests::*;

        // try_commit tests
        test_commit_to_new_stream($store).await;
        println!("  test_commit_to_new_stream: PASSED");

        test_commit_sequential_revisions($store).await;
        println!("  test_commit_sequential_revisions: PASSED");

        test_commit_conflict($store).await;
        println!("  test_commit_conflict: PASSED");

        test_commit_conflict_after_expected($store).await;
        println!("  test_commit_conflict_after_expected: PASSED");

        test_commit_expected_ahead_fails($store).await;
        println!("  test_commit_expected_ahead_fails: PASSED");

        test_concurrent_commits_single_winner($store).await;
        println!("  test_concurrent_commits_single_winner: PASSED");

        // reader tests
        test_unknown_stream_is_empty($store).await;
        println!("  test_unknown_stream_is_empty: PASSED");

        test_read_commits_range($store).await;
        println!("  test_read_commits_range: PASSED");

        test_read_stream_range($store).await;
        println!("  test_read_stream_range: PASSED");

        // subscribe tests
        test_subscribe_history_then_live($store).await;
        println!("  test_subscribe_history_then_live: PASSED");

        test_subscribe_concurrent_writers($store).await;
        println!("  test_subscribe_concurrent_writers: PASSED");

        test_subscription_cancel($store).await;
        println!("  test_subscription_cancel: PASSED");

        // close tests
        test_close($store).await;
        println!("  test_close: PASSED");
    };
}
