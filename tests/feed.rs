mod common;

use classmates::{
    Error,
    backend::Backend,
    feed::{FeedState, MessageFeed, UNKNOWN_AUTHOR},
};
use common::{FlakyBackend, QUIET_PERIOD, backend, init_test_logging, signed_in, with_timeout};

/// True when the feed stays quiet for a while.
async fn nothing_more(feed: &mut MessageFeed) -> bool {
    tokio::time::timeout(QUIET_PERIOD, feed.next_live()).await.is_err()
}

#[tokio::test]
async fn mount_loads_history_in_order() {
    init_test_logging();
    let backend = backend().await;
    let ada = signed_in(&backend, "ada@example.com", "Ada").await;
    let grace = signed_in(&backend, "grace@example.com", "Grace").await;

    MessageFeed::for_session(&ada).unwrap().send("first").await.unwrap();
    MessageFeed::for_session(&grace).unwrap().send("second").await.unwrap();

    let mut feed = MessageFeed::for_session(&ada).unwrap();
    assert_eq!(feed.state(), FeedState::Uninitialized);
    feed.mount().await.unwrap();
    assert_eq!(feed.state(), FeedState::Live);

    let log: Vec<_> = feed
        .messages()
        .iter()
        .map(|m| (m.message.content.as_str(), m.display_name()))
        .collect();
    assert_eq!(log, [("first", "Ada"), ("second", "Grace")]);

    let again = feed.mount().await.unwrap_err();
    assert!(matches!(again, Error::Validation(_)), "{again:?}");
}

#[tokio::test]
async fn every_send_arrives_once_in_commit_order() {
    let backend = backend().await;
    let ada = signed_in(&backend, "ada@example.com", "Ada").await;

    let mut feed = MessageFeed::for_session(&ada).unwrap();
    feed.mount().await.unwrap();
    let before = feed.messages().len();

    let sender = feed.sender();
    for i in 0..5 {
        sender.send(&format!("message {i}")).await.unwrap();
    }

    for i in 0..5 {
        let message = with_timeout(feed.next_live()).await.unwrap();
        assert_eq!(message.message.content, format!("message {i}"));
        assert_eq!(message.display_name(), "Ada");
    }

    assert!(nothing_more(&mut feed).await);
    assert_eq!(feed.messages().len(), before + 5);

    let ids: Vec<_> = feed.messages().iter().map(|m| m.message.id).collect();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn concurrent_senders_are_seen_in_commit_order() {
    let backend = backend().await;
    let ada = signed_in(&backend, "ada@example.com", "Ada").await;
    let grace = signed_in(&backend, "grace@example.com", "Grace").await;

    let mut feed = MessageFeed::for_session(&ada).unwrap();
    feed.mount().await.unwrap();

    let senders = [
        MessageFeed::for_session(&ada).unwrap().sender(),
        MessageFeed::for_session(&grace).unwrap().sender(),
    ];
    let tasks: Vec<_> = senders
        .into_iter()
        .map(|sender| {
            tokio::spawn(async move {
                for i in 0..10 {
                    sender.send(&format!("{} {i}", sender.author_id())).await.unwrap();
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    for _ in 0..20 {
        with_timeout(feed.next_live()).await.unwrap();
    }
    assert!(nothing_more(&mut feed).await);

    let live: Vec<_> = feed.messages().iter().map(|m| m.message.id).collect();
    let committed: Vec<_> = backend
        .select_messages()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(live, committed);
}

#[tokio::test]
async fn two_feeds_each_see_one_hi() {
    let backend = backend().await;
    let ada = signed_in(&backend, "ada@example.com", "Ada").await;
    let grace = signed_in(&backend, "grace@example.com", "Grace").await;

    let mut ada_feed = MessageFeed::for_session(&ada).unwrap();
    let mut grace_feed = MessageFeed::for_session(&grace).unwrap();
    ada_feed.mount().await.unwrap();
    grace_feed.mount().await.unwrap();

    ada_feed.send("hi").await.unwrap();

    for feed in [&mut ada_feed, &mut grace_feed] {
        let message = with_timeout(feed.next_live()).await.unwrap();
        assert_eq!(message.message.content, "hi");
        assert_eq!(message.display_name(), "Ada");
        assert!(nothing_more(feed).await);

        let his: Vec<_> = feed
            .messages()
            .iter()
            .filter(|m| m.message.content == "hi")
            .collect();
        assert_eq!(his.len(), 1);
    }
}

#[tokio::test]
async fn nothing_is_appended_after_teardown() {
    let backend = backend().await;
    let ada = signed_in(&backend, "ada@example.com", "Ada").await;

    let mut feed = MessageFeed::for_session(&ada).unwrap();
    feed.mount().await.unwrap();
    let sender = feed.sender();

    feed.teardown();
    assert_eq!(feed.state(), FeedState::Closed);

    sender.send("too late").await.unwrap();
    assert!(with_timeout(feed.next_live()).await.is_none());
    assert!(feed.messages().is_empty());

    // a remount reloads history, including what was missed
    feed.mount().await.unwrap();
    assert_eq!(feed.messages().len(), 1);
}

#[tokio::test]
async fn teardown_handle_stops_a_waiting_feed() {
    let backend = backend().await;
    let ada = signed_in(&backend, "ada@example.com", "Ada").await;

    let mut feed = MessageFeed::for_session(&ada).unwrap();
    feed.mount().await.unwrap();
    let handle = feed.teardown_handle();

    let waiting = tokio::spawn(async move {
        let next = feed.next_live().await;
        (next, feed)
    });
    tokio::task::yield_now().await;
    handle.cancel();

    let (next, feed) = with_timeout(waiting).await.unwrap();
    assert!(next.is_none());
    assert_eq!(feed.state(), FeedState::Closed);
    assert!(feed.messages().is_empty());
}

#[tokio::test]
async fn messages_from_deleted_authors_are_kept() {
    let backend = backend().await;
    let ada = signed_in(&backend, "ada@example.com", "Ada").await;
    let ada_id = ada.user_id().unwrap();

    MessageFeed::for_session(&ada).unwrap().send("hello").await.unwrap();
    sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(backend.pool())
        .await
        .unwrap();
    sqlx::query("DELETE FROM profiles WHERE id = ?")
        .bind(ada_id.to_string())
        .execute(backend.pool())
        .await
        .unwrap();

    let mut feed = MessageFeed::new(backend.clone(), ada_id);
    feed.mount().await.unwrap();

    assert_eq!(feed.messages().len(), 1);
    assert_eq!(feed.messages()[0].author, None);
    assert_eq!(feed.messages()[0].display_name(), UNKNOWN_AUTHOR);
}

#[tokio::test]
async fn send_validation_and_failures() {
    let backend = backend().await;
    let ada = signed_in(&backend, "ada@example.com", "Ada").await;
    let feed = MessageFeed::for_session(&ada).unwrap();

    let empty = feed.send("   ").await.unwrap_err();
    assert!(matches!(empty, Error::Validation(_)), "{empty:?}");

    let long = "x".repeat(classmates::feed::MAX_MESSAGE_CHARS + 1);
    let too_long = feed.send(&long).await.unwrap_err();
    assert!(matches!(too_long, Error::Validation(_)), "{too_long:?}");

    backend.close().await;
    let failed = feed.send("hi").await.unwrap_err();
    assert!(matches!(failed, Error::Send(_)), "{failed:?}");
}

#[tokio::test]
async fn mount_fails_when_history_is_unavailable() {
    let backend = backend().await;
    let ada = signed_in(&backend, "ada@example.com", "Ada").await;
    let mut feed = MessageFeed::for_session(&ada).unwrap();

    backend.close().await;
    assert!(feed.mount().await.is_err());
    assert_eq!(feed.state(), FeedState::Uninitialized);
}

#[tokio::test]
async fn failed_author_lookup_shows_everyone_as_unknown() {
    let sqlite = backend().await;
    let ada = signed_in(&sqlite, "ada@example.com", "Ada").await;
    let grace = signed_in(&sqlite, "grace@example.com", "Grace").await;
    MessageFeed::for_session(&ada).unwrap().send("hello").await.unwrap();
    MessageFeed::for_session(&grace).unwrap().send("hi ada").await.unwrap();

    let backend = FlakyBackend::new(sqlite.clone());
    backend.fail_profiles(true);

    let mut feed = MessageFeed::new(backend.clone(), ada.user_id().unwrap());
    feed.mount().await.unwrap();

    assert_eq!(feed.state(), FeedState::Live);
    assert_eq!(feed.messages().len(), 2);
    for message in feed.messages() {
        assert_eq!(message.author, None);
        assert_eq!(message.display_name(), UNKNOWN_AUTHOR);
    }

    // live inserts look their author up one at a time
    feed.send("still here").await.unwrap();
    let live = with_timeout(feed.next_live()).await.unwrap();
    assert_eq!(live.display_name(), "Ada");
}

#[tokio::test]
async fn insert_that_cannot_be_refetched_is_skipped() {
    let sqlite = backend().await;
    let ada = signed_in(&sqlite, "ada@example.com", "Ada").await;
    let backend = FlakyBackend::new(sqlite.clone());

    let mut feed = MessageFeed::new(backend.clone(), ada.user_id().unwrap());
    feed.mount().await.unwrap();

    backend.hide_messages(true);
    feed.send("ghost").await.unwrap();
    assert!(nothing_more(&mut feed).await);
    assert!(feed.messages().is_empty());
    assert_eq!(feed.state(), FeedState::Live);

    backend.hide_messages(false);
    feed.send("real").await.unwrap();
    let live = with_timeout(feed.next_live()).await.unwrap();
    assert_eq!(live.message.content, "real");

    let contents: Vec<_> = feed.messages().iter().map(|m| m.message.content.as_str()).collect();
    assert_eq!(contents, ["real"]);
}
