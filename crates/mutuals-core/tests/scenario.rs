//! End-to-end flows through the engine on real stores.

use std::sync::Arc;
use std::thread;

use mutuals_core::error::{CONVERSATION_NOT_FOUND, MUTUAL_FOLLOW_REQUIRED};
use mutuals_core::{CoreError, Engine};
use mutuals_db::Database;
use mutuals_types::models::{FollowToggle, LikeToggle, NewMessage, NewPost, UserId};

fn register(engine: &Engine, name: &str) -> UserId {
    engine
        .register(name, &format!("{name}@example.com"), "argon2-hash")
        .unwrap()
        .id
}

fn text(content: &str) -> NewMessage {
    NewMessage {
        content: Some(content.into()),
        ..Default::default()
    }
}

#[test]
fn alice_and_bob() {
    let engine = Engine::new(Database::open_in_memory().unwrap());
    let alice = register(&engine, "alice");
    let bob = register(&engine, "bob");
    assert_eq!((alice, bob), (1, 2));

    assert_eq!(engine.toggle_follow(alice, bob).unwrap(), FollowToggle::Followed);
    assert_eq!(engine.user_by_id(bob).unwrap().rank, 1);
    assert!(!engine.is_mutual(alice, bob).unwrap());

    engine.toggle_follow(bob, alice).unwrap();
    assert!(engine.is_mutual(alice, bob).unwrap());

    let conv = engine.create_or_get_conversation(alice, bob).unwrap();
    assert_eq!(engine.create_or_get_conversation(bob, alice).unwrap(), conv);

    let sent = engine.send_message(alice, conv, text("hi")).unwrap();
    assert_eq!(sent.conversation_id, conv);
    let listed = engine.list_messages(bob, conv).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, sent.id);
    assert_eq!(listed[0].created_at, sent.created_at);

    // Bob unfollows Alice: the gate closes for both directions.
    assert_eq!(engine.toggle_follow(bob, alice).unwrap(), FollowToggle::Unfollowed);
    let err = engine.send_message(alice, conv, text("hello?")).unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(MUTUAL_FOLLOW_REQUIRED)));

    // The conversation stays listed with its last message.
    let summaries = engine.list_conversations(alice).unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].other_user.id, bob);
    let preview = summaries[0].last_message.as_ref().unwrap();
    assert_eq!(preview.content.as_deref(), Some("hi"));

    // Rank is historic: Alice's rank stays at 1 after losing Bob.
    assert_eq!(engine.user_by_id(alice).unwrap().rank, 1);
    assert_eq!(engine.user_stats(alice).unwrap().followers_count, 0);
}

#[test]
fn non_member_is_indistinguishable_from_missing() {
    let engine = Engine::new(Database::open_in_memory().unwrap());
    let alice = register(&engine, "alice");
    let bob = register(&engine, "bob");
    let eve = register(&engine, "eve");
    engine.toggle_follow(alice, bob).unwrap();
    engine.toggle_follow(bob, alice).unwrap();
    // Eve being mutual with both members does not let her in.
    for member in [alice, bob] {
        engine.toggle_follow(eve, member).unwrap();
        engine.toggle_follow(member, eve).unwrap();
    }
    let conv = engine.create_or_get_conversation(alice, bob).unwrap();

    for target in [conv, conv + 1000] {
        let err = engine.list_messages(eve, target).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(CONVERSATION_NOT_FOUND)));
        let err = engine.send_message(eve, target, text("let me in")).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(CONVERSATION_NOT_FOUND)));
    }
}

#[test]
fn concurrent_toggles_keep_graph_and_rank_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("mutuals.db"), 2).unwrap();
    let engine = Arc::new(Engine::new(db));
    let alice = register(&engine, "alice");
    let bob = register(&engine, "bob");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.toggle_follow(alice, bob).unwrap())
        })
        .collect();
    let outcomes: Vec<FollowToggle> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let followed = outcomes.iter().filter(|&&t| t == FollowToggle::Followed).count();
    assert_eq!(followed, 4);
    assert!(!engine.relationship(alice, bob).unwrap().is_following);
    assert_eq!(engine.user_stats(bob).unwrap().followers_count, 0);
    assert_eq!(engine.user_by_id(bob).unwrap().rank, 4);
}

#[test]
fn concurrent_like_toggles_stay_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("mutuals.db"), 2).unwrap();
    let engine = Arc::new(Engine::new(db));
    let alice = register(&engine, "alice");
    let bob = register(&engine, "bob");
    let post = engine
        .create_post(
            alice,
            NewPost {
                content: "like me".into(),
                ..Default::default()
            },
        )
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.toggle_like(bob, post.id).unwrap())
        })
        .collect();
    let outcomes: Vec<LikeToggle> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let liked = outcomes.iter().filter(|&&t| t == LikeToggle::Liked).count();
    assert_eq!(liked, 4);
    let feed = engine.list_posts(Some(bob)).unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].likes_count, 0);
    assert!(!feed[0].is_liked);

    // One more toggle must leave exactly one like row.
    engine.toggle_like(bob, post.id).unwrap();
    assert_eq!(engine.list_posts(None).unwrap()[0].likes_count, 1);
}

#[test]
fn concurrent_conversation_creation_yields_one_id() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("mutuals.db"), 2).unwrap();
    let engine = Arc::new(Engine::new(db));
    let alice = register(&engine, "alice");
    let bob = register(&engine, "bob");
    engine.toggle_follow(alice, bob).unwrap();
    engine.toggle_follow(bob, alice).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let (a, b) = if i % 2 == 0 { (alice, bob) } else { (bob, alice) };
            thread::spawn(move || engine.create_or_get_conversation(a, b).unwrap())
        })
        .collect();
    let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(engine.list_conversations(alice).unwrap().len(), 1);
}
