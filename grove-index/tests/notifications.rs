//! Payloads handed to the emitter for each committed post write.

use grove_core::{EventKind, NewPost, OwnerId, PostUpdate};
use grove_test_utils::assertions::assert_unread;
use grove_test_utils::fixtures::Harness;
use serde_json::{json, Value};

#[tokio::test]
async fn test_create_announces_every_path() {
    let h = Harness::new();
    let post = h
        .grove
        .posts()
        .create(NewPost::at_path("a.b").also_at("x.y"))
        .await
        .unwrap();

    let sent = h.emitter.take();
    assert_eq!(sent.len(), 2);
    let uids: Vec<&str> = sent.iter().map(|n| n.uid.as_str()).collect();
    assert!(uids.contains(&format!("post:a.b${}", post.id).as_str()));
    assert!(uids.contains(&format!("post:x.y${}", post.id).as_str()));
    for notification in &sent {
        assert_eq!(notification.event, EventKind::Create);
        assert_eq!(notification.attributes["version"], json!(1));
        assert!(notification.changed_attributes.is_none());
        assert!(notification.soft_deleted.is_none());
    }
}

#[tokio::test]
async fn test_update_carries_changed_attributes() {
    let h = Harness::new();
    let post = h
        .grove
        .posts()
        .create(
            NewPost::at_path("a.b")
                .published(false)
                .document(json!({"body": {"text": "one", "lang": "en"}})),
        )
        .await
        .unwrap();
    h.emitter.take();

    h.grove
        .posts()
        .update(
            &post,
            PostUpdate::default()
                .published(true)
                .document(json!({"body": {"text": "two", "lang": "en"}})),
        )
        .await
        .unwrap();

    let sent = h.emitter.take();
    assert_eq!(sent.len(), 1);
    let update = &sent[0];
    assert_eq!(update.event, EventKind::Update);
    assert_eq!(update.attributes["version"], json!(2));

    let changes = update.changed_attributes.as_ref().unwrap();
    assert_eq!(changes["published"], (Value::Bool(false), Value::Bool(true)));
    assert_eq!(
        changes["document"],
        (
            json!({"body": {"text": "one", "lang": "en"}}),
            json!({"body": {"text": "two", "lang": "en"}}),
        )
    );
    assert_eq!(changes["version"], (json!(1), json!(2)));
    assert!(!changes.contains_key("tags"));
    assert!(!changes.contains_key("updated_at"));
}

#[tokio::test]
async fn test_soft_delete_and_destroy_announce_delete() {
    let h = Harness::new();
    let post = h.grove.posts().create(NewPost::at_path("a")).await.unwrap();
    let deleted = h.grove.posts().soft_delete(&post).await.unwrap();

    let sent = h.emitter.take();
    let soft = sent.last().unwrap();
    assert_eq!(soft.event, EventKind::Delete);
    assert_eq!(soft.soft_deleted, Some(true));
    assert!(soft.changed_attributes.is_none());

    let restored = h.grove.posts().restore(&deleted).await.unwrap();
    let sent = h.emitter.take();
    assert_eq!(sent[0].event, EventKind::Update);
    assert_eq!(
        sent[0].changed_attributes.as_ref().unwrap()["deleted"],
        (Value::Bool(true), Value::Bool(false))
    );

    h.grove.posts().destroy(&restored).await.unwrap();
    let sent = h.emitter.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event, EventKind::Delete);
    assert!(sent[0].soft_deleted.is_none());
}

#[tokio::test]
async fn test_editing_deleted_post_announces_delete() {
    let h = Harness::new();
    h.grove.readmarks().watch(OwnerId(1), "a").await.unwrap();
    let post = h
        .grove
        .posts()
        .create(NewPost::at_path("a").also_at("b"))
        .await
        .unwrap();
    let deleted = h.grove.posts().soft_delete(&post).await.unwrap();
    h.emitter.take();

    let edited = h
        .grove
        .posts()
        .update(&deleted, PostUpdate::default().document(json!({"x": 1})))
        .await
        .unwrap();
    assert_eq!(edited.version, deleted.version + 1);

    let sent = h.emitter.take();
    assert_eq!(sent.len(), 2);
    for notification in &sent {
        assert_eq!(notification.event, EventKind::Delete);
        assert_eq!(notification.soft_deleted, Some(true));
        assert!(notification.changed_attributes.is_none());
        assert_eq!(notification.attributes["document"], json!({"x": 1}));
    }
    assert_unread(&h.grove, OwnerId(1), "a", 0).await;
}

#[tokio::test]
async fn test_noop_update_is_silent() {
    let h = Harness::new();
    let post = h
        .grove
        .posts()
        .create(NewPost::at_path("a").tags("x"))
        .await
        .unwrap();
    h.emitter.take();

    let same = h
        .grove
        .posts()
        .set_tags(&post, "X!")
        .await
        .unwrap();
    assert_eq!(same.version, post.version);
    assert!(h.emitter.take().is_empty());
}

#[tokio::test]
async fn test_emission_failure_keeps_the_write() {
    let h = Harness::new();
    h.grove.readmarks().watch(OwnerId(1), "a").await.unwrap();
    h.emitter.fail_emits(true);

    let post = h.grove.posts().create(NewPost::at_path("a.b")).await.unwrap();
    assert!(h.emitter.take().is_empty());

    let stored = h.grove.posts().find_by_id(post.id).await.unwrap();
    assert_eq!(stored, post);
    assert_unread(&h.grove, OwnerId(1), "a", 1).await;
}

#[tokio::test]
async fn test_stale_version_conflicts_without_fan_out() {
    let h = Harness::new();
    let post = h.grove.posts().create(NewPost::at_path("a")).await.unwrap();
    h.grove
        .posts()
        .update(&post, PostUpdate::default().published(false))
        .await
        .unwrap();
    h.emitter.take();

    let err = h
        .grove
        .posts()
        .update(&post, PostUpdate::default().published(true))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(h.emitter.take().is_empty());
}
