//! Point, wildcard and tag lookups.

use grove_core::{NewPost, Tags};
use grove_test_utils::fixtures::Harness;
use grove_test_utils::generators::arb_raw_tags;
use proptest::prelude::*;

#[tokio::test]
async fn test_find_by_uid_uses_id_as_default_oid() {
    let h = Harness::new();
    let post = h.grove.posts().create(NewPost::at_path("a.b")).await.unwrap();
    let uid = format!("post:a.b${}", post.id);
    assert_eq!(post.uid().to_string(), uid);

    let found = h.grove.posts().find_by_uid(&uid).await.unwrap();
    assert_eq!(found.id, post.id);

    let err = h.grove.posts().find_by_uid("post:a.b$missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_find_by_uid_returns_soft_deleted() {
    let h = Harness::new();
    let post = h
        .grove
        .posts()
        .create(NewPost::with_uid("note:a$doc1"))
        .await
        .unwrap();
    h.grove.posts().soft_delete(&post).await.unwrap();

    let found = h.grove.posts().find_by_uid("note:a$doc1").await.unwrap();
    assert!(found.deleted);
    assert!(h
        .grove
        .posts()
        .find_all_by_wildcard_uid("note:a$doc1")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_wildcard_uid_by_oid() {
    let h = Harness::new();
    let posts = h.grove.posts();
    let first = posts.create(NewPost::with_uid("post:a.b$doc1")).await.unwrap();
    let second = posts.create(NewPost::with_uid("note:c$doc1")).await.unwrap();
    posts.create(NewPost::with_uid("post:a.b$doc2")).await.unwrap();

    let any_kind = posts.find_all_by_wildcard_uid("*:*$doc1").await.unwrap();
    let ids: Vec<_> = any_kind.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);

    let posts_only = posts.find_all_by_wildcard_uid("post:*$doc1").await.unwrap();
    assert_eq!(posts_only.len(), 1);
    assert_eq!(posts_only[0].id, first.id);

    let any_oid = posts.find_all_by_wildcard_uid("post:a.b").await.unwrap();
    assert_eq!(any_oid.len(), 2);
}

#[tokio::test]
async fn test_wildcard_uid_matches_extra_paths_once() {
    let h = Harness::new();
    let post = h
        .grove
        .posts()
        .create(NewPost::at_path("a.b").also_at("a.c").also_at("x"))
        .await
        .unwrap();

    let found = h
        .grove
        .posts()
        .find_all_by_wildcard_uid("post:a.*")
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, post.id);

    let by_extra = h.grove.posts().find_by_path("x").await.unwrap();
    assert_eq!(by_extra.len(), 1);
}

#[tokio::test]
async fn test_find_by_path_patterns() {
    let h = Harness::new();
    let posts = h.grove.posts();
    for path in ["a.b", "a.b.c", "a.b.c.d", "a.b.c.d.e", "a.x"] {
        posts.create(NewPost::at_path(path)).await.unwrap();
    }

    let count = move |pattern: &'static str| async move {
        posts.find_by_path(pattern).await.unwrap().len()
    };
    assert_eq!(count("a.b.*").await, 4);
    assert_eq!(count("a.b.^c.d").await, 3);
    assert_eq!(count("a.b|x").await, 2);
    assert_eq!(count("a").await, 0);

    let err = posts.find_by_path("a..b").await.unwrap_err();
    assert!(err.is_invalid_path());
}

#[tokio::test]
async fn test_invalid_paths_write_nothing() {
    let h = Harness::new();
    let err = h
        .grove
        .posts()
        .create(NewPost::at_path("a.b").also_at("x..y"))
        .await
        .unwrap_err();
    assert!(err.is_invalid_path());
    assert_eq!(h.store.post_count().unwrap(), 0);
    assert_eq!(h.store.location_count().unwrap(), 0);
    assert!(h.emitter.take().is_empty());
}

#[tokio::test]
async fn test_tags_are_normalized() {
    let h = Harness::new();
    let post = h
        .grove
        .posts()
        .create(NewPost::at_path("a").tags(vec!["bing", "Bang!"]))
        .await
        .unwrap();
    assert_eq!(post.tags, vec!["bing", "bang"]);

    let retagged = h
        .grove
        .posts()
        .set_tags(&post, "bing, padunk")
        .await
        .unwrap();
    assert_eq!(retagged.tags, vec!["bing", "padunk"]);
}

#[tokio::test]
async fn test_with_tags_requires_all() {
    let h = Harness::new();
    let posts = h.grove.posts();
    let both = posts
        .create(NewPost::at_path("a").tags("red, blue"))
        .await
        .unwrap();
    posts.create(NewPost::at_path("a").tags("red")).await.unwrap();
    let deleted = posts
        .create(NewPost::at_path("a").tags("red blue"))
        .await
        .unwrap();
    posts.soft_delete(&deleted).await.unwrap();

    let found = posts.with_tags(vec!["RED", "blue"]).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, both.id);
    assert_eq!(posts.with_tags("red").await.unwrap().len(), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_tag_normalization_is_idempotent(raw in arb_raw_tags()) {
        let once = Tags::normalize(raw);
        let twice = Tags::normalize(once.as_slice().to_vec());
        prop_assert_eq!(&once, &twice);
        for tag in once.as_slice() {
            prop_assert_eq!(tag, &tag.to_lowercase());
        }
    }
}
