use anyhow::Result;
use blog_tests::{TestEnv, complete_post};
use chrono::{Duration, Utc};
use entity::post_tag;
use platform_db::{DbError, NewPost, PostChanges};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

fn validation_fields(err: DbError) -> Vec<&'static str> {
    match err {
        DbError::Validation(err) => err.field_names(),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn create_requires_every_mandatory_field() -> Result<()> {
    let env = TestEnv::new().await?;
    let owner = env.subject("alice@example.test", &[]).await?;
    let category = env.posts.create_category("General").await?;
    let complete = complete_post(owner.id, category.id, "Hello", vec![]);

    let cases: [(&str, NewPost); 5] = [
        ("title", NewPost { title: None, ..complete.clone() }),
        ("body", NewPost { body: Some("  ".into()), ..complete.clone() }),
        ("published_at", NewPost { published_at: None, ..complete.clone() }),
        ("owner", NewPost { owner_id: None, ..complete.clone() }),
        ("category", NewPost { category_id: None, ..complete.clone() }),
    ];
    for (field, input) in cases {
        let err = env.posts.create(input).await.unwrap_err();
        assert!(err.is_expected());
        assert_eq!(validation_fields(err), vec![field]);
    }

    let post = env.posts.create(complete).await?;
    assert_eq!(post.user_id, owner.id);
    assert_eq!(post.category_id, category.id);
    assert_eq!(env.posts.find(post.id).await?, post);
    Ok(())
}

#[tokio::test]
async fn dangling_references_are_validation_errors() -> Result<()> {
    let env = TestEnv::new().await?;
    let input = complete_post(Uuid::new_v4(), Uuid::new_v4(), "Orphan", vec![Uuid::new_v4()]);

    let err = env.posts.create(input).await.unwrap_err();
    assert_eq!(validation_fields(err), vec!["owner", "category", "tags"]);
    assert!(env.posts.list(platform_authz::Scope::All).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn delete_removes_tag_links() -> Result<()> {
    let env = TestEnv::new().await?;
    let owner = env.subject("alice@example.test", &[]).await?;
    let post = env.post_owned_by(owner.id, "Tagged", &["rust", "authz"]).await?;
    let other = env.post_owned_by(owner.id, "Untouched", &["misc"]).await?;

    assert_eq!(env.posts.tag_link_count(post.id).await?, 2);
    let names: Vec<_> = env
        .posts
        .tags_for(post.id)
        .await?
        .into_iter()
        .map(|tag| tag.name)
        .collect();
    assert_eq!(names, vec!["authz", "rust"]);

    env.posts.delete(post.id).await?;

    assert_eq!(env.posts.tag_link_count(post.id).await?, 0);
    let orphaned = post_tag::Entity::find()
        .filter(post_tag::Column::PostId.eq(post.id))
        .count(&env.db)
        .await?;
    assert_eq!(orphaned, 0);
    assert_eq!(env.posts.tag_link_count(other.id).await?, 1);
    assert!(matches!(
        env.posts.find(post.id).await,
        Err(DbError::NotFound { entity: "post", .. })
    ));
    Ok(())
}

#[tokio::test]
async fn deleting_a_missing_post_is_not_found() -> Result<()> {
    let env = TestEnv::new().await?;
    let err = env.posts.delete(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound { entity: "post", .. }));
    assert!(!err.is_expected());
    Ok(())
}

#[tokio::test]
async fn update_validates_and_replaces_tags() -> Result<()> {
    let env = TestEnv::new().await?;
    let owner = env.subject("alice@example.test", &[]).await?;
    let post = env.post_owned_by(owner.id, "Draft", &["old"]).await?;
    let fresh = env.posts.create_tag("fresh").await?;

    let err = env
        .posts
        .update(
            post.id,
            PostChanges {
                title: Some(String::new()),
                category_id: Some(Uuid::new_v4()),
                ..PostChanges::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(validation_fields(err), vec!["title", "category"]);
    assert_eq!(env.posts.find(post.id).await?.title, "Draft");

    let published_at = Utc::now() - Duration::days(1);
    let updated = env
        .posts
        .update(
            post.id,
            PostChanges {
                title: Some("  Final  ".into()),
                published_at: Some(published_at),
                tag_ids: Some(vec![fresh.id]),
                ..PostChanges::default()
            },
        )
        .await?;
    assert_eq!(updated.title, "Final");
    assert_eq!(updated.published_at.timestamp(), published_at.timestamp());
    let names: Vec<_> = env
        .posts
        .tags_for(post.id)
        .await?
        .into_iter()
        .map(|tag| tag.name)
        .collect();
    assert_eq!(names, vec!["fresh"]);
    Ok(())
}

#[tokio::test]
async fn category_and_tag_names_are_required() -> Result<()> {
    let env = TestEnv::new().await?;
    assert_eq!(
        validation_fields(env.posts.create_category(" ").await.unwrap_err()),
        vec!["name"]
    );
    assert_eq!(
        validation_fields(env.posts.create_tag("").await.unwrap_err()),
        vec!["name"]
    );
    let tag = env.posts.create_tag("  rust ").await?;
    assert_eq!(tag.name, "rust");
    Ok(())
}

#[tokio::test]
async fn duplicate_category_and_tag_names_are_validation_errors() -> Result<()> {
    let env = TestEnv::new().await?;
    env.posts.create_category("General").await?;
    env.posts.create_tag("announcements").await?;

    let err = env.posts.create_category("  General ").await.unwrap_err();
    assert!(err.is_expected());
    assert_eq!(validation_fields(err), vec!["name"]);

    let err = env.posts.create_tag("announcements").await.unwrap_err();
    assert!(err.is_expected());
    assert_eq!(validation_fields(err), vec!["name"]);
    Ok(())
}
