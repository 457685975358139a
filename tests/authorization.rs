use anyhow::Result;
use blog_tests::TestEnv;
use platform_authz::{
    AuthzError,
    posts::{CREATE, DESTROY, SHOW, UPDATE},
    roles::{ADMIN, MODERATOR},
};
use platform_db::{DbError, NewPost, Target};
use uuid::Uuid;

fn denial(err: DbError) -> AuthzError {
    match err {
        DbError::Authz(err) => err,
        other => panic!("expected authorization error, got {other:?}"),
    }
}

#[tokio::test]
async fn owner_shows_but_cannot_destroy() -> Result<()> {
    let env = TestEnv::new().await?;
    let s1 = env.subject("s1@example.test", &[]).await?;
    let r1 = env.post_owned_by(s1.id, "R1", &[]).await?;

    env.authorizer.authorize(s1.id, SHOW, Target::Post(r1.id)).await?;

    let err = env
        .authorizer
        .authorize(s1.id, DESTROY, Target::Post(r1.id))
        .await
        .unwrap_err();
    assert!(err.is_expected());
    assert_eq!(
        denial(err),
        AuthzError::NotAuthorized {
            subject_id: s1.id,
            action: DESTROY.into(),
            resource_type: "post".into(),
            resource_id: Some(r1.id.to_string()),
        }
    );
    Ok(())
}

#[tokio::test]
async fn admin_destroys_foreign_post() -> Result<()> {
    let env = TestEnv::new().await?;
    let s1 = env.subject("s1@example.test", &[]).await?;
    let s2 = env.subject("s2@example.test", &[ADMIN]).await?;
    let r1 = env.post_owned_by(s1.id, "R1", &[]).await?;

    env.authorizer.authorize(s2.id, DESTROY, Target::Post(r1.id)).await?;
    env.posts.delete(r1.id).await?;
    Ok(())
}

#[tokio::test]
async fn moderator_creates_but_cannot_update_foreign_post() -> Result<()> {
    let env = TestEnv::new().await?;
    let s1 = env.subject("s1@example.test", &[]).await?;
    let s3 = env.subject("s3@example.test", &[MODERATOR]).await?;
    let r1 = env.post_owned_by(s1.id, "R1", &[]).await?;
    let draft = NewPost::default();

    env.authorizer.authorize(s3.id, CREATE, Target::Draft(&draft)).await?;
    let err = env
        .authorizer
        .authorize(s3.id, UPDATE, Target::Post(r1.id))
        .await
        .unwrap_err();
    assert!(matches!(denial(err), AuthzError::NotAuthorized { .. }));
    Ok(())
}

#[tokio::test]
async fn unknown_action_is_reported() -> Result<()> {
    let env = TestEnv::new().await?;
    let s1 = env.subject("s1@example.test", &[]).await?;
    let r1 = env.post_owned_by(s1.id, "R1", &[]).await?;

    let err = env
        .authorizer
        .authorize(s1.id, "archive", Target::Post(r1.id))
        .await
        .unwrap_err();
    assert!(!err.is_expected());
    assert_eq!(
        denial(err),
        AuthzError::UnknownAction {
            resource_type: "post".into(),
            action: "archive".into(),
        }
    );
    Ok(())
}

#[tokio::test]
async fn role_changes_apply_to_the_next_check() -> Result<()> {
    let env = TestEnv::new().await?;
    let s1 = env.subject("s1@example.test", &[]).await?;
    let s4 = env.subject("s4@example.test", &[]).await?;
    let r1 = env.post_owned_by(s1.id, "R1", &[]).await?;

    assert!(
        env.authorizer
            .authorize(s4.id, DESTROY, Target::Post(r1.id))
            .await
            .is_err()
    );
    env.roles.grant(s4.id, ADMIN).await?;
    env.authorizer.authorize(s4.id, DESTROY, Target::Post(r1.id)).await?;
    env.roles.revoke(s4.id, ADMIN).await?;
    assert!(
        env.authorizer
            .authorize(s4.id, DESTROY, Target::Post(r1.id))
            .await
            .is_err()
    );
    Ok(())
}

#[tokio::test]
async fn ownership_changes_apply_to_the_next_check() -> Result<()> {
    let env = TestEnv::new().await?;
    let s1 = env.subject("s1@example.test", &[]).await?;
    let s5 = env.subject("s5@example.test", &[]).await?;
    let r1 = env.post_owned_by(s1.id, "R1", &[]).await?;

    let before = env.authorizer.decide(s5.id, UPDATE, Target::Post(r1.id)).await?;
    assert!(!before.allowed);

    env.posts
        .update(
            r1.id,
            platform_db::PostChanges {
                owner_id: Some(s5.id),
                ..Default::default()
            },
        )
        .await?;
    let after = env.authorizer.decide(s5.id, UPDATE, Target::Post(r1.id)).await?;
    assert!(after.allowed);
    assert_eq!(after.action, UPDATE);
    Ok(())
}

#[tokio::test]
async fn missing_subject_or_post_is_not_found() -> Result<()> {
    let env = TestEnv::new().await?;
    let s1 = env.subject("s1@example.test", &[]).await?;

    let err = env
        .authorizer
        .authorize(Uuid::new_v4(), SHOW, Target::Post(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound { entity: "user", .. }));

    let err = env
        .authorizer
        .authorize(s1.id, SHOW, Target::Post(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound { entity: "post", .. }));
    Ok(())
}

#[tokio::test]
async fn listing_follows_policy_scope() -> Result<()> {
    let env = TestEnv::new().await?;
    let s1 = env.subject("s1@example.test", &[]).await?;
    let s2 = env.subject("s2@example.test", &[ADMIN]).await?;
    let s3 = env.subject("s3@example.test", &[MODERATOR]).await?;
    let r1 = env.post_owned_by(s1.id, "R1", &[]).await?;
    let r2 = env.post_owned_by(s3.id, "R2", &[]).await?;

    let own: Vec<_> = env
        .authorizer
        .visible_posts(s1.id)
        .await?
        .into_iter()
        .map(|post| post.id)
        .collect();
    assert_eq!(own, vec![r1.id]);

    let mut all: Vec<_> = env
        .authorizer
        .visible_posts(s2.id)
        .await?
        .into_iter()
        .map(|post| post.id)
        .collect();
    all.sort();
    let mut expected = vec![r1.id, r2.id];
    expected.sort();
    assert_eq!(all, expected);
    Ok(())
}
