use anyhow::Result;
use chrono::Utc;
use entity::post;
use platform_authz::{
    Subject,
    roles::{ADMIN, MODERATOR},
};
use platform_db::{DbPool, NewPost, NewSubject, PostStore, RoleStore};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct SeededRecords {
    pub subjects: Vec<SeededSubject>,
    pub post_id: Option<uuid::Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SeededSubject {
    pub email: String,
    #[serde(flatten)]
    pub subject: Subject,
}

const SEED_USERS: [(&str, &str, &[&str]); 3] = [
    ("alice@example.test", "Alice", &[]),
    ("bob@example.test", "Bob", &[ADMIN]),
    ("carol@example.test", "Carol", &[MODERATOR]),
];

/// Subjects that already exist are reported, not recreated. The demo post
/// is only written alongside a freshly created owner.
pub async fn run(pool: &DbPool, default_role: &str) -> Result<SeededRecords> {
    let roles = RoleStore::new(pool.clone()).with_default_role(default_role)?;
    let posts = PostStore::new(pool.clone());

    let mut subjects = Vec::new();
    let mut owner_created = false;
    for (idx, (email, name, seed_roles)) in SEED_USERS.into_iter().enumerate() {
        let subject = match roles.find_by_email(email).await? {
            Some(existing) => roles.find_subject(existing.id).await?,
            None => {
                owner_created |= idx == 0;
                roles
                    .create_subject(NewSubject {
                        email: email.to_string(),
                        display_name: name.to_string(),
                        roles: seed_roles.iter().map(|r| r.to_string()).collect(),
                    })
                    .await?
            }
        };
        subjects.push(SeededSubject {
            email: email.to_string(),
            subject,
        });
    }

    let post_id = if owner_created {
        Some(seed_post(&posts, &subjects[0].subject).await?.id)
    } else {
        None
    };

    info!(subjects = subjects.len(), post = ?post_id, "seed complete");
    Ok(SeededRecords { subjects, post_id })
}

async fn seed_post(posts: &PostStore, owner: &Subject) -> Result<post::Model> {
    let category = posts.create_category("General").await?;
    let tag = posts.create_tag("announcements").await?;
    let post = posts
        .create(NewPost {
            owner_id: Some(owner.id),
            category_id: Some(category.id),
            title: Some("Hello, blog".into()),
            body: Some("The first post, owned by a plain user.".into()),
            published_at: Some(Utc::now()),
            tag_ids: vec![tag.id],
        })
        .await?;
    Ok(post)
}
