use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use entity::{category, post, post_tag, tag, user};
use platform_authz::{Resource, Scope, posts::POST};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
    prelude::DateTimeWithTimeZone,
};
use tracing::info;
use uuid::Uuid;

use crate::{DbError, DbResult, ValidationError};

const MAX_TITLE_LEN: usize = 256;
const MAX_NAME_LEN: usize = 64;

/// Post as submitted for creation. Every field but `tag_ids` is required;
/// they are optional here so a missing field surfaces as a validation error.
#[derive(Clone, Debug, Default)]
pub struct NewPost {
    pub owner_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub tag_ids: Vec<Uuid>,
}

/// Unsaved posts are authorized as a post without an id.
impl Resource for NewPost {
    fn resource_type(&self) -> &str {
        POST
    }

    fn resource_id(&self) -> Option<String> {
        None
    }

    fn owner_id(&self) -> Option<Uuid> {
        self.owner_id
    }
}

/// Partial update. `None` leaves the field untouched; `tag_ids` replaces
/// the whole tag set when present.
#[derive(Clone, Debug, Default)]
pub struct PostChanges {
    pub owner_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub tag_ids: Option<Vec<Uuid>>,
}

#[derive(Debug)]
struct ValidPost {
    owner_id: Uuid,
    category_id: Uuid,
    title: String,
    body: String,
    published_at: DateTimeWithTimeZone,
    tag_ids: BTreeSet<Uuid>,
}

#[derive(Clone, Debug)]
pub struct PostStore {
    db: DatabaseConnection,
}

impl PostStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create_category(&self, name: &str) -> DbResult<category::Model> {
        let name = validate_name("name", name)?;
        let txn = self.db.begin().await?;
        let taken = category::Entity::find()
            .filter(category::Column::Name.eq(name.as_str()))
            .one(&txn)
            .await?
            .is_some();
        if taken {
            return Err(ValidationError::single("name", "is already taken").into());
        }
        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;
        info!(category_id = %model.id, name = %model.name, "category created");
        Ok(model)
    }

    pub async fn create_tag(&self, name: &str) -> DbResult<tag::Model> {
        let name = validate_name("name", name)?;
        let txn = self.db.begin().await?;
        let taken = tag::Entity::find()
            .filter(tag::Column::Name.eq(name.as_str()))
            .one(&txn)
            .await?
            .is_some();
        if taken {
            return Err(ValidationError::single("name", "is already taken").into());
        }
        let model = tag::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;
        info!(tag_id = %model.id, name = %model.name, "tag created");
        Ok(model)
    }

    pub async fn create(&self, input: NewPost) -> DbResult<post::Model> {
        let valid = validate_new_post(input)?;

        let txn = self.db.begin().await?;
        let mut violations = ValidationError::default();
        check_references(
            &txn,
            Some(valid.owner_id),
            Some(valid.category_id),
            Some(&valid.tag_ids),
            &mut violations,
        )
        .await?;
        violations.into_result()?;

        let now: DateTimeWithTimeZone = Utc::now().into();
        let model = post::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(valid.owner_id),
            category_id: Set(valid.category_id),
            title: Set(valid.title),
            body: Set(valid.body),
            published_at: Set(valid.published_at),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        link_tags(&txn, model.id, &valid.tag_ids).await?;
        txn.commit().await?;

        info!(
            post_id = %model.id,
            owner_id = %model.user_id,
            tags = valid.tag_ids.len(),
            "post created"
        );
        Ok(model)
    }

    pub async fn find(&self, post_id: Uuid) -> DbResult<post::Model> {
        find_post(&self.db, post_id).await
    }

    pub async fn update(&self, post_id: Uuid, changes: PostChanges) -> DbResult<post::Model> {
        let mut violations = validate_changes(&changes);
        let tag_ids: Option<BTreeSet<Uuid>> = changes
            .tag_ids
            .as_ref()
            .map(|ids| ids.iter().copied().collect());

        let txn = self.db.begin().await?;
        let existing = find_post(&txn, post_id).await?;
        check_references(
            &txn,
            changes.owner_id,
            changes.category_id,
            tag_ids.as_ref(),
            &mut violations,
        )
        .await?;
        violations.into_result()?;

        let mut active: post::ActiveModel = existing.into();
        if let Some(owner_id) = changes.owner_id {
            active.user_id = Set(owner_id);
        }
        if let Some(category_id) = changes.category_id {
            active.category_id = Set(category_id);
        }
        if let Some(title) = &changes.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(body) = &changes.body {
            active.body = Set(body.trim().to_string());
        }
        if let Some(published_at) = changes.published_at {
            active.published_at = Set(published_at.into());
        }
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&txn).await?;

        if let Some(tag_ids) = &tag_ids {
            post_tag::Entity::delete_many()
                .filter(post_tag::Column::PostId.eq(post_id))
                .exec(&txn)
                .await?;
            link_tags(&txn, post_id, tag_ids).await?;
        }
        txn.commit().await?;

        info!(post_id = %post_id, "post updated");
        Ok(updated)
    }

    /// Removes the post and its tag links atomically.
    pub async fn delete(&self, post_id: Uuid) -> DbResult<()> {
        let txn = self.db.begin().await?;
        find_post(&txn, post_id).await?;
        let links = post_tag::Entity::delete_many()
            .filter(post_tag::Column::PostId.eq(post_id))
            .exec(&txn)
            .await?;
        post::Entity::delete_by_id(post_id).exec(&txn).await?;
        txn.commit().await?;

        info!(post_id = %post_id, tag_links = links.rows_affected, "post deleted");
        Ok(())
    }

    pub async fn tags_for(&self, post_id: Uuid) -> DbResult<Vec<tag::Model>> {
        let post = find_post(&self.db, post_id).await?;
        let mut tags = post.find_related(tag::Entity).all(&self.db).await?;
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    /// Join rows pointing at `post_id`, whether or not the post still exists.
    pub async fn tag_link_count(&self, post_id: Uuid) -> DbResult<u64> {
        Ok(post_tag::Entity::find()
            .filter(post_tag::Column::PostId.eq(post_id))
            .count(&self.db)
            .await?)
    }

    /// Posts inside `scope`, newest publication first.
    pub async fn list(&self, scope: Scope) -> DbResult<Vec<post::Model>> {
        let query = post::Entity::find()
            .order_by_desc(post::Column::PublishedAt)
            .order_by_asc(post::Column::Id);
        let query = match scope {
            Scope::All => query,
            Scope::OwnedBy(owner_id) => query.filter(post::Column::UserId.eq(owner_id)),
            Scope::Nothing => return Ok(Vec::new()),
        };
        Ok(query.all(&self.db).await?)
    }
}

async fn find_post<C>(conn: &C, post_id: Uuid) -> DbResult<post::Model>
where
    C: ConnectionTrait,
{
    post::Entity::find_by_id(post_id)
        .one(conn)
        .await?
        .ok_or_else(|| DbError::not_found("post", post_id))
}

async fn link_tags<C>(conn: &C, post_id: Uuid, tag_ids: &BTreeSet<Uuid>) -> DbResult<()>
where
    C: ConnectionTrait,
{
    if tag_ids.is_empty() {
        return Ok(());
    }
    let rows = tag_ids.iter().map(|tag_id| post_tag::ActiveModel {
        post_id: Set(post_id),
        tag_id: Set(*tag_id),
    });
    post_tag::Entity::insert_many(rows)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

/// Referenced rows must exist; missing ones are reported against the field
/// that named them.
async fn check_references<C>(
    conn: &C,
    owner_id: Option<Uuid>,
    category_id: Option<Uuid>,
    tag_ids: Option<&BTreeSet<Uuid>>,
    violations: &mut ValidationError,
) -> DbResult<()>
where
    C: ConnectionTrait,
{
    if let Some(owner_id) = owner_id {
        if user::Entity::find_by_id(owner_id).one(conn).await?.is_none() {
            violations.push("owner", "does not exist");
        }
    }
    if let Some(category_id) = category_id {
        if category::Entity::find_by_id(category_id)
            .one(conn)
            .await?
            .is_none()
        {
            violations.push("category", "does not exist");
        }
    }
    if let Some(tag_ids) = tag_ids.filter(|ids| !ids.is_empty()) {
        let found = tag::Entity::find()
            .filter(tag::Column::Id.is_in(tag_ids.iter().copied()))
            .count(conn)
            .await?;
        if found != tag_ids.len() as u64 {
            violations.push("tags", "reference unknown tags");
        }
    }
    Ok(())
}

fn validate_new_post(input: NewPost) -> Result<ValidPost, ValidationError> {
    let mut violations = ValidationError::default();
    let title = required_text(&mut violations, "title", input.title.as_deref());
    if let Some(title) = &title {
        check_title_length(&mut violations, title);
    }
    let body = required_text(&mut violations, "body", input.body.as_deref());
    if input.published_at.is_none() {
        violations.push("published_at", "is required");
    }
    if input.owner_id.is_none() {
        violations.push("owner", "is required");
    }
    if input.category_id.is_none() {
        violations.push("category", "is required");
    }

    match (title, body, input.published_at, input.owner_id, input.category_id) {
        (Some(title), Some(body), Some(published_at), Some(owner_id), Some(category_id))
            if violations.is_empty() =>
        {
            Ok(ValidPost {
                owner_id,
                category_id,
                title,
                body,
                published_at: published_at.into(),
                tag_ids: input.tag_ids.into_iter().collect(),
            })
        }
        _ => Err(violations),
    }
}

fn validate_changes(changes: &PostChanges) -> ValidationError {
    let mut violations = ValidationError::default();
    if let Some(title) = &changes.title {
        if let Some(title) = required_text(&mut violations, "title", Some(title)) {
            check_title_length(&mut violations, &title);
        }
    }
    if let Some(body) = &changes.body {
        required_text(&mut violations, "body", Some(body));
    }
    violations
}

fn required_text(
    violations: &mut ValidationError,
    field: &'static str,
    value: Option<&str>,
) -> Option<String> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Some(text.to_string()),
        _ => {
            violations.push(field, "is required");
            None
        }
    }
}

fn check_title_length(violations: &mut ValidationError, title: &str) {
    if title.chars().count() > MAX_TITLE_LEN {
        violations.push(
            "title",
            format!("must be at most {MAX_TITLE_LEN} characters"),
        );
    }
}

fn validate_name(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::single(field, "is required"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::single(
            field,
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> NewPost {
        NewPost {
            owner_id: Some(Uuid::new_v4()),
            category_id: Some(Uuid::new_v4()),
            title: Some("Hello".into()),
            body: Some("First post".into()),
            published_at: Some(Utc::now()),
            tag_ids: vec![],
        }
    }

    #[test]
    fn complete_post_validates() {
        let valid = validate_new_post(complete()).unwrap();
        assert_eq!(valid.title, "Hello");
        assert!(valid.tag_ids.is_empty());
    }

    #[test]
    fn every_missing_field_is_reported() {
        let err = validate_new_post(NewPost::default()).unwrap_err();
        assert_eq!(
            err.field_names(),
            vec!["title", "body", "published_at", "owner", "category"]
        );
    }

    #[test]
    fn blank_text_counts_as_missing() {
        let input = NewPost {
            title: Some("   ".into()),
            body: Some(String::new()),
            ..complete()
        };
        let err = validate_new_post(input).unwrap_err();
        assert_eq!(err.field_names(), vec!["title", "body"]);
    }

    #[test]
    fn overlong_title_is_rejected() {
        let input = NewPost {
            title: Some("x".repeat(MAX_TITLE_LEN + 1)),
            ..complete()
        };
        assert!(validate_new_post(input).unwrap_err().contains("title"));
    }

    #[test]
    fn duplicate_tags_collapse() {
        let tag = Uuid::new_v4();
        let input = NewPost {
            tag_ids: vec![tag, tag],
            ..complete()
        };
        assert_eq!(validate_new_post(input).unwrap().tag_ids.len(), 1);
    }

    #[test]
    fn changes_only_check_present_fields() {
        assert!(validate_changes(&PostChanges::default()).is_empty());
        let changes = PostChanges {
            title: Some(" ".into()),
            ..PostChanges::default()
        };
        assert_eq!(validate_changes(&changes).field_names(), vec!["title"]);
    }

    #[test]
    fn drafts_have_no_id() {
        let draft = complete();
        assert_eq!(draft.resource_type(), POST);
        assert!(draft.resource_id().is_none());
        assert_eq!(draft.owner_id(), draft.owner_id);
    }
}
