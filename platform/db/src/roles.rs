use std::collections::BTreeSet;

use chrono::Utc;
use entity::{user, user_role};
use platform_authz::{
    Subject,
    roles::{DEFAULT_ROLE, normalize_role, parse_role},
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::DateTimeWithTimeZone,
    sea_query::OnConflict,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{DbError, DbResult, ValidationError};

/// Input for registering a subject. Identity proofing happens upstream.
#[derive(Clone, Debug, Default)]
pub struct NewSubject {
    pub email: String,
    pub display_name: String,
    pub roles: Vec<String>,
}

/// Owns the subject -> roles mapping.
#[derive(Clone, Debug)]
pub struct RoleStore {
    db: DatabaseConnection,
    default_role: String,
}

impl RoleStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            default_role: DEFAULT_ROLE.to_string(),
        }
    }

    /// Blank names keep the built-in default.
    pub fn with_default_role(mut self, role: &str) -> Result<Self, ValidationError> {
        if !role.trim().is_empty() {
            self.default_role =
                parse_role(role).map_err(|reason| ValidationError::single("default_role", reason))?;
        }
        Ok(self)
    }

    pub fn default_role(&self) -> &str {
        &self.default_role
    }

    /// Inserts the subject and its roles in one transaction. A subject
    /// registered without roles gets the default role right after insert.
    pub async fn create_subject(&self, input: NewSubject) -> DbResult<Subject> {
        let mut violations = ValidationError::default();
        let email = normalize_email(&input.email, &mut violations);
        let display_name = input.display_name.trim().to_string();
        if display_name.is_empty() {
            violations.push("display_name", "is required");
        }
        let mut roles = BTreeSet::new();
        for raw in &input.roles {
            match parse_role(raw) {
                Ok(role) => {
                    roles.insert(role);
                }
                Err(reason) => violations.push("roles", reason),
            }
        }
        violations.into_result()?;

        let txn = self.db.begin().await?;
        let taken = user::Entity::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(&txn)
            .await?
            .is_some();
        if taken {
            return Err(ValidationError::single("email", "is already taken").into());
        }

        let id = Uuid::new_v4();
        let now: DateTimeWithTimeZone = Utc::now().into();
        user::ActiveModel {
            id: Set(id),
            email: Set(email),
            display_name: Set(display_name),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for role in &roles {
            insert_role(&txn, id, role).await?;
        }
        if roles.is_empty() {
            self.assign_default_role(&txn, id).await?;
            roles.insert(self.default_role.clone());
        }
        txn.commit().await?;

        info!(subject_id = %id, roles = ?roles, "subject created");
        Ok(Subject { id, roles })
    }

    async fn assign_default_role<C>(&self, conn: &C, subject_id: Uuid) -> DbResult<()>
    where
        C: ConnectionTrait,
    {
        debug!(subject_id = %subject_id, role = %self.default_role, "assigning default role");
        insert_role(conn, subject_id, &self.default_role).await?;
        Ok(())
    }

    /// Fresh snapshot of the subject and the roles it holds right now.
    pub async fn find_subject(&self, subject_id: Uuid) -> DbResult<Subject> {
        ensure_subject(&self.db, subject_id).await?;
        let roles = load_roles(&self.db, subject_id).await?;
        Ok(Subject {
            id: subject_id,
            roles,
        })
    }

    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<user::Model>> {
        let email = email.trim().to_lowercase();
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?)
    }

    /// Granting a held role is a no-op.
    pub async fn grant(&self, subject_id: Uuid, role: &str) -> DbResult<()> {
        let role = validate_role(role)?;
        ensure_subject(&self.db, subject_id).await?;
        let inserted = insert_role(&self.db, subject_id, &role).await?;
        if inserted {
            info!(subject_id = %subject_id, role = %role, "role granted");
        } else {
            debug!(subject_id = %subject_id, role = %role, "role already held");
        }
        Ok(())
    }

    /// Revoking a role the subject does not hold is a no-op.
    pub async fn revoke(&self, subject_id: Uuid, role: &str) -> DbResult<()> {
        let role = validate_role(role)?;
        ensure_subject(&self.db, subject_id).await?;
        let result = user_role::Entity::delete_many()
            .filter(user_role::Column::UserId.eq(subject_id))
            .filter(user_role::Column::Role.eq(role.as_str()))
            .exec(&self.db)
            .await?;
        if result.rows_affected > 0 {
            info!(subject_id = %subject_id, role = %role, "role revoked");
        }
        Ok(())
    }

    pub async fn has_role(&self, subject_id: Uuid, role: &str) -> DbResult<bool> {
        ensure_subject(&self.db, subject_id).await?;
        let role = normalize_role(role);
        let row = user_role::Entity::find_by_id((subject_id, role))
            .one(&self.db)
            .await?;
        Ok(row.is_some())
    }

    pub async fn roles(&self, subject_id: Uuid) -> DbResult<BTreeSet<String>> {
        ensure_subject(&self.db, subject_id).await?;
        load_roles(&self.db, subject_id).await
    }

    pub async fn subjects_with_role(&self, role: &str) -> DbResult<Vec<Uuid>> {
        let role = validate_role(role)?;
        let rows = user_role::Entity::find()
            .filter(user_role::Column::Role.eq(role))
            .order_by_asc(user_role::Column::UserId)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(|row| row.user_id).collect())
    }
}

pub(crate) async fn ensure_subject<C>(conn: &C, subject_id: Uuid) -> DbResult<()>
where
    C: ConnectionTrait,
{
    user::Entity::find_by_id(subject_id)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| DbError::not_found("user", subject_id))
}

async fn load_roles<C>(conn: &C, subject_id: Uuid) -> DbResult<BTreeSet<String>>
where
    C: ConnectionTrait,
{
    let rows = user_role::Entity::find()
        .filter(user_role::Column::UserId.eq(subject_id))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|row| row.role).collect())
}

/// Returns whether a row was written.
async fn insert_role<C>(conn: &C, subject_id: Uuid, role: &str) -> DbResult<bool>
where
    C: ConnectionTrait,
{
    let rows = user_role::Entity::insert(user_role::ActiveModel {
        user_id: Set(subject_id),
        role: Set(role.to_string()),
    })
    .on_conflict(
        OnConflict::columns([user_role::Column::UserId, user_role::Column::Role])
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;
    Ok(rows > 0)
}

fn validate_role(raw: &str) -> Result<String, ValidationError> {
    parse_role(raw).map_err(|reason| ValidationError::single("role", reason))
}

fn normalize_email(raw: &str, violations: &mut ValidationError) -> String {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        violations.push("email", "is required");
    } else if !email.contains('@') {
        violations.push("email", "is not a valid address");
    }
    email
}
