use std::sync::Arc;

use entity::post;
use platform_authz::{Gateway, PolicyDecision, posts::POST};
use sea_orm::DatabaseConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::{DbResult, NewPost, PostStore, RoleStore};

/// What an authorization check is about.
#[derive(Clone, Copy, Debug)]
pub enum Target<'a> {
    /// An existing post, reloaded at check time.
    Post(Uuid),
    /// A post that has not been saved yet, used for `create`.
    Draft(&'a NewPost),
}

/// Runs gateway checks against state read from the database on every call.
/// Nothing is cached, so a grant or revoke is visible to the next check.
#[derive(Clone, Debug)]
pub struct Authorizer {
    roles: RoleStore,
    posts: PostStore,
    gateway: Arc<Gateway>,
}

impl Authorizer {
    pub fn new(db: DatabaseConnection, gateway: Arc<Gateway>) -> Self {
        Self {
            roles: RoleStore::new(db.clone()),
            posts: PostStore::new(db),
            gateway,
        }
    }

    #[instrument(name = "authz.authorize", skip(self, target), err)]
    pub async fn authorize(
        &self,
        subject_id: Uuid,
        action: &str,
        target: Target<'_>,
    ) -> DbResult<()> {
        let subject = self.roles.find_subject(subject_id).await?;
        match target {
            Target::Post(post_id) => {
                let post = self.posts.find(post_id).await?;
                self.gateway.authorize(&subject, action, &post)?;
            }
            Target::Draft(draft) => self.gateway.authorize(&subject, action, draft)?,
        }
        Ok(())
    }

    /// Decision without turning a deny into an error.
    pub async fn decide(
        &self,
        subject_id: Uuid,
        action: &str,
        target: Target<'_>,
    ) -> DbResult<PolicyDecision> {
        let subject = self.roles.find_subject(subject_id).await?;
        let decision = match target {
            Target::Post(post_id) => {
                let post = self.posts.find(post_id).await?;
                self.gateway.decide(&subject, action, &post)?
            }
            Target::Draft(draft) => self.gateway.decide(&subject, action, draft)?,
        };
        Ok(decision)
    }

    /// Posts the subject may list under the post policy scope.
    pub async fn visible_posts(&self, subject_id: Uuid) -> DbResult<Vec<post::Model>> {
        let subject = self.roles.find_subject(subject_id).await?;
        let scope = self.gateway.scope(&subject, POST)?;
        self.posts.list(scope).await
    }
}
