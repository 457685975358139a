use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::roles::normalize_role;

/// Snapshot of the actor requesting access: its id and the roles it held at
/// load time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub roles: BTreeSet<String>,
}

impl Subject {
    pub fn new<I, S>(id: Uuid, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roles = roles
            .into_iter()
            .map(|role| normalize_role(role.as_ref()))
            .filter(|role| !role.is_empty())
            .collect();
        Self { id, roles }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(&normalize_role(role))
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }
}

/// Anything a policy can be evaluated against.
///
/// `resource_type` selects the policy; ownership is compared by subject id,
/// never by object identity.
pub trait Resource {
    fn resource_type(&self) -> &str;

    /// `None` for drafts that have not been persisted yet.
    fn resource_id(&self) -> Option<String>;

    fn owner_id(&self) -> Option<Uuid>;

    fn is_owned_by(&self, subject: &Subject) -> bool {
        self.owner_id() == Some(subject.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_normalized_and_deduplicated() {
        let subject = Subject::new(Uuid::new_v4(), ["Admin", " admin", "", "moderator"]);
        assert_eq!(subject.roles.len(), 2);
        assert!(subject.has_role("ADMIN"));
        assert!(subject.has_role("moderator"));
        assert!(!subject.has_role("user"));
    }

    #[test]
    fn has_any_role_matches_one_of() {
        let subject = Subject::new(Uuid::new_v4(), ["moderator"]);
        assert!(subject.has_any_role(&["admin", "moderator"]));
        assert!(!subject.has_any_role(&["admin"]));
    }
}
