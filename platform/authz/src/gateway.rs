use tracing::{debug, info, warn};

use crate::{AuthzError, PolicyDecision, PolicyEngine, PolicyRegistry, Resource, Scope, Subject};

/// The single check request handlers run before a protected operation.
#[derive(Clone, Debug, Default)]
pub struct Gateway {
    registry: PolicyRegistry,
    engine: PolicyEngine,
}

impl Gateway {
    pub fn new(registry: PolicyRegistry) -> Self {
        Self {
            registry,
            engine: PolicyEngine,
        }
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Returns `Ok(())` when allowed and `NotAuthorized` when denied.
    pub fn authorize(
        &self,
        subject: &Subject,
        action: &str,
        resource: &dyn Resource,
    ) -> Result<(), AuthzError> {
        let decision = self.decide(subject, action, resource)?;
        if decision.allowed {
            debug!(
                subject_id = %subject.id,
                action,
                resource_type = resource.resource_type(),
                resource_id = ?resource.resource_id(),
                "access granted"
            );
            return Ok(());
        }

        let err = AuthzError::NotAuthorized {
            subject_id: subject.id,
            action: action.to_string(),
            resource_type: resource.resource_type().to_string(),
            resource_id: resource.resource_id(),
        };
        info!(
            subject_id = %subject.id,
            action,
            resource_type = resource.resource_type(),
            resource_id = ?resource.resource_id(),
            "access denied"
        );
        Err(err)
    }

    /// Like [`Gateway::authorize`] but hands back the decision instead of
    /// failing on deny.
    pub fn decide(
        &self,
        subject: &Subject,
        action: &str,
        resource: &dyn Resource,
    ) -> Result<PolicyDecision, AuthzError> {
        let policy = self
            .registry
            .resolve(resource.resource_type())
            .inspect_err(|err| warn!(error = %err, "policy lookup failed"))?;
        self.engine
            .decide(policy, subject, action, resource)
            .inspect_err(|err| warn!(error = %err, subject_id = %subject.id, "policy misconfigured"))
    }

    pub fn scope(&self, subject: &Subject, resource_type: &str) -> Result<Scope, AuthzError> {
        Ok(self.registry.resolve(resource_type)?.scope(subject))
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{default_registry, posts::POST};

    struct Comment;

    impl Resource for Comment {
        fn resource_type(&self) -> &str {
            "comment"
        }

        fn resource_id(&self) -> Option<String> {
            None
        }

        fn owner_id(&self) -> Option<Uuid> {
            None
        }
    }

    #[test]
    fn unregistered_resource_type_is_policy_not_found() {
        let gateway = Gateway::new(default_registry());
        let subject = Subject::new(Uuid::new_v4(), ["admin"]);
        let err = gateway.authorize(&subject, "show", &Comment).unwrap_err();
        assert_eq!(
            err,
            AuthzError::PolicyNotFound {
                resource_type: "comment".into()
            }
        );
    }

    #[test]
    fn scope_resolves_through_registry() {
        let gateway = Gateway::new(default_registry());
        let subject = Subject::new(Uuid::new_v4(), ["user"]);
        assert_eq!(
            gateway.scope(&subject, POST).unwrap(),
            Scope::OwnedBy(subject.id)
        );
        assert!(gateway.scope(&subject, "comment").is_err());
    }
}
