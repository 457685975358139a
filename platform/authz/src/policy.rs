use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AuthzError, Resource, Subject};

/// Allow/deny rule for one action. Must not have side effects.
pub type Predicate = Arc<dyn Fn(&Subject, &dyn Resource) -> bool + Send + Sync>;

type ScopeRule = Arc<dyn Fn(&Subject) -> Scope + Send + Sync>;

/// Which records of a resource type a subject may list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    All,
    OwnedBy(Uuid),
    Nothing,
}

/// Predicate table for one resource type.
#[derive(Clone)]
pub struct Policy {
    resource_type: String,
    predicates: BTreeMap<String, Predicate>,
    scope: Option<ScopeRule>,
}

impl Policy {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            predicates: BTreeMap::new(),
            scope: None,
        }
    }

    /// Registers the predicate for `action`, replacing any earlier one.
    pub fn allow<F>(mut self, action: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Subject, &dyn Resource) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(action.into(), Arc::new(predicate));
        self
    }

    pub fn with_scope<F>(mut self, rule: F) -> Self
    where
        F: Fn(&Subject) -> Scope + Send + Sync + 'static,
    {
        self.scope = Some(Arc::new(rule));
        self
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.predicates.keys().map(String::as_str)
    }

    pub fn predicate(&self, action: &str) -> Option<&Predicate> {
        self.predicates.get(action)
    }

    /// Policies without a scope rule expose nothing.
    pub fn scope(&self, subject: &Subject) -> Scope {
        self.scope
            .as_ref()
            .map_or(Scope::Nothing, |rule| rule(subject))
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("resource_type", &self.resource_type)
            .field("actions", &self.predicates.keys().collect::<Vec<_>>())
            .field("scoped", &self.scope.is_some())
            .finish()
    }
}

/// Outcome of evaluating one predicate. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub action: String,
    pub resource_type: String,
    pub allowed: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PolicyEngine;

impl PolicyEngine {
    pub fn decide(
        &self,
        policy: &Policy,
        subject: &Subject,
        action: &str,
        resource: &dyn Resource,
    ) -> Result<PolicyDecision, AuthzError> {
        let predicate = policy
            .predicate(action)
            .ok_or_else(|| AuthzError::UnknownAction {
                resource_type: policy.resource_type().to_string(),
                action: action.to_string(),
            })?;
        Ok(PolicyDecision {
            action: action.to_string(),
            resource_type: policy.resource_type().to_string(),
            allowed: predicate(subject, resource),
        })
    }
}
