use std::collections::HashMap;

use crate::{AuthzError, Policy};

/// Explicit mapping from resource type to its policy, filled at startup.
#[derive(Clone, Debug, Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, Policy>,
}

impl PolicyRegistry {
    /// Returns the policy previously registered for the same type, if any.
    pub fn register(&mut self, policy: Policy) -> Option<Policy> {
        self.policies
            .insert(policy.resource_type().to_string(), policy)
    }

    pub fn resolve(&self, resource_type: &str) -> Result<&Policy, AuthzError> {
        self.policies
            .get(resource_type)
            .ok_or_else(|| AuthzError::PolicyNotFound {
                resource_type: resource_type.to_string(),
            })
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
