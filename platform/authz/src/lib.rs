//! Authorization primitives for the blog: subjects with flat role sets,
//! per-resource-type policies, and the gateway request handlers call before
//! touching a resource.
//!
//! Everything in this crate is synchronous and free of I/O. Callers load a
//! fresh [`Subject`] and resource snapshot for each check and hand them to
//! [`Gateway::authorize`].

mod error;
mod gateway;
mod policy;
pub mod posts;
mod registry;
pub mod roles;
mod subject;

pub use error::AuthzError;
pub use gateway::Gateway;
pub use policy::{Policy, PolicyDecision, PolicyEngine, Predicate, Scope};
pub use registry::PolicyRegistry;
pub use subject::{Resource, Subject};

/// Registry populated with every policy the blog ships with.
pub fn default_registry() -> PolicyRegistry {
    let mut registry = PolicyRegistry::default();
    registry.register(posts::post_policy());
    registry
}
