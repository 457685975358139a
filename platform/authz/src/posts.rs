//! Policy for blog posts.
//!
//! | action  | allowed when                    |
//! |---------|---------------------------------|
//! | show    | admin, or owner of the post     |
//! | create  | admin or moderator              |
//! | update  | admin, or owner of the post     |
//! | destroy | admin                           |
//!
//! Admins can list every post, everyone else only their own.

use crate::{
    Policy, Resource, Scope, Subject,
    roles::{ADMIN, MODERATOR},
};

pub const POST: &str = "post";

pub const SHOW: &str = "show";
pub const CREATE: &str = "create";
pub const UPDATE: &str = "update";
pub const DESTROY: &str = "destroy";

pub fn post_policy() -> Policy {
    Policy::new(POST)
        .allow(SHOW, admin_or_owner)
        .allow(CREATE, |subject, _| {
            subject.has_role(ADMIN) || subject.has_role(MODERATOR)
        })
        .allow(UPDATE, admin_or_owner)
        .allow(DESTROY, |subject, _| subject.has_role(ADMIN))
        .with_scope(|subject| {
            if subject.has_role(ADMIN) {
                Scope::All
            } else {
                Scope::OwnedBy(subject.id)
            }
        })
}

fn admin_or_owner(subject: &Subject, post: &dyn Resource) -> bool {
    subject.has_role(ADMIN) || post.is_owned_by(subject)
}
