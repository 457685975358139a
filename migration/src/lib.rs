pub use sea_orm_migration::prelude::*;

mod m20240101_000001_users_and_roles;
mod m20240102_000002_posts;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_users_and_roles::Migration),
            Box::new(m20240102_000002_posts::Migration),
        ]
    }
}
