mod config;
mod seed;

use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use platform_authz::{Gateway, default_registry, posts::CREATE};
use platform_db::{
    Authorizer, DbError, DbPool, NewPost, NewSubject, RoleStore, Target, connect,
};
use platform_obs::{init_tracing, shutdown_tracing};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "blog-authz", version, about = "Blog role-based access control")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Insert demo users, a category, a tag and a post.
    Seed,
    /// Manage subjects.
    #[command(subcommand)]
    User(UserCommand),
    /// Grant, revoke and inspect roles.
    #[command(subcommand)]
    Role(RoleCommand),
    /// Evaluate an action against a post. `create` is checked against a new
    /// post owned by the subject and takes no --post.
    Check(CheckCommand),
    /// List the posts a subject may see.
    Posts {
        #[arg(long)]
        subject: String,
    },
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Register a subject; it receives the default role when no --role is given.
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long = "role")]
        roles: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum RoleCommand {
    Grant(RoleArgs),
    Revoke(RoleArgs),
    /// Roles held by a subject.
    List {
        #[arg(long)]
        subject: String,
    },
    /// Subjects holding a role.
    Members {
        #[arg(long)]
        role: String,
    },
}

#[derive(Args, Debug)]
struct RoleArgs {
    /// Subject id or email.
    #[arg(long)]
    subject: String,
    #[arg(long)]
    role: String,
}

#[derive(Args, Debug)]
struct CheckCommand {
    /// Subject id or email.
    #[arg(long)]
    subject: String,
    #[arg(long)]
    action: String,
    #[arg(long)]
    post: Option<Uuid>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(config.obs.clone())?;
    let cli = Cli::parse();
    let outcome = run(cli.command, &config).await;
    if let Err(err) = &outcome {
        report(err);
    }
    shutdown_tracing();
    if outcome.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Command, config: &AppConfig) -> Result<()> {
    let pool = connect(&config.database).await?;
    match command {
        Command::Migrate(MigrateCommand::Up) => {
            Migrator::up(&pool, None).await?;
            info!("database migrations applied");
        }
        Command::Migrate(MigrateCommand::Down) => {
            Migrator::down(&pool, Some(1)).await?;
            info!("most recent migration rolled back");
        }
        Command::Seed => {
            ensure_migrations(&pool).await?;
            let seeded = seed::run(&pool, &config.default_role).await?;
            print_json(&seeded)?;
        }
        Command::User(UserCommand::Create { email, name, roles }) => {
            let subject = role_store(&pool, config)?
                .create_subject(NewSubject {
                    email,
                    display_name: name,
                    roles,
                })
                .await?;
            print_json(&subject)?;
        }
        Command::Role(command) => run_role(command, &pool, config).await?,
        Command::Check(cmd) => {
            let store = role_store(&pool, config)?;
            let subject_id = resolve_subject(&store, &cmd.subject).await?;
            let authorizer = authorizer(&pool);
            let draft = NewPost {
                owner_id: Some(subject_id),
                ..NewPost::default()
            };
            let target = check_target(&cmd.action, cmd.post, &draft)?;
            let decision = authorizer.decide(subject_id, &cmd.action, target).await?;
            print_json(&json!({
                "subject_id": subject_id,
                "post_id": cmd.post,
                "decision": decision,
            }))?;
        }
        Command::Posts { subject } => {
            let store = role_store(&pool, config)?;
            let subject_id = resolve_subject(&store, &subject).await?;
            let posts = authorizer(&pool).visible_posts(subject_id).await?;
            let rows: Vec<_> = posts
                .into_iter()
                .map(|post| {
                    json!({
                        "id": post.id,
                        "title": post.title,
                        "owner_id": post.user_id,
                        "published_at": post.published_at.to_rfc3339(),
                    })
                })
                .collect();
            print_json(&rows)?;
        }
    }
    Ok(())
}

async fn run_role(command: RoleCommand, pool: &DbPool, config: &AppConfig) -> Result<()> {
    let store = role_store(pool, config)?;
    match command {
        RoleCommand::Grant(args) => {
            let subject_id = resolve_subject(&store, &args.subject).await?;
            store.grant(subject_id, &args.role).await?;
            print_json(&store.find_subject(subject_id).await?)?;
        }
        RoleCommand::Revoke(args) => {
            let subject_id = resolve_subject(&store, &args.subject).await?;
            store.revoke(subject_id, &args.role).await?;
            print_json(&store.find_subject(subject_id).await?)?;
        }
        RoleCommand::List { subject } => {
            let subject_id = resolve_subject(&store, &subject).await?;
            print_json(&store.roles(subject_id).await?)?;
        }
        RoleCommand::Members { role } => {
            print_json(&store.subjects_with_role(&role).await?)?;
        }
    }
    Ok(())
}

fn role_store(pool: &DbPool, config: &AppConfig) -> Result<RoleStore> {
    Ok(RoleStore::new(pool.clone()).with_default_role(&config.default_role)?)
}

fn authorizer(pool: &DbPool) -> Authorizer {
    Authorizer::new(pool.clone(), Arc::new(Gateway::new(default_registry())))
}

/// Only `create` is meaningful without an existing post.
fn check_target<'a>(action: &str, post: Option<Uuid>, draft: &'a NewPost) -> Result<Target<'a>> {
    match post {
        Some(post_id) => Ok(Target::Post(post_id)),
        None if action == CREATE => Ok(Target::Draft(draft)),
        None => bail!("--post is required to check `{action}`"),
    }
}

/// Accepts a subject id or an email address.
async fn resolve_subject(store: &RoleStore, reference: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(reference) {
        return Ok(id);
    }
    store
        .find_by_email(reference)
        .await?
        .map(|user| user.id)
        .ok_or_else(|| anyhow!("no subject with email {reference}"))
}

async fn ensure_migrations(pool: &DbPool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() {
        bail!("pending migrations detected; run `blog-authz migrate up` first");
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Denials and validation failures are routine; everything else points at
/// configuration or infrastructure.
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<DbError>() {
        Some(db_err) if db_err.is_expected() => warn!(error = %db_err, "request rejected"),
        Some(db_err) => error!(error = %db_err, "request failed"),
        None => error!(error = %err, "command failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_create_checks_a_draft() {
        let draft = NewPost::default();
        assert!(matches!(
            check_target(CREATE, None, &draft),
            Ok(Target::Draft(_))
        ));
        for action in ["show", "update", "destroy"] {
            assert!(check_target(action, None, &draft).is_err(), "{action}");
        }

        let post_id = Uuid::new_v4();
        assert!(matches!(
            check_target("show", Some(post_id), &draft),
            Ok(Target::Post(id)) if id == post_id
        ));
    }
}
