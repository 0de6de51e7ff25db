//! Rankkeeper Inspector
//!
//! Operator CLI over the authorization core. Opens the configured store,
//! optionally seeds it, then answers one query:
//!
//! - `tree`: print the category tree
//! - `compare <a> <b>`: rank comparison of two roles
//! - `qualified <user> <role>`: does the user qualify as the role
//! - `superior <user> <other>`: does the user outrank every role of another
//! - `highest <user> <category>`: the user's best role for a category
//! - `insert-below` / `insert-above`: create an interpolated role
//!
//! Roles are written as `name@category` or by unique machine name.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use rk_authz::{AuthorityService, RoleTarget, SeedDocument, Seeder, UserId};
use rk_config::{AppConfig, ConfigLoader};

/// Rankkeeper Inspector
#[derive(Parser, Debug)]
#[command(name = "rk-inspect")]
#[command(about = "Inspect role categories and answer authority queries")]
struct Args {
    /// Config file (otherwise the standard search paths are used)
    #[arg(long, env = "RANKKEEPER_CONFIG")]
    config: Option<String>,

    /// Seed document applied before the command runs
    #[arg(long, env = "RANKKEEPER_SEED_FILE")]
    seed: Option<String>,

    /// Apply the built-in catalogue before the command runs
    #[arg(long, default_value = "false")]
    default_catalogue: bool,

    /// Print results as JSON
    #[arg(long, default_value = "false")]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the category tree
    Tree,

    /// Compare the rank of two roles
    Compare { a: String, b: String },

    /// Whether a user qualifies as a role
    Qualified {
        user: i64,
        role: String,
        /// Category the bare role name is looked up in
        #[arg(long)]
        category: Option<String>,
    },

    /// Whether a user strictly outranks every role of another user
    Superior {
        user: i64,
        other: i64,
        /// Only consider roles related to this category
        #[arg(long)]
        category: Option<String>,
    },

    /// A user's highest role for a category
    Highest { user: i64, category: String },

    /// Create a role ranked directly below an existing one
    InsertBelow {
        role: String,
        name: String,
        #[arg(long)]
        weight: Option<f64>,
    },

    /// Create a role ranked directly above an existing one
    InsertAbove {
        role: String,
        name: String,
        #[arg(long)]
        weight: Option<f64>,
    },
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    loader.load().context("failed to load configuration")
}

async fn seed(service: &AuthorityService, args: &Args, config: &AppConfig) -> Result<()> {
    if args.default_catalogue {
        Seeder::apply(service, &SeedDocument::default_catalogue()).await?;
    }
    if let Some(path) = args.seed.as_ref().or(config.seed_file.as_ref()) {
        let doc = SeedDocument::from_file(path).with_context(|| format!("seed file {path}"))?;
        Seeder::apply(service, &doc).await?;
    }
    Ok(())
}

fn emit(json_output: bool, value: serde_json::Value, text: String) {
    if json_output {
        println!("{value}");
    } else {
        println!("{text}");
    }
}

async fn run(service: &AuthorityService, args: &Args) -> Result<()> {
    match &args.command {
        Command::Tree => {
            let tree = service.cached_tree(false).await?;
            let categories: Vec<_> = tree.iter().collect();
            emit(args.json, json!(categories), tree.render().trim_end().to_string());
        }
        Command::Compare { a, b } => {
            let x = service.resolve_role_ref(a).await?;
            let y = service.resolve_role_ref(b).await?;
            let ordering = service.compare_roles(&x, &y).await?;
            emit(
                args.json,
                json!({ "a": x, "b": y, "ordering": ordering }),
                format!("{x} {ordering:?} {y}"),
            );
        }
        Command::Qualified { user, role, category } => {
            let user_id = UserId(*user);
            let qualified = match category {
                Some(mname) => {
                    let category = service.category(mname).await?;
                    service
                        .qualified_as(user_id, RoleTarget::Name(role), Some(category.id))
                        .await?
                }
                None if role.contains('@') => {
                    let target = service.resolve_role_ref(role).await?;
                    service.qualified_as(user_id, RoleTarget::Role(&target), None).await?
                }
                None => service.qualified_as(user_id, RoleTarget::Name(role), None).await?,
            };
            emit(
                args.json,
                json!({ "user": user_id, "role": role, "qualified": qualified }),
                qualified.to_string(),
            );
        }
        Command::Superior { user, other, category } => {
            let category_id = match category {
                Some(mname) => Some(service.category(mname).await?.id),
                None => None,
            };
            let superior = service
                .superior_to(UserId(*user), UserId(*other), category_id)
                .await?;
            emit(
                args.json,
                json!({ "user": user, "other": other, "superior": superior }),
                superior.to_string(),
            );
        }
        Command::Highest { user, category } => {
            let category = service.category(category).await?;
            let role = service.highest_role_in(UserId(*user), category.id).await?;
            let text = role
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "(none)".to_string());
            emit(args.json, json!({ "user": user, "role": role }), text);
        }
        Command::InsertBelow { role, name, weight } => {
            let reference = service.resolve_role_ref(role).await?;
            let created = service.create_subordinate(&reference, name, *weight).await?;
            emit(args.json, json!(created), format!("{created} weight={:?}", created.weight));
        }
        Command::InsertAbove { role, name, weight } => {
            let reference = service.resolve_role_ref(role).await?;
            let created = service.create_superior(&reference, name, *weight).await?;
            emit(args.json, json!(created), format!("{created} weight={:?}", created.weight));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    rk_common::init_logging("rk-inspect");

    let args = Args::parse();
    let config = load_config(&args)?;
    info!(backend = ?config.store.backend, "Starting rk-inspect");

    let service = AuthorityService::open(&config).await?;
    seed(&service, &args, &config).await?;
    run(&service, &args).await
}
