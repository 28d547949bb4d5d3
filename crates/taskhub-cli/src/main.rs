//! TaskHub CLI - Operator command-line interface
//!
//! Usage:
//!   taskhub migrate
//!   taskhub purge-tokens
//!   taskhub create-admin --name <name> --email <email>
//!   taskhub assign-role <email> <role>
//!   taskhub revoke-role <email> <role>

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use taskhub_api::auth::{service::normalize_email, RegisterRequest, RoleRepository, UserRepository};
use taskhub_api::db::{self, Repositories};
use taskhub_api::state::AppState;
use taskhub_core::config::AppConfig;
use taskhub_core::Role;

#[derive(Parser)]
#[command(name = "taskhub")]
#[command(about = "TaskHub operator CLI")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(long, env = "TASKHUB_CONFIG", global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Delete expired refresh tokens and blacklist entries
    PurgeTokens,
    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Password; read from TASKHUB_ADMIN_PASSWORD when omitted
        #[arg(long, env = "TASKHUB_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Give a user a role
    AssignRole {
        email: String,
        /// admin, responsable_proyecto or responsable_tarea
        role: Role,
    },
    /// Take a role away from a user
    RevokeRole { email: String, role: Role },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskhub_api=info,warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    config.validate()?;

    let pool = db::connect_pool(&config.database).await?;

    if let Commands::Migrate = cli.command {
        db::run_migrations(&pool).await?;
        println!("Migrations applied");
        return Ok(());
    }

    let repos = Repositories::postgres(pool.clone());
    let state = AppState::new(config, repos.clone(), Some(pool))?;

    match cli.command {
        Commands::Migrate => {}
        Commands::PurgeTokens => {
            let report = state.tokens.purge_expired().await?;
            println!(
                "Purged {} refresh tokens and {} blacklist entries",
                report.refresh_tokens, report.blacklist_entries
            );
        }
        Commands::CreateAdmin {
            name,
            email,
            password,
        } => {
            let user = state
                .auth
                .create_user(
                    RegisterRequest {
                        name,
                        email,
                        password,
                        phone: None,
                    },
                    true,
                )
                .await
                .context("Failed to create administrator")?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Commands::AssignRole { email, role } => {
            let user_id = find_user_id(&repos, &email).await?;
            let assignment = repos.roles.assign_role(user_id, role, None).await?;
            println!("{}", serde_json::to_string_pretty(&assignment)?);
        }
        Commands::RevokeRole { email, role } => {
            let user_id = find_user_id(&repos, &email).await?;
            if repos.roles.revoke_role(user_id, role).await? {
                println!("Revoked {role} from {email}");
            } else {
                println!("{email} does not hold {role}");
            }
        }
    }

    Ok(())
}

async fn find_user_id(repos: &Repositories, email: &str) -> anyhow::Result<uuid::Uuid> {
    match repos.users.find_by_email(&normalize_email(email)).await? {
        Some(user) => Ok(user.id),
        None => bail!("No user with email {email}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_assign_role() {
        let cli = Cli::try_parse_from(["taskhub", "assign-role", "a@example.com", "responsable_tarea"])
            .unwrap();
        match cli.command {
            Commands::AssignRole { email, role } => {
                assert_eq!(email, "a@example.com");
                assert_eq!(role, Role::ResponsableTarea);
            }
            _ => panic!("expected assign-role"),
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!(Cli::try_parse_from(["taskhub", "assign-role", "a@example.com", "owner"]).is_err());
    }
}
