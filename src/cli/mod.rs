use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::api::roles::AssignRole;
use crate::app::app;
use crate::config;
use crate::database::manager::DatabaseManager;
use crate::services::{RoleService, UserService};

#[derive(Parser)]
#[command(name = "crm-api")]
#[command(about = "CRM backend API - kanban boards, sales pipelines, departments and notifications")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, short, help = "Port to listen on, overrides CRM_API_PORT")]
        port: Option<u16>,
    },

    #[command(about = "Apply pending database migrations and exit")]
    Migrate,

    #[command(about = "Create the built-in roles that do not exist yet")]
    SeedRoles,

    #[command(about = "Give an existing user a role, e.g. the first Super Admin")]
    AssignRole {
        #[arg(long, help = "Email of the user")]
        email: String,
        #[arg(long, help = "Name of the role")]
        role: String,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => serve(port).await,
        Commands::Migrate => {
            DatabaseManager::migrate().await.context("running migrations")?;
            Ok(())
        }
        Commands::SeedRoles => {
            let pool = DatabaseManager::pool().await.context("connecting to the database")?;
            let created = RoleService::new(pool).create_defaults().await?;
            tracing::info!("Seeded {} role(s)", created);
            Ok(())
        }
        Commands::AssignRole { email, role } => assign_role(&email, &role).await,
    }
}

async fn assign_role(email: &str, role: &str) -> anyhow::Result<()> {
    let pool = DatabaseManager::pool().await.context("connecting to the database")?;
    let user = UserService::new(pool.clone()).find_by_email(email).await?;
    let role = RoleService::new(pool.clone()).find_by_name(role).await?;

    RoleService::new(pool)
        .assign(AssignRole {
            user_id: user.id,
            role_id: role.id,
        })
        .await?;
    tracing::info!("{} now has role {}", user.email, role.name);
    Ok(())
}

async fn serve(port: Option<u16>) -> anyhow::Result<()> {
    let settings = config::config();
    tracing::info!("Starting CRM API in {:?} mode", settings.environment);

    if settings.security.jwt_secret.is_empty() {
        if crate::is_production!() {
            anyhow::bail!("JWT_SECRET must be set in production");
        }
        tracing::warn!("JWT_SECRET is not set; every protected route will answer 401");
    }

    if settings.database.run_migrations_on_start {
        DatabaseManager::migrate().await.context("running migrations on start")?;
    }

    let bind_addr = format!("0.0.0.0:{}", port.unwrap_or(settings.api.port));
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("CRM API listening on http://{}", bind_addr);

    axum::serve(listener, app())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    DatabaseManager::close_all().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::parse_from(["crm-api"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn serve_accepts_a_port() {
        let cli = Cli::parse_from(["crm-api", "serve", "--port", "8080"]);
        assert!(matches!(cli.command, Some(Commands::Serve { port: Some(8080) })));
    }

    #[test]
    fn assign_role_needs_email_and_role() {
        let cli = Cli::parse_from(["crm-api", "assign-role", "--email", "ana@example.com", "--role", "Super Admin"]);
        match cli.command {
            Some(Commands::AssignRole { email, role }) => {
                assert_eq!(email, "ana@example.com");
                assert_eq!(role, "Super Admin");
            }
            _ => panic!("expected assign-role"),
        }
        assert!(Cli::try_parse_from(["crm-api", "assign-role", "--email", "ana@example.com"]).is_err());
    }
}
