use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use sakip::auth::{MIN_PASSWORD_LENGTH, PasswordHasher, TokenGenerator};
use sakip::config::{FileConfig, ServerConfig};
use sakip::server::{AppState, create_router};
use sakip::store::{SqliteStore, Store};
use sakip::types::User;

const SUPERADMIN_ROLE: &str = "superadmin";
const NOT_INITIALIZED: &str =
    "Server not initialized. Run 'sakip admin init' first to create the database and administrator.";

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "sakip")]
#[command(about = "Performance accountability (SAKIP) reporting server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// TOML file with host, port, data_dir and upload limits
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host to bind to [default: 127.0.0.1]
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to [default: 8080]
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database and evidence files [default: ./data]
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database, roles and the first administrator)
    Init {
        /// Data directory for the database and evidence files
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Administrator email; prompted for when omitted
        #[arg(long)]
        admin_email: Option<String>,

        /// Administrator password; prompted for when omitted
        #[arg(long, env = "SAKIP_ADMIN_PASSWORD", hide_env_values = true)]
        admin_password: Option<String>,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },
}

struct AdminAccount {
    email: String,
    password: String,
}

fn prompt_admin(
    email: Option<String>,
    password: Option<String>,
    non_interactive: bool,
) -> anyhow::Result<AdminAccount> {
    let email = match email {
        Some(email) => email,
        None if non_interactive => bail!("--admin-email is required with --non-interactive"),
        None => inquire::Text::new("Administrator email:")
            .with_validator(|input: &str| {
                if input.contains('@') {
                    Ok(inquire::validator::Validation::Valid)
                } else {
                    Ok(inquire::validator::Validation::Invalid(
                        "Enter a valid email address".into(),
                    ))
                }
            })
            .prompt()?,
    };

    let password = match password {
        Some(password) => password,
        None if non_interactive => bail!("--admin-password is required with --non-interactive"),
        None => inquire::Password::new("Administrator password:")
            .with_validator(|input: &str| {
                if input.chars().count() >= MIN_PASSWORD_LENGTH {
                    Ok(inquire::validator::Validation::Valid)
                } else {
                    Ok(inquire::validator::Validation::Invalid(
                        format!("Use at least {MIN_PASSWORD_LENGTH} characters").into(),
                    ))
                }
            })
            .prompt()?,
    };

    let email = email.trim().to_ascii_lowercase();
    if !email.contains('@') {
        bail!("'{email}' is not a valid email address");
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        bail!("The administrator password must be at least {MIN_PASSWORD_LENGTH} characters");
    }

    Ok(AdminAccount { email, password })
}

fn run_init(
    data_dir: PathBuf,
    admin_email: Option<String>,
    admin_password: Option<String>,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let config = ServerConfig {
        data_dir,
        ..ServerConfig::default()
    };
    fs::create_dir_all(&config.data_dir)?;

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    let token_file = config.admin_token_path();
    if store.count_users()? > 0 {
        bail!(
            "Server already initialized. Admin token exists at: {}",
            token_file.display()
        );
    }

    let account = prompt_admin(admin_email, admin_password, non_interactive)?;

    store.seed_defaults()?;
    let role = store
        .get_role_by_name(SUPERADMIN_ROLE)?
        .context("superadmin role missing after seeding")?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: "Administrator".to_string(),
        email: account.email,
        password_hash: PasswordHasher::new().hash(&account.password)?,
        institution_id: None,
        is_active: true,
        created_at: now,
        updated_at: now,
        last_login_at: None,
    };
    store.create_user(&user)?;
    store.set_user_roles(&user.id, &[role.id])?;

    let (_, raw_token) = TokenGenerator::new().issue(&store, &user.id, None)?;
    fs::write(&token_file, &raw_token)?;

    #[cfg(unix)]
    set_restrictive_permissions(&token_file);

    println!();
    println!("========================================");
    println!("Administrator: {}", user.email);
    println!("Admin token (save this, it won't be shown again):");
    println!();
    println!("  {raw_token}");
    println!();
    println!("Token also written to: {}", token_file.display());
    println!("========================================");
    println!();

    Ok(())
}

async fn run_serve(
    config_file: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = ServerConfig::default();
    if let Some(path) = config_file {
        config = config.merge_file(FileConfig::load(&path)?);
    }
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(data_dir) = data_dir {
        config.data_dir = data_dir;
    }

    if !config.db_path().exists() {
        bail!(NOT_INITIALIZED);
    }

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;
    if store.count_users()? == 0 {
        bail!(NOT_INITIALIZED);
    }

    let addr = config.socket_addr()?;
    let state = Arc::new(AppState::new(Arc::new(store), config));
    let app = create_router(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sakip=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                admin_email,
                admin_password,
                non_interactive,
            } => run_init(data_dir, admin_email, admin_password, non_interactive)?,
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
        } => run_serve(config, host, port, data_dir).await?,
    }

    Ok(())
}
