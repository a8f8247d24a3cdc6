use app::backoffice;
use bo_config::Config;
use bo_core::{telemetry, Error, Result};
use bo_db::{CreateUserRequest, UserRepository};
use bo_obs::ObsState;
use bo_web::auth::PasswordAuth;
use clap::{Parser, Subcommand};
use std::{process, sync::Arc};

#[derive(Parser, Debug)]
#[command(name = "backoffice")]
#[command(about = "Administrative screens for users and stuffs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web and observability servers (default)
    Serve,
    /// Create a user able to sign in
    CreateUser {
        #[arg(long, value_name = "USERNAME")]
        username: String,
        #[arg(long, value_name = "EMAIL", default_value = "")]
        email: String,
        /// Grant every permission
        #[arg(long)]
        superuser: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let env = std::env::var("BACKOFFICE_ENV").unwrap_or_else(|_| "development".to_string());
    telemetry::init_tracing(&env, env!("CARGO_BIN_NAME"));

    // Load configuration - exit with non-zero if invalid
    let config = match Config::load() {
        Ok(config) => {
            tracing::debug!(?config, "Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::CreateUser {
            username,
            email,
            superuser,
        } => create_user(config, username, email, superuser).await,
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

async fn serve(config: Config) -> Result<()> {
    let settings = config.backoffice.resolve()?;
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        obs_port = %config.server.obs_port,
        db_path = %config.database.path,
        site = %config.backoffice.site,
        "Application configured and ready"
    );

    let db = app::open_db(&config.database.path, config.database.pool_size).await?;
    db.health_check().await?;

    let backoffice = backoffice::build(settings)?;
    let obs_state = ObsState::with_db(db.clone(), Arc::new(bo_obs::Metrics::new()));
    let state = backoffice.app_state(
        db,
        config.security.clone(),
        Arc::clone(&obs_state.metrics),
        config.server.form_limit,
    )?;
    obs_state.readiness.set_ready(true);

    let obs_bind_addr = format!("0.0.0.0:{}", config.server.obs_port);
    let web_bind_addr = format!("{}:{}", config.server.host, config.server.port);

    // Either server stopping ends the process
    tokio::select! {
        obs_result = bo_obs::start_server(&obs_bind_addr, obs_state) => {
            tracing::error!("Observability server exited");
            obs_result
        }
        web_result = bo_web::start_server(&web_bind_addr, state, backoffice) => {
            tracing::error!("Web server exited");
            web_result
        }
    }
}

async fn create_user(config: Config, username: String, email: String, superuser: bool) -> Result<()> {
    let password = rpassword::prompt_password("Password: ")?;
    let confirmation = rpassword::prompt_password("Password (again): ")?;
    if password != confirmation {
        return Err(Error::Validation("Passwords don't match".to_string()));
    }
    if password.is_empty() {
        return Err(Error::Validation("The password is mandatory".to_string()));
    }

    let db = app::open_db(&config.database.path, config.database.pool_size).await?;
    let user = UserRepository::new(db.pool())
        .create(CreateUserRequest {
            username,
            password_hash: PasswordAuth::hash_password(&password)?,
            first_name: String::new(),
            last_name: String::new(),
            email,
            is_superuser: superuser,
            is_staff: true,
        })
        .await?;

    tracing::info!(user_id = user.id, "User created");
    println!("Created user '{}' ({})", user.username, user.id);
    Ok(())
}
