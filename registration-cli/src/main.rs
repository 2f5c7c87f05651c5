//! Registration CLI
//!
//! Boots a host configuration, plugs the registration component into it and
//! drives registrations from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Password;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use registration_core::error::RegistrationError;
use registration_core::types::{DalBackend, RecordId, RegistrationRecord, RegistrationSubmission};
use registration_dal::{DocumentSession, RelationalSession};
use registration_plugin::{plug, AppConfig, Application, PluginOptions, RegistrationService};

/// Registration - pluggable user registration
#[derive(Parser)]
#[command(name = "registration")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Storage backend (sqla or ming); overrides REGISTRATION_DAL
    #[arg(long, global = true)]
    dal: Option<String>,

    /// Relational database file
    #[arg(long, global = true, default_value = "registration.db")]
    database: PathBuf,

    /// Remote libSQL database URL, used instead of --database
    #[cfg(feature = "remote")]
    #[arg(long, global = true, env = "REGISTRATION_DATABASE_URL")]
    database_url: Option<String>,

    /// Auth token for the remote database
    #[cfg(feature = "remote")]
    #[arg(long, global = true, env = "REGISTRATION_DATABASE_TOKEN", default_value = "")]
    database_token: String,

    /// Document store snapshot file
    #[arg(long, global = true, default_value = "registration.json")]
    documents: PathBuf,

    /// Confirmation email sender; overrides REGISTRATION_EMAIL_SENDER
    #[arg(long, global = true)]
    email_sender: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new user
    Register {
        /// Login name
        user_name: String,
        /// Email address
        email_address: String,
        /// Name shown instead of the login name
        #[arg(short, long)]
        display_name: Option<String>,
        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Show a stored record
    Show {
        /// Record identifier (integer or 24 hex chars)
        id: String,
    },

    /// Check whether a user name is taken
    CheckUser {
        /// Login name
        user_name: String,
    },

    /// Check whether an email address is taken
    CheckEmail {
        /// Email address
        email_address: String,
    },
}

/// Storage handles opened for the host, kept so they can be flushed on exit.
struct Host {
    app: Arc<Application>,
    documents: Option<Arc<DocumentSession>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "registration=debug,info"
    } else {
        "registration=info,warn"
    };

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()));
    if cli.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let host = boot(&cli).await?;

    let outcome = match cli.command {
        Commands::Register {
            user_name,
            email_address,
            display_name,
            password,
        } => cmd_register(&host, user_name, email_address, display_name, password).await,
        Commands::Show { id } => cmd_show(&host, &id).await,
        Commands::CheckUser { user_name } => cmd_check_user(&host, &user_name).await,
        Commands::CheckEmail { email_address } => cmd_check_email(&host, &email_address).await,
    };

    if let Some(documents) = &host.documents {
        documents.flush().await.context("Failed to save document store")?;
    }
    outcome
}

/// Builds the host configuration and plugs registration into it.
async fn boot(cli: &Cli) -> Result<Host> {
    let mut options = PluginOptions::from_env()?;
    if let Some(dal) = &cli.dal {
        options = options.with_dal_name(dal.as_str());
    }
    if let Some(sender) = &cli.email_sender {
        options = options.with_email_sender(sender.as_str());
    }

    let mut config = AppConfig::new();
    let mut documents = None;

    match options.dal_backend()? {
        DalBackend::Sqla => {
            let session = open_relational(cli).await?;
            config = config.with_relational_session(Arc::new(session));
        }
        DalBackend::Ming => {
            let session = Arc::new(
                DocumentSession::open(&cli.documents)
                    .await
                    .with_context(|| format!("Failed to open {}", cli.documents.display()))?,
            );
            documents = Some(Arc::clone(&session));
            config = config.with_document_session(session);
        }
    }

    let info = plug(&mut config, options)?;
    debug!(appid = info.appid, "Component plugged");

    let app = config.finalize().context("Application startup failed")?;
    Ok(Host { app, documents })
}

async fn open_relational(cli: &Cli) -> Result<RelationalSession> {
    #[cfg(feature = "remote")]
    {
        if let Some(url) = &cli.database_url {
            return RelationalSession::open_remote(url.as_str(), cli.database_token.as_str())
                .await
                .with_context(|| format!("Failed to connect to {url}"));
        }
    }

    RelationalSession::open_local(&cli.database)
        .await
        .with_context(|| format!("Failed to open {}", cli.database.display()))
}

/// Register a new user
async fn cmd_register(
    host: &Host,
    user_name: String,
    email_address: String,
    display_name: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let service = RegistrationService::from_application(&host.app)?;

    let (password, confirm) = match password {
        Some(password) => (password.clone(), password),
        None => (
            Password::new().with_prompt("Password").interact()?,
            Password::new().with_prompt("Confirm password").interact()?,
        ),
    };

    let mut submission = RegistrationSubmission::new(user_name, email_address, password)
        .with_password_confirm(confirm);
    if let Some(display_name) = display_name {
        submission = submission.with_display_name(display_name);
    }

    println!("{}", "Registering...".cyan().bold());

    match service.register(submission).await {
        Ok(outcome) => {
            println!("\n{}", "Registered:".green().bold());
            print_record(&outcome.record);
            if outcome.confirmation_sent {
                println!(
                    "\n   {} {}",
                    "Confirmation sent to".dimmed(),
                    outcome.record.email_address
                );
            } else {
                println!("\n{}", "Confirmation email could not be sent.".yellow());
            }
            Ok(())
        }
        Err(RegistrationError::InvalidForm(errors)) => {
            println!("\n{}", "Registration rejected:".red().bold());
            for (field, message) in errors.iter() {
                println!("   {} {}", field.yellow(), message);
            }
            anyhow::bail!("invalid registration form")
        }
        Err(e) => Err(e.into()),
    }
}

/// Show a stored record
async fn cmd_show(host: &Host, id: &str) -> Result<()> {
    let id: RecordId = id.parse()?;
    let dal = host.app.require_registration_dal()?;

    match dal.get_by_identifier(&id).await? {
        Some(record) => {
            let json = serde_json::json!({
                "id": record.id,
                "user_name": record.user_name,
                "email_address": record.email_address,
                "display_name": record.display_name,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        None => println!("{} {}", "No record with id".yellow(), id),
    }
    Ok(())
}

/// Check whether a user name is taken
async fn cmd_check_user(host: &Host, user_name: &str) -> Result<()> {
    let dal = host.app.require_registration_dal()?;
    report_availability("User name", user_name, dal.exists_user_name(user_name).await?);
    Ok(())
}

/// Check whether an email address is taken
async fn cmd_check_email(host: &Host, email_address: &str) -> Result<()> {
    let dal = host.app.require_registration_dal()?;
    report_availability("Email address", email_address, dal.exists_email(email_address).await?);
    Ok(())
}

fn report_availability(what: &str, value: &str, taken: bool) {
    if taken {
        println!("{} {} {}", what, value.bold(), "is taken".red());
    } else {
        println!("{} {} {}", what, value.bold(), "is available".green());
    }
}

fn print_record(record: &RegistrationRecord) {
    println!("   {} {}", "Id:".dimmed(), record.id);
    println!("   {} {}", "User name:".dimmed(), record.user_name);
    println!("   {} {}", "Email:".dimmed(), record.email_address);
    println!("   {} {}", "Display name:".dimmed(), record.name_for_display());
}
