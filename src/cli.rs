use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::config::AppConfig;
use crate::security::password::PasswordManager;
use crate::shared::utils::{create_pool, run_migrations};
use crate::users::{self, forms::is_valid_username, NewAccount, USERNAME_MAX_LENGTH};

/// Server-rendered ticket desk
#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ticketdesk.toml when present)
    #[arg(long, short, env = "TICKETDESK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Run the web server (the default)
    Serve,

    /// Apply pending database migrations and exit
    Migrate,

    /// Create a user account
    CreateUser(CreateUserArgs),

    /// Remove a user account; their comments are kept without an author
    DeleteUser {
        username: String,
    },
}

#[derive(Debug, clap::Args)]
pub struct CreateUserArgs {
    pub username: String,

    #[arg(long, default_value = "")]
    pub email: String,

    /// Grant staff rights (allows deleting tickets)
    #[arg(long)]
    pub staff: bool,

    #[arg(long, env = "TICKETDESK_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Store the password even if it fails the password policy
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    pub fn load_config(&self) -> Result<AppConfig> {
        AppConfig::load(self.config.as_deref())
    }
}

pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => crate::server::serve(config).await,
        Command::Migrate => migrate(&config),
        Command::CreateUser(args) => create_user(&config, args),
        Command::DeleteUser { username } => delete_user(&config, &username),
    }
}

fn migrate(config: &AppConfig) -> Result<()> {
    let pool = create_pool(&config.database)?;
    let applied = run_migrations(&pool)?;
    info!("{applied} migrations applied to {}", config.database.url);
    Ok(())
}

fn create_user(config: &AppConfig, args: CreateUserArgs) -> Result<()> {
    let username = args.username.trim();
    if username.is_empty()
        || username.chars().count() > USERNAME_MAX_LENGTH
        || !is_valid_username(username)
    {
        bail!("Invalid username {username:?}");
    }

    let passwords = PasswordManager::new(&config.password.argon2, config.password.policy.clone())?;
    let email = args.email.trim();
    let issues = passwords.validate(&args.password, Some(username), Some(email));
    if !issues.is_empty() {
        let messages: Vec<String> = issues.iter().map(|i| i.message()).collect();
        if !args.force {
            bail!("Password rejected: {}", messages.join(" "));
        }
        tracing::warn!("Ignoring password policy: {}", messages.join(" "));
    }

    let pool = create_pool(&config.database)?;
    run_migrations(&pool)?;
    let mut conn = pool.get()?;

    if users::username_taken(&mut conn, username)? {
        bail!("A user with that username already exists.");
    }

    let user = users::create_user(
        &mut conn,
        &passwords,
        &NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            password: args.password,
            is_staff: args.staff,
            ..NewAccount::default()
        },
    )?;
    info!("User {} created with id {}", user.username, user.id);
    Ok(())
}

fn delete_user(config: &AppConfig, username: &str) -> Result<()> {
    let pool = create_pool(&config.database)?;
    run_migrations(&pool)?;
    let mut conn = pool.get()?;

    let user = users::find_by_username(&mut conn, username)?
        .with_context(|| format!("No user named {username}"))?;
    users::delete_user(&mut conn, user.id)?;
    info!("User {} deleted", user.username);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::try_parse_from(["ticketdesk"]).expect("parse");
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_create_user_args() {
        let cli = Cli::try_parse_from([
            "ticketdesk",
            "--config",
            "desk.toml",
            "create-user",
            "admin",
            "--staff",
            "--email",
            "admin@example.com",
            "--password",
            "Tr1cky-Lemur-42",
        ])
        .expect("parse");

        assert_eq!(cli.config, Some(PathBuf::from("desk.toml")));
        match cli.command {
            Some(Command::CreateUser(args)) => {
                assert_eq!(args.username, "admin");
                assert!(args.staff);
                assert!(!args.force);
                assert_eq!(args.email, "admin@example.com");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_delete_user_args() {
        let cli = Cli::try_parse_from(["ticketdesk", "delete-user", "bob"]).expect("parse");
        assert!(matches!(
            cli.command,
            Some(Command::DeleteUser { ref username }) if username == "bob"
        ));
    }

    #[test]
    fn test_create_user_against_file_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = AppConfig::default();
        config.database.url = dir.path().join("cli.sqlite3").display().to_string();
        config.password.argon2 = crate::security::password::Argon2Config::minimal();

        let args = CreateUserArgs {
            username: "admin".into(),
            email: String::new(),
            staff: true,
            password: "Tr1cky-Lemur-42".into(),
            force: false,
        };
        create_user(&config, args).expect("create");

        let duplicate = CreateUserArgs {
            username: "ADMIN".into(),
            email: String::new(),
            staff: false,
            password: "Tr1cky-Lemur-42".into(),
            force: false,
        };
        assert!(create_user(&config, duplicate).is_err());

        delete_user(&config, "admin").expect("delete");
        assert!(delete_user(&config, "admin").is_err());
    }

    #[test]
    fn test_weak_password_needs_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = AppConfig::default();
        config.database.url = dir.path().join("cli.sqlite3").display().to_string();
        config.password.argon2 = crate::security::password::Argon2Config::minimal();

        let weak = |force| CreateUserArgs {
            username: "tester".into(),
            email: String::new(),
            staff: false,
            password: "password123".into(),
            force,
        };
        assert!(create_user(&config, weak(false)).is_err());
        create_user(&config, weak(true)).expect("forced");
    }
}
