use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use userstore::{
    HttpTokenVault, Record, SortOrder, SqliteBackend, StoreConfig, UserQuery, UserStatus, UserStore,
};

#[derive(Parser)]
#[command(name = "userstore")]
#[command(about = "Manage user records in a SQLite database")]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "USERSTORE_DB", default_value = "userstore.db")]
    db: PathBuf,

    /// Override the table name from the environment
    #[arg(long)]
    table: Option<String>,

    /// Comma-separated columns to tokenize
    #[arg(long, value_delimiter = ',')]
    sensitive: Vec<String>,

    /// Base URL of the token vault
    #[arg(long, env = "USERSTORE_VAULT_URL")]
    vault_url: Option<String>,

    /// Bearer token sent to the vault
    #[arg(long, env = "USERSTORE_VAULT_AUTH_TOKEN", hide_env_values = true)]
    vault_auth_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the user table if missing
    Migrate,
    Create {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "unverified")]
        status: UserStatus,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        memo: Option<String>,
    },
    /// Fetch one user by id, or by email with `--email`
    Get {
        #[arg(conflicts_with = "email", required_unless_present = "email")]
        id: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    List(ListArgs),
    Count {
        #[arg(long)]
        status: Option<UserStatus>,
        #[arg(long = "with-deleted")]
        with_soft_deleted: bool,
    },
    SoftDelete { id: String },
    /// Remove the row and release its tokens
    Delete { id: String },
}

#[derive(Args)]
struct ListArgs {
    #[arg(long)]
    status: Option<UserStatus>,
    #[arg(long, default_value_t = 50)]
    limit: i64,
    #[arg(long, default_value_t = 0)]
    offset: i64,
    #[arg(long, default_value = "created_at")]
    order_by: String,
    #[arg(long, default_value = "desc")]
    sort: SortOrder,
    #[arg(long = "with-deleted")]
    with_soft_deleted: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let store = open_store(&cli)?;

    match cli.command {
        Command::Migrate => {
            store.auto_migrate().await?;
            info!(db = %cli.db.display(), "migration complete");
        }
        Command::Create {
            email,
            status,
            first_name,
            last_name,
            memo,
        } => {
            let mut user = Record::new_user();
            user.set_email(email).set_status(status.as_str());
            if let Some(first_name) = first_name {
                user.set_first_name(first_name);
            }
            if let Some(last_name) = last_name {
                user.set_last_name(last_name);
            }
            if let Some(memo) = memo {
                user.set_memo(memo);
            }
            store.user_create(&mut user).await?;
            print_record(&user)?;
        }
        Command::Get { id, email } => {
            let found = match (id, email) {
                (Some(id), _) => store.user_find_by_id(&id).await?,
                (None, Some(email)) => store.user_find_by_email(&email).await?,
                (None, None) => bail!("pass a user id or --email"),
            };
            match found {
                Some(user) => print_record(&user)?,
                None => bail!("user not found"),
            }
        }
        Command::List(args) => {
            let mut query = UserQuery::new()
                .limit(args.limit)?
                .offset(args.offset)?
                .order_by(args.order_by)?
                .sort_order(args.sort)
                .with_soft_deleted(args.with_soft_deleted);
            if let Some(status) = args.status {
                query = query.status(status.as_str());
            }

            let users = store.user_list(&query).await?;
            let rows: Vec<_> = users.iter().map(Record::to_map).collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Command::Count {
            status,
            with_soft_deleted,
        } => {
            let mut query = UserQuery::new().with_soft_deleted(with_soft_deleted);
            if let Some(status) = status {
                query = query.status(status.as_str());
            }
            let count = store.user_count(&query).await?;
            println!("{}", json!({ "count": count }));
        }
        Command::SoftDelete { id } => {
            let found = store.user_soft_delete_by_id(&id).await?;
            if !found {
                bail!("user {id} not found");
            }
            println!("{}", json!({ "id": id, "soft_deleted": true }));
        }
        Command::Delete { id } => {
            // Fetch first so the row's tokens are released with it.
            match store
                .user_list(&UserQuery::new().id(&id).with_soft_deleted(true))
                .await?
                .into_iter()
                .next()
            {
                Some(user) => store.user_delete(&user).await?,
                None => bail!("user {id} not found"),
            }
            println!("{}", json!({ "id": id, "deleted": true }));
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("userstore=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_store(cli: &Cli) -> Result<UserStore> {
    let mut config = StoreConfig::from_env()
        .context("failed to read USERSTORE_* configuration")?
        .automigrate(true);
    if let Some(table) = &cli.table {
        config.table_name = table.clone();
    }
    if !cli.sensitive.is_empty() {
        config = config.sensitive_columns(cli.sensitive.iter().map(|c| c.trim().to_string()));
    }

    let backend = SqliteBackend::open(&cli.db)
        .with_context(|| format!("failed to open database {}", cli.db.display()))?;
    let mut store = UserStore::new(config)?.with_backend(Arc::new(backend));

    if store.reconciler().is_enabled() {
        let Some(url) = &cli.vault_url else {
            bail!("sensitive columns are configured; pass --vault-url or set USERSTORE_VAULT_URL");
        };
        let mut vault = HttpTokenVault::new(url)?;
        if let Some(token) = &cli.vault_auth_token {
            vault = vault.auth_token(token.clone());
        }
        store = store.with_vault(Arc::new(vault));
    }

    Ok(store)
}

fn print_record(user: &Record) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&user.to_map())?);
    Ok(())
}
