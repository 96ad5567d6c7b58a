use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use tracing::info;

use crate::api::{self, ApiState};
use crate::application::{
    AccountProvisioner, AccountsGauge, CreatorIdentity, ProvisioningService, ShutdownSignal,
};
use crate::domain::SignatureAlgorithm;
use crate::ledger::{HttpLedgerGateway, InMemorySigner};
use crate::storage::{AccountStore, MemoryAccountStore, SqliteAccountStore, SqliteConfig};

/// Account API - provisions ledger accounts for user-supplied public keys
#[derive(Parser)]
#[command(name = "account-api")]
#[command(about = "Provisions ledger accounts and keeps an index of issued accounts")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(
        short,
        long,
        global = true,
        env = "ACCOUNT_API_DATABASE",
        default_value = "account-api.db"
    )]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve(ServeArgs),

    /// Create the database schema
    Migrate,

    /// Print the number of issued accounts
    Count,

    /// Print the account owning a public key
    Lookup {
        /// Hex-encoded public key
        public_key: String,
    },

    /// Delete every stored account and key
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    Memory,
    Sqlite,
}

#[derive(Args)]
pub struct ServeArgs {
    /// HTTP port
    #[arg(long, env = "ACCOUNT_API_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address of the account paying for account creation
    #[arg(long, env = "ACCOUNT_API_CREATOR_ADDRESS")]
    pub creator_address: String,

    /// Hex-encoded private key of the creator account
    #[arg(long, env = "ACCOUNT_API_CREATOR_PRIVATE_KEY", hide_env_values = true)]
    pub creator_private_key: String,

    /// Index of the creator key used to sign
    #[arg(long, env = "ACCOUNT_API_CREATOR_KEY_INDEX", default_value_t = 0)]
    pub creator_key_index: u32,

    /// Signature algorithm of the creator key
    #[arg(long, env = "ACCOUNT_API_CREATOR_KEY_SIG_ALGO", default_value = "ED25519")]
    pub creator_key_sig_algo: String,

    /// Base URL of the ledger access API
    #[arg(
        long,
        env = "ACCOUNT_API_ACCESS_API_URL",
        default_value = "http://127.0.0.1:8888"
    )]
    pub access_api_url: String,

    /// Network name, used to label metrics
    #[arg(long, env = "ACCOUNT_API_NETWORK", default_value = "emulator")]
    pub network: String,

    /// Maximum number of accounts to issue (0 = unlimited)
    #[arg(long, env = "ACCOUNT_API_ACCOUNT_LIMIT", default_value_t = 0)]
    pub account_limit: u64,

    /// Account store backend
    #[arg(long, env = "ACCOUNT_API_STORE", value_enum, default_value_t = StoreKind::Sqlite)]
    pub store: StoreKind,

    #[command(flatten)]
    pub db: DatabaseArgs,

    /// Upper bound on one provisioning call, in seconds
    #[arg(long, env = "ACCOUNT_API_SEAL_TIMEOUT_SECS", default_value_t = 120)]
    pub seal_timeout_secs: u64,

    /// Interval between transaction status polls, in milliseconds
    #[arg(long, env = "ACCOUNT_API_POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,
}

#[derive(Args)]
pub struct DatabaseArgs {
    /// Maximum pooled database connections
    #[arg(long, env = "ACCOUNT_API_DB_POOL_SIZE", default_value_t = 5)]
    pub db_pool_size: u32,

    /// Connection attempts before giving up
    #[arg(long, env = "ACCOUNT_API_DB_CONNECT_RETRIES", default_value_t = 30)]
    pub db_connect_retries: u32,

    /// Delay between connection attempts, in milliseconds
    #[arg(long, env = "ACCOUNT_API_DB_RETRY_DELAY_MS", default_value_t = 1000)]
    pub db_retry_delay_ms: u64,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Serve(args) => serve(&self.database, args).await?,

            Commands::Migrate => {
                SqliteAccountStore::init(&SqliteConfig::for_path(&self.database)).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Count => {
                let store = open_store(&self.database).await?;
                println!("{}", store.get_account_count().await?);
            }

            Commands::Lookup { public_key } => {
                let store = open_store(&self.database).await?;
                let account = store.get_account_by_public_key(&public_key).await?;
                println!("{}", serde_json::to_string_pretty(&account)?);
            }

            Commands::Reset { yes } => {
                if !yes {
                    bail!("Refusing to delete all accounts without --yes");
                }
                let store = open_store(&self.database).await?;
                let deleted = store.truncate_all().await?;
                println!("Deleted {} accounts", deleted);
            }
        }

        Ok(())
    }
}

async fn open_store(database: &str) -> Result<SqliteAccountStore> {
    SqliteAccountStore::init(&SqliteConfig::for_path(database)).await
}

async fn serve(database: &str, args: ServeArgs) -> Result<()> {
    let sig_algo = SignatureAlgorithm::from_str(&args.creator_key_sig_algo).with_context(|| {
        format!(
            "Invalid creator key signature algorithm '{}'",
            args.creator_key_sig_algo
        )
    })?;
    let private_key = SecretString::from(args.creator_private_key);
    let signer = InMemorySigner::from_hex(sig_algo, &private_key)
        .context("Invalid creator private key")?;
    let creator = CreatorIdentity::new(
        args.creator_address.clone(),
        args.creator_key_index,
        Arc::new(signer),
    );

    let store: Arc<dyn AccountStore> = match args.store {
        StoreKind::Memory => {
            info!("using in-memory account store");
            Arc::new(MemoryAccountStore::new())
        }
        StoreKind::Sqlite => {
            let config = SqliteConfig::for_path(database)
                .with_pool_size(args.db.db_pool_size)
                .with_retries(
                    args.db.db_connect_retries,
                    Duration::from_millis(args.db.db_retry_delay_ms),
                );
            info!(database, "using SQLite account store");
            Arc::new(SqliteAccountStore::init(&config).await?)
        }
    };

    let metrics = Arc::new(AccountsGauge::new(&args.network)?);
    let (shutdown_trigger, shutdown) = ShutdownSignal::channel();

    let provisioner = AccountProvisioner::new(
        Arc::new(HttpLedgerGateway::new(&args.access_api_url)),
        creator,
    )
    .with_poll_interval(Duration::from_millis(args.poll_interval_ms))
    .with_timeout(Duration::from_secs(args.seal_timeout_secs))
    .with_shutdown(shutdown);

    info!(
        creator = %args.creator_address,
        key_index = args.creator_key_index,
        sig_algo = %provisioner.creator().signer.algorithm(),
        access_api = %args.access_api_url,
        limit = args.account_limit,
        "starting account API"
    );

    let service = ProvisioningService::new(provisioner, store, metrics.clone(), args.account_limit);
    let state = ApiState {
        service: Arc::new(service),
        metrics,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    api::serve(addr, state, async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
        }
        shutdown_trigger.trigger();
    })
    .await
}
