//! `keyward` — authenticate an agent and call the Keyward identity service.
//!
//! Subcommands:
//!
//! - **`keygen`** — create a development signing key.
//! - **`token`** — print a valid access token.
//! - **`whoami`** / **`agents`** — read agent profiles.
//! - **`sign-message`** / **`sign-typed-data`** — ask the service's wallet to sign.
//! - **`sign-out`** — forget persisted credentials.
//!
//! Connection settings come from `KEYWARD_*` environment variables (see
//! [`RuntimeConfig::from_env`]); flags override them. With `--db` (or
//! `KEYWARD_DB`) the refresh token is kept in SQLite so later runs skip the
//! challenge. The signing seed is only needed when a full authentication
//! actually runs.

mod signer;

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use keyward_api::TypedData;
use keyward_runtime::{AgentAuth, MemoryStorage, RuntimeConfig, Signer, SqliteStorage, Storage};
use serde::Serialize;

use signer::{LocalKeySigner, MissingSeed};

/// keyward — Keyward identity service CLI
#[derive(Parser)]
#[command(name = "keyward", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct ConnectionArgs {
    /// Identity service base URL. Overrides KEYWARD_BASE_URL.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Agent the credential is issued for. Overrides KEYWARD_AGENT_REF.
    #[arg(long, global = true)]
    agent_ref: Option<String>,

    /// Wallet credential that signs challenges. Overrides KEYWARD_CREDENTIAL_ID.
    #[arg(long, global = true)]
    credential_id: Option<String>,

    /// Scope to request; repeat or comma-separate. Overrides KEYWARD_SCOPES.
    #[arg(long = "scope", value_delimiter = ',', global = true)]
    scopes: Vec<String>,

    /// SQLite file holding the refresh token. In-memory when absent.
    #[arg(long, env = "KEYWARD_DB", global = true)]
    db: Option<PathBuf>,

    /// Base58 signing seed (see `keyward keygen`).
    #[arg(long, env = "KEYWARD_SEED", hide_env_values = true, global = true)]
    seed: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a development signing key and print its seed and public key.
    Keygen,

    #[command(flatten)]
    Session(SessionCommand),
}

/// Commands that talk to the identity service.
#[derive(Subcommand)]
enum SessionCommand {
    /// Print a valid access token.
    Token,

    /// Print the authenticated agent's profile.
    Whoami,

    /// List agents visible to the authenticated agent.
    Agents,

    /// Have the service wallet sign a plain message.
    SignMessage {
        message: String,
    },

    /// Have the service wallet sign EIP-712 typed data.
    ///
    /// Pass `-` as FILE to read from stdin.
    SignTypedData {
        /// Path to a JSON file, or `-` for stdin.
        file: PathBuf,
    },

    /// Delete the persisted refresh token.
    SignOut,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keyward=info,keyward_runtime=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Keygen => {
            let signer = LocalKeySigner::generate();
            println!("seed:       {}", signer.seed_base58());
            println!("public key: {}", signer.public_key_multibase());
        }
        Command::Session(command) => run(command, connect(&cli.connection).await).await,
    }
}

async fn run(command: SessionCommand, auth: AgentAuth) {
    match command {
        SessionCommand::Token => {
            let token = auth
                .tokens()
                .ensure_access_token()
                .await
                .unwrap_or_else(|e| fatal(&e.to_string()));
            println!("{token}");
        }
        SessionCommand::Whoami => {
            let profile = auth
                .api()
                .get_agent()
                .await
                .unwrap_or_else(|e| fatal(&e.to_string()));
            print_json(&profile);
        }
        SessionCommand::Agents => {
            let agents = auth
                .api()
                .list_agents()
                .await
                .unwrap_or_else(|e| fatal(&e.to_string()));
            print_json(&agents);
        }
        SessionCommand::SignMessage { message } => {
            let sig = auth
                .api()
                .sign_message(&message)
                .await
                .unwrap_or_else(|e| fatal(&e.to_string()));
            println!("{}", sig.signature);
        }
        SessionCommand::SignTypedData { file } => {
            let json = read_input(&file);
            let data: TypedData = serde_json::from_str(&json)
                .unwrap_or_else(|e| fatal(&format!("failed to parse typed data: {e}")));
            let sig = auth
                .api()
                .sign_typed_data(&data)
                .await
                .unwrap_or_else(|e| fatal(&e.to_string()));
            println!("{}", sig.signature);
        }
        SessionCommand::SignOut => {
            auth.tokens()
                .sign_out()
                .await
                .unwrap_or_else(|e| fatal(&e.to_string()));
            println!("signed out");
        }
    }
}

/// Apply connection flags on top of the environment-derived config.
fn with_overrides(mut config: RuntimeConfig, cli: &ConnectionArgs) -> RuntimeConfig {
    if let Some(url) = &cli.base_url {
        config = config.with_base_url(url.clone());
    }
    if let Some(agent_ref) = &cli.agent_ref {
        config = config.with_agent_ref(agent_ref.clone());
    }
    if let Some(credential_id) = &cli.credential_id {
        config = config.with_credential_id(credential_id.clone());
    }
    if !cli.scopes.is_empty() {
        config = config.with_scopes(
            cli.scopes
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(String::from),
        );
    }
    config
}

/// Build the runtime from CLI flags. Exits on unusable settings.
async fn connect(cli: &ConnectionArgs) -> AgentAuth {
    let signer: Arc<dyn Signer> = match cli.seed.as_deref() {
        Some(seed) => {
            Arc::new(LocalKeySigner::from_seed_base58(seed).unwrap_or_else(|e| fatal(&e)))
        }
        None => Arc::new(MissingSeed),
    };
    let config = with_overrides(RuntimeConfig::from_env(), cli);

    let storage: Arc<dyn Storage> = match &cli.db {
        Some(path) => {
            let path = path.to_string_lossy();
            tracing::debug!("storage: SQLite at {path}");
            Arc::new(
                SqliteStorage::open(&path)
                    .unwrap_or_else(|e| fatal(&format!("failed to open database at {path}: {e}"))),
            )
        }
        None => Arc::new(MemoryStorage::new()),
    };

    AgentAuth::builder(signer)
        .config(config)
        .storage(storage)
        .connect()
        .await
        .unwrap_or_else(|e| fatal(&e.to_string()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => fatal(&e.to_string()),
    }
}

/// Read from a file path, or stdin when the path is `-`.
fn read_input(path: &PathBuf) -> String {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .unwrap_or_else(|e| fatal(&format!("failed to read stdin: {e}")));
        buf
    } else {
        fs::read_to_string(path)
            .unwrap_or_else(|e| fatal(&format!("failed to read {}: {e}", path.display())))
    }
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &str) -> ! {
    eprintln!("keyward: {msg}");
    process::exit(2);
}
