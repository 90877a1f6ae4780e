use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::BufRead;
use std::path::{Path, PathBuf};

use pompfbot::auth::{self, Interaction, OAuthFiles};
use pompfbot::secrets;
use pompfbot::store::SheetConfig;
use pompfbot::telegram::{self, TelegramClient};
use pompfbot::{BackendConfig, Bot, Inbound};

#[derive(Parser)]
#[command(name = "pompfbot")]
#[command(about = "Keep duel scores for a team and answer statistics queries", long_about = None)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Where scores are kept
    #[arg(long, value_enum, default_value = "local", global = true)]
    backend: Backend,

    /// Score table for the local backend
    #[arg(long, default_value = "./data/scores.csv", global = true)]
    data: PathBuf,

    /// Spreadsheet id for the sheet backend
    #[arg(long, env = "POMPFBOT_SHEET_ID", global = true)]
    sheet_id: Option<String>,

    /// Cell range holding the table, header row first
    #[arg(long, default_value = "Data!A1:E", global = true)]
    sheet_range: String,

    /// OAuth client secrets downloaded from the API console
    #[arg(long, default_value = "credentials.json", global = true)]
    client_secrets: PathBuf,

    /// Persisted OAuth token
    #[arg(long, default_value = "token.json", global = true)]
    token_file: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Local,
    Sheet,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Telegram bot
    Run {
        /// JSON file with bot API tokens
        #[arg(long, default_value = "./secrets.json")]
        secrets: PathBuf,

        /// Name of the secret API key for the bot
        #[arg(long, env = "POMPFBOT_KEYNAME", default_value = "pompfbot_token")]
        keyname: String,
    },

    /// Read messages from stdin, one per line ("/stats lu" or "lu max 10 4")
    Console,

    /// Authorize access to the spreadsheet and store the token
    Authorize,

    /// Print statistics, optionally for one player or a pair
    Stats {
        /// Up to two names
        names: Vec<String>,
    },

    /// Record match lines, e.g. "lu linus 9-10"
    Add {
        text: Vec<String>,
    },

    /// Back up and delete all scores
    Clear,
}

impl StoreArgs {
    fn oauth_files(&self) -> OAuthFiles {
        OAuthFiles {
            client_secrets: self.client_secrets.clone(),
            token_file: self.token_file.clone(),
        }
    }

    fn backend_config(&self) -> Result<BackendConfig> {
        match self.backend {
            Backend::Local => Ok(BackendConfig::Local {
                path: self.data.clone(),
            }),
            Backend::Sheet => {
                let sheet_id = self
                    .sheet_id
                    .clone()
                    .context("--sheet-id is required for the sheet backend")?;
                Ok(BackendConfig::Sheet(SheetConfig {
                    sheet_id,
                    range: self.sheet_range.clone(),
                    oauth: self.oauth_files(),
                }))
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { secrets, keyname } => {
            run(&cli.store, &secrets, &keyname)?;
        }
        Commands::Console => {
            console(&cli.store)?;
        }
        Commands::Authorize => {
            let client = auth::http_client()?;
            auth::authorize(&client, &cli.store.oauth_files(), Interaction::Allowed)
                .context("Authorization failed")?;
            println!("Token saved to {}", cli.store.token_file.display());
        }
        Commands::Stats { names } => {
            let inbound = Inbound::Command {
                name: "stats".to_string(),
                args: names,
            };
            one_shot(&cli.store, &inbound)?;
        }
        Commands::Add { text } => {
            one_shot(&cli.store, &Inbound::Text(text.join(" ")))?;
        }
        Commands::Clear => {
            let inbound = Inbound::Command {
                name: "clear".to_string(),
                args: Vec::new(),
            };
            one_shot(&cli.store, &inbound)?;
        }
    }

    Ok(())
}

fn run(store: &StoreArgs, secrets_path: &Path, keyname: &str) -> Result<()> {
    let token = secrets::read_secret(secrets_path, keyname).context("Failed to read bot token")?;
    let client = TelegramClient::new(&token)?;
    let mut bot = Bot::new(store.backend_config()?);

    telegram::run_polling(&client, &mut bot)?;
    Ok(())
}

fn console(store: &StoreArgs) -> Result<()> {
    let mut bot = Bot::new(store.backend_config()?);

    for line in std::io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        for reply in bot.handle(&Inbound::parse(&line)) {
            println!("{}", reply);
        }
    }

    Ok(())
}

fn one_shot(store: &StoreArgs, inbound: &Inbound) -> Result<()> {
    let mut bot = Bot::new(store.backend_config()?);
    for reply in bot.handle(inbound) {
        println!("{}", reply);
    }
    Ok(())
}
