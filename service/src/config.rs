use clap::builder::TypedValueParser as _;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use log::LevelFilter;
use std::path::{Path, PathBuf};

/// Default location of the provider configuration document.
pub const DEFAULT_PROVIDERS_FILE: &str = "providers.json";

/// Default location of the persisted pending requests and tokens.
pub const DEFAULT_STORAGE_PATH: &str = ".implicit-flow/store.json";

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// JSON document mapping provider ids to their authorization settings.
    #[arg(long, env, default_value = DEFAULT_PROVIDERS_FILE)]
    providers_file: PathBuf,

    /// File holding pending authorization requests and issued tokens between runs.
    #[arg(long, env, default_value = DEFAULT_STORAGE_PATH)]
    storage_path: PathBuf,

    /// Location to return to once a redirect has been processed.
    #[arg(long, env)]
    location: Option<String>,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap_or(LevelFilter::Info)),
        )]
    pub log_level_filter: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Start an authorization request unless a matching token is already stored.
    Ensure {
        /// Provider id from the providers file.
        provider: String,
        /// Scope to request; repeat for several. Omit to use the provider default.
        #[arg(long = "scope")]
        scopes: Vec<String>,
    },
    /// Process the URL the provider redirected back to.
    Complete {
        /// Full redirect URL, including its `#access_token=...` fragment.
        redirect: String,
        /// Provider to trust when the redirect carries no state (uncorrelated).
        #[arg(long)]
        fallback_provider: Option<String>,
    },
    /// Print a stored, unexpired access token.
    Token {
        provider: String,
        #[arg(long = "scope")]
        scopes: Vec<String>,
    },
    /// List state tokens of requests whose redirect never came back.
    Pending,
    /// Delete stored tokens for one provider, or for all configured providers.
    Wipe { provider: Option<String> },
    /// Show configuration and stored tokens of every provider.
    Dump,
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn providers_file(&self) -> &Path {
        &self.providers_file
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Returns the location to restore after a redirect, if configured.
    pub fn location(&self) -> Option<String> {
        self.location.clone()
    }

    pub fn set_storage_path(mut self, storage_path: PathBuf) -> Self {
        self.storage_path = storage_path;
        self
    }
}
