// Paper Sniper - CLI entry point
// Streams token launches and paper-trades them under live risk controls

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use paper_sniper::{Config, ConfigError, TradingError};

// Load command modules from cli directory
#[path = "../cli/run_commands.rs"]
mod run_commands;
#[path = "../cli/control_commands.rs"]
mod control_commands;

#[derive(Parser)]
#[command(name = "paper-sniper")]
#[command(version)]
#[command(about = "Paper-trading sniper for pump.fun token launches", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream launches and paper-trade them (default)
    Run,

    /// Stream launches into the database without trading
    Collect,

    /// Show portfolio status and the creator leaderboard
    Status {
        /// Number of creators to list
        #[arg(short, long, default_value = "10")]
        top: usize,
    },

    /// Write a default config.toml and an empty control file
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Inspect or edit the hot-reloaded control file
    #[command(subcommand)]
    Control(ControlCommands),

    /// Flag a creator wallet so it is never entered
    Blacklist {
        /// Creator wallet address
        wallet: String,

        /// Reason recorded in the database
        #[arg(short, long, default_value = "manual")]
        reason: String,
    },
}

#[derive(Subcommand)]
enum ControlCommands {
    /// Print active overrides
    Show,

    /// Set an override (value is JSON, bare words are taken as strings)
    Set {
        key: String,
        value: String,
    },

    /// Remove an override
    Clear {
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins, then --verbose, then the configured level
    let configured_level = Config::from_file(&cli.config)
        .map(|c| c.monitoring.log_level)
        .unwrap_or_else(|_| "info".to_string());
    let level = if cli.verbose { "debug".to_string() } else { configured_level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🎯 Paper Sniper v{}", env!("CARGO_PKG_VERSION"));
    info!("📁 Config: {}", cli.config);

    let result = match cli.command.unwrap_or(Commands::Run) {
        // Init doesn't require config (it creates it)
        Commands::Init { force } => run_commands::init_workspace(&cli.config, force),

        Commands::Run => {
            let config = load_config_or_exit(&cli.config);
            run_commands::run_bot(&config, true).await
        }

        Commands::Collect => {
            let config = load_config_or_exit(&cli.config);
            run_commands::run_bot(&config, false).await
        }

        Commands::Status { top } => {
            let config = load_config_or_exit(&cli.config);
            run_commands::show_status(&config, top)
        }

        Commands::Control(cmd) => {
            let config = load_config_or_exit(&cli.config);
            match cmd {
                ControlCommands::Show => control_commands::show(&config),
                ControlCommands::Set { key, value } => control_commands::set(&config, &key, &value),
                ControlCommands::Clear { key } => control_commands::clear(&config, &key),
            }
        }

        Commands::Blacklist { wallet, reason } => {
            let config = load_config_or_exit(&cli.config);
            run_commands::blacklist(&config, &wallet, &reason)
        }
    };

    if let Err(e) = result {
        error!("❌ {} error", e.category());
        error!("{}", e.user_message());
        std::process::exit(1);
    }

    Ok(())
}

/// Load config or exit with helpful error message
fn load_config_or_exit(path: &str) -> Config {
    match Config::from_file(path) {
        Ok(mut config) => {
            config.apply_env_overrides();
            if let Err(e) = config.validate() {
                error!("❌ Environment overrides produced an invalid configuration");
                error!("{}", TradingError::from(e).user_message());
                std::process::exit(1);
            }
            config
        }
        Err(e) => {
            error!("❌ Configuration Error");
            if matches!(e, ConfigError::FileRead(_)) && !std::path::Path::new(path).exists() {
                error!("{}", TradingError::ConfigNotFound(path.to_string()).user_message());
            } else {
                warn!("{}", e);
                error!("{}", TradingError::from(e).user_message());
            }
            std::process::exit(1);
        }
    }
}
