mod backup;
mod commands;
mod config;
mod dav;
mod render;
mod utils;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use davdedup_core::{ClusterPolicy, MatchStrategy};
use log::LevelFilter;

use commands::RunOptions;
use config::Settings;

#[derive(Parser)]
#[command(name = "davdedup", version)]
#[command(about = "Remove duplicate contacts and events from a Nextcloud server")]
struct Cli {
    /// Configuration file (default: <config dir>/davdedup/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server URL, overrides [server] url
    #[arg(long, global = true)]
    server: Option<String>,

    /// Username, overrides [server] username
    #[arg(long, global = true)]
    user: Option<String>,

    /// Similarity threshold (0-100)
    #[arg(long, global = true)]
    threshold: Option<i64>,

    /// Only exact matches on email or name
    #[arg(long, global = true)]
    exact: bool,

    /// Group records connected through any chain of matches
    #[arg(long, global = true)]
    transitive: bool,

    /// Actually delete (dry run otherwise)
    #[arg(long, global = true)]
    delete: bool,

    /// Skip the confirmation prompt
    #[arg(short, long, global = true)]
    yes: bool,

    /// Print plans and reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deduplicate contacts across all address books
    Contacts,
    /// Deduplicate events
    Calendars {
        /// Only this calendar (by display name)
        #[arg(short, long)]
        calendar: Option<String>,
    },
    /// Sync the birthday calendar with contact birthdays
    Birthdays {
        /// Birthday calendar (default: [birthdays] calendar)
        #[arg(short, long)]
        calendar: Option<String>,
    },
    /// Remove identical cards from an exported .vcf file
    File { input: PathBuf, output: PathBuf },
}

impl Cli {
    /// Command line flags win over the configuration file.
    fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(ref url) = self.server {
            settings.server.url = url.clone();
        }
        if let Some(ref user) = self.user {
            settings.server.username = user.clone();
        }
        if let Some(threshold) = self.threshold {
            settings.detection.similarity_threshold = threshold;
        }
        if self.exact {
            settings.detection.strategy = MatchStrategy::Exact;
        }
        if self.transitive {
            settings.detection.clustering = ClusterPolicy::Transitive;
        }
    }
}

fn init_logger(settings: &Settings, verbose: bool) -> Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        settings.logging.level_filter()?
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .parse_default_env()
        .init();

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut settings);
    settings.validate()?;

    init_logger(&settings, cli.verbose)?;

    let run = RunOptions::from_settings(&settings, cli.delete, cli.yes, cli.json)?;

    match cli.command {
        Commands::Contacts => commands::contacts::run(&settings, run),
        Commands::Calendars { ref calendar } => {
            commands::calendars::run(&settings, calendar.as_deref(), run)
        }
        Commands::Birthdays { ref calendar } => {
            commands::birthdays::run(&settings, calendar.as_deref(), run)
        }
        Commands::File {
            ref input,
            ref output,
        } => commands::file::run(input, output, cli.json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::parse_from([
            "davdedup",
            "--server",
            "https://cloud.example.org",
            "--user",
            "alice",
            "--threshold",
            "90",
            "--exact",
            "--transitive",
            "contacts",
        ]);
        let mut settings = Settings::default();
        cli.apply_overrides(&mut settings);

        assert_eq!(settings.server.url, "https://cloud.example.org");
        assert_eq!(settings.server.username, "alice");
        assert_eq!(settings.detection.similarity_threshold, 90);
        assert_eq!(settings.detection.strategy, MatchStrategy::Exact);
        assert_eq!(settings.detection.clustering, ClusterPolicy::Transitive);
        assert!(!cli.delete, "dry run by default");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "davdedup",
            "birthdays",
            "--calendar",
            "Birthdays",
            "--delete",
            "--yes",
        ]);
        assert!(cli.delete);
        assert!(cli.yes);
        assert!(matches!(
            cli.command,
            Commands::Birthdays { calendar: Some(ref c) } if c == "Birthdays"
        ));
    }
}
