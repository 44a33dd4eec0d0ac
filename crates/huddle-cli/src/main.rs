//! Huddle - a shared prediction party from the terminal
//!
//! Every invocation joins the party stored in a JSON file, runs one command,
//! and pushes any change before exiting. Several terminals (or `huddle watch`)
//! pointed at the same file see each other's edits.

mod display;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde_json::{Map, Value};

use huddle_logging::{FileConfig, HuddleSubscriberBuilder, LogConfig, WorkerGuard};
use huddle_party::prelude::*;

/// Huddle - predictions, scores and trash talk for game day
#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "A shared prediction party", long_about = None)]
struct Cli {
    /// Party document shared between clients
    #[arg(long, global = true, default_value = "huddle-party.json")]
    store: PathBuf,

    /// Sync configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Settings kept on this device only (the theme)
    #[arg(long, global = true, default_value = "huddle-local.json")]
    local: PathBuf,

    /// Client name shown in logs
    #[arg(long, global = true)]
    name: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    level: Option<String>,

    /// Log level for the sync engine only
    #[arg(long, global = true)]
    sync_level: Option<String>,

    /// Human-readable log output instead of JSONL
    #[arg(long, global = true)]
    pretty: bool,

    /// Also write JSONL logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show teams, leaderboard, categories and notes
    Show,

    /// Show the leaderboard
    Leaderboard,

    /// Show one player's predictions
    Player {
        /// Player name
        player: String,
    },

    /// Submit predictions for a player (replaces earlier ones)
    Predict {
        /// Player name
        player: String,

        /// Answers as category=value
        #[arg(short, long = "answer", value_name = "KEY=VALUE")]
        answers: Vec<String>,

        /// Team theme of the player (seahawks, patriots, default);
        /// remembered on this device
        #[arg(long)]
        team: Option<Theme>,
    },

    /// Change some of a player's answers
    Edit {
        /// Player name
        player: String,

        /// Answers as category=value
        #[arg(short, long = "answer", value_name = "KEY=VALUE", required = true)]
        answers: Vec<String>,
    },

    /// Award points to a player
    Award {
        /// Player name
        player: String,

        /// Points to add
        points: i64,
    },

    /// Post a note on the board
    Note {
        /// Your name
        author: String,

        /// Note text
        text: String,

        /// Team theme to tag the note with; remembered on this device
        #[arg(long)]
        team: Option<Theme>,
    },

    /// Change a note's text
    EditNote {
        /// Note ID
        id: NoteId,

        /// New text
        text: String,
    },

    /// Set the two team names
    Teams {
        /// First team
        team1: String,

        /// Second team
        team2: String,
    },

    /// Show or change this device's team theme
    Theme {
        /// New theme (seahawks, patriots, default)
        team: Option<Theme>,
    },

    /// Lock predictions (no new or changed predictions)
    Lock,

    /// Unlock predictions
    Unlock,

    /// Manage prediction categories
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },

    /// Clear every prediction and score
    Reset {
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },

    /// Follow the party live until Ctrl+C
    Watch,
}

#[derive(Subcommand)]
enum CategoryAction {
    /// Add a category
    Add {
        /// Answer key
        key: String,

        /// Label shown to players
        label: String,

        /// Answer type (text, radio, score, number)
        #[arg(long, default_value = "text")]
        kind: CategoryKind,

        /// Points for a correct answer
        #[arg(long, default_value_t = 10)]
        points: i64,
    },

    /// Remove a category
    Remove {
        /// Answer key
        key: String,
    },

    /// Change a category's point value
    Points {
        /// Answer key
        key: String,

        /// New point value
        points: i64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match init_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            display::print_error(&format!("{e:#}"));
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = run(cli).await {
        display::print_error(&format!("{e:#}"));
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn log_config(cli: &Cli) -> LogConfig {
    let mut config = match (&cli.command, &cli.log_dir) {
        (Commands::Watch, Some(dir)) => LogConfig::watch(dir.clone()),
        (_, Some(dir)) => LogConfig {
            file: Some(FileConfig {
                directory: dir.clone(),
                ..FileConfig::default()
            }),
            ..LogConfig::cli()
        },
        (_, None) => LogConfig::cli(),
    };
    if !cli.pretty {
        config.console.pretty = false;
        config.console.ansi = false;
    }
    config
}

fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let mut builder = HuddleSubscriberBuilder::new().with_config(log_config(cli));
    if let Some(level) = &cli.level {
        builder = builder.with_level(level.as_str());
    }
    if let Some(level) = &cli.sync_level {
        builder = builder.with_sync_level(level.as_str());
    }
    builder.init().context("Failed to initialize logging")
}

fn sync_config(cli: &Cli) -> Result<SyncConfig> {
    let config = match &cli.config {
        Some(path) => SyncConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SyncConfig::new("huddle-cli"),
    };
    Ok(match &cli.name {
        Some(name) => config.with_client_name(name.as_str()),
        None => config,
    })
}

async fn run(cli: Cli) -> Result<()> {
    let config = sync_config(&cli)?;
    let store = Arc::new(FileStore::new(&cli.store));
    let party = Party::join(store, config)
        .await
        .with_context(|| format!("Failed to join party at {}", cli.store.display()))?;

    let local = LocalSettings::load(&cli.local)
        .await
        .with_context(|| format!("Failed to read {}", cli.local.display()))?;
    party.apply_local_settings(local);

    let result = execute(&party, cli.command).await;
    let left = party.leave().await;

    if party.local_settings() != local {
        party
            .local_settings()
            .save(&cli.local)
            .await
            .with_context(|| format!("Failed to write {}", cli.local.display()))?;
    }

    result?;
    left.context("Failed to sync changes")?;
    Ok(())
}

async fn execute(party: &Party, command: Commands) -> Result<()> {
    let client = party.client();

    match command {
        Commands::Show => {
            let doc = client.snapshot();
            display::print_party(&doc, &client.leaderboard(), &client.notes_by_recent());
        }

        Commands::Leaderboard => {
            display::print_leaderboard(&client.leaderboard());
        }

        Commands::Player { player } => match client.prediction(player.trim()) {
            Some(prediction) => display::print_prediction(&prediction, &client.categories()),
            None => bail!("No predictions for '{}'", player.trim()),
        },

        Commands::Predict {
            player,
            answers,
            team,
        } => {
            if let Some(team) = team {
                party.set_theme(team);
            }
            let answers = parse_answers(&answers)?;
            let prediction = party.submit_prediction(player, answers).await?;
            display::print_success(&format!(
                "Predictions saved for {}",
                prediction.player_name
            ));
        }

        Commands::Edit { player, answers } => {
            let fields = parse_answers(&answers)?;
            let prediction = client.update_prediction(player, fields).await?;
            display::print_success(&format!(
                "Predictions updated for {}",
                prediction.player_name
            ));
        }

        Commands::Award { player, points } => {
            let total = client.award_points(player.as_str(), points).await?;
            display::print_success(&format!(
                "{} +{} ({} total)",
                player.trim(),
                points,
                total
            ));
        }

        Commands::Note { author, text, team } => {
            if let Some(team) = team {
                party.set_theme(team);
            }
            let id = party.post_note(author, text).await?;
            display::print_success(&format!("Posted note #{id}"));
        }

        Commands::EditNote { id, text } => {
            client.update_note(id, text).await?;
            display::print_success(&format!("Updated note #{id}"));
        }

        Commands::Teams { team1, team2 } => {
            client.set_team_names(team1, team2).await?;
            let teams = client.snapshot().team_names;
            display::print_success(&format!("{} vs {}", teams.team1, teams.team2));
        }

        Commands::Theme { team } => match team {
            Some(team) => {
                party.set_theme(team);
                display::print_success(&format!("Theme set to {team} on this device"));
            }
            None => display::print_info(&format!("Theme: {}", party.theme())),
        },

        Commands::Lock => {
            client.set_predictions_locked(true).await?;
            display::print_success("Predictions locked");
        }

        Commands::Unlock => {
            client.set_predictions_locked(false).await?;
            display::print_success("Predictions unlocked");
        }

        Commands::Category { action } => category(party, action).await?,

        Commands::Reset { yes } => {
            if !yes {
                bail!("Reset clears every prediction and score. Re-run with --yes");
            }
            party.reset_all().await?;
            display::print_success("All predictions and scores cleared");
        }

        Commands::Watch => watch(party).await?,
    }

    Ok(())
}

async fn category(party: &Party, action: CategoryAction) -> Result<()> {
    let client = party.client();

    match action {
        CategoryAction::Add {
            key,
            label,
            kind,
            points,
        } => {
            client
                .add_category(Category::new(key.trim(), label.trim(), kind, points))
                .await?;
            display::print_success(&format!("Added category '{}'", key.trim()));
        }

        CategoryAction::Remove { key } => {
            let removed = client.remove_category(&key).await?;
            display::print_success(&format!("Removed category '{}'", removed.label));
        }

        CategoryAction::Points { key, points } => {
            client.set_category_points(&key, points).await?;
            display::print_success(&format!("'{key}' is now worth {points} points"));
        }
    }

    Ok(())
}

async fn watch(party: &Party) -> Result<()> {
    let client = party.client();
    let mut state = client.watch();
    let mut events = client.events();

    let doc = state.borrow_and_update().clone();
    display::print_party(&doc, &client.leaderboard(), &client.notes_by_recent());
    display::print_info("Watching for changes (Ctrl+C to stop)");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl+C")?;
                println!();
                break;
            }
            Some(event) = events.next() => display::print_event(&event),
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let doc = state.borrow_and_update().clone();
                println!();
                display::print_party(&doc, &client.leaderboard(), &client.notes_by_recent());
            }
        }
    }

    Ok(())
}

/// Parse `key=value` pairs into answer fields.
fn parse_answers(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut answers = Map::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Expected KEY=VALUE, got '{pair}'");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Missing category in '{pair}'");
        }
        answers.insert(key.to_string(), Value::String(value.trim().to_string()));
    }
    Ok(answers)
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
    fn test_parse_answers() {
        let answers =
            parse_answers(&["winner=Seahawks".to_string(), " mvp = Walker ".to_string()])
                .unwrap();
        assert_eq!(answers["winner"], "Seahawks");
        assert_eq!(answers["mvp"], "Walker");
    }

    #[test]
    fn test_parse_answers_keeps_equals_in_value() {
        let answers = parse_answers(&["finalScore=a=b".to_string()]).unwrap();
        assert_eq!(answers["finalScore"], "a=b");
    }

    #[test]
    fn test_parse_answers_rejects_malformed() {
        assert!(parse_answers(&["winner".to_string()]).is_err());
        assert!(parse_answers(&["=Seahawks".to_string()]).is_err());
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "huddle", "award", "Ana", "10", "--store", "den.json", "--level", "debug",
        ])
        .unwrap();
        assert_eq!(cli.store, PathBuf::from("den.json"));
        assert_eq!(cli.level.as_deref(), Some("debug"));
        assert!(matches!(
            cli.command,
            Commands::Award { ref player, points: 10 } if player == "Ana"
        ));
    }

    #[test]
    fn test_parse_category_add() {
        let cli = Cli::try_parse_from([
            "huddle", "category", "add", "safety", "Safety scored?", "--kind", "radio",
            "--points", "25",
        ])
        .unwrap();
        match cli.command {
            Commands::Category {
                action: CategoryAction::Add { key, kind, points, .. },
            } => {
                assert_eq!(key, "safety");
                assert_eq!(kind, CategoryKind::Radio);
                assert_eq!(points, 25);
            }
            _ => panic!("expected category add"),
        }
    }

    #[test]
    fn test_parse_predict_team() {
        let cli = Cli::try_parse_from([
            "huddle", "predict", "Ben", "-a", "winner=Patriots", "--team", "Patriots",
        ])
        .unwrap();
        match cli.command {
            Commands::Predict { answers, team, .. } => {
                assert_eq!(answers, vec!["winner=Patriots".to_string()]);
                assert_eq!(team, Some(Theme::Patriots));
            }
            _ => panic!("expected predict"),
        }
    }

    #[test]
    fn test_team_is_optional() {
        let cli = Cli::try_parse_from(["huddle", "note", "Ana", "go hawks"]).unwrap();
        assert!(matches!(cli.command, Commands::Note { team: None, .. }));
        assert_eq!(cli.local, PathBuf::from("huddle-local.json"));
    }

    #[test]
    fn test_watch_with_log_dir_logs_to_files_only() {
        let cli =
            Cli::try_parse_from(["huddle", "watch", "--log-dir", "logs", "--sync-level", "trace"])
                .unwrap();
        let config = log_config(&cli);
        assert!(!config.console.enabled);
        assert_eq!(config.file.unwrap().directory, PathBuf::from("logs"));
    }

    #[test]
    fn test_commands_log_warnings_to_console() {
        let cli = Cli::try_parse_from(["huddle", "show", "--pretty"]).unwrap();
        let config = log_config(&cli);
        assert!(config.console.enabled);
        assert!(config.console.pretty);
        assert_eq!(config.filter_directive(), "warn");
        assert!(config.file.is_none());
    }
}
