//! Display utilities for CLI output
//!
//! Provides colored, formatted output for the party document.

use chrono::Local;
use colored::*;
use huddle_party::{MAX_PLAYERS, Standing};
use huddle_sync::{Category, Note, Prediction, SyncEvent, SyncedDocument};

/// Print success message
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print error message
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// Print info message
pub fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print the matchup header
pub fn print_header(doc: &SyncedDocument) {
    println!("{}", "─".repeat(50).dimmed());
    println!(
        "{} {} {}",
        doc.team_names.team1.bold(),
        "vs".dimmed(),
        doc.team_names.team2.bold()
    );
    let lock = if doc.predictions_locked {
        "predictions locked".red().to_string()
    } else {
        "predictions open".green().to_string()
    };
    println!(
        "{}/{} players · {} notes · {}",
        doc.predictions.len(),
        MAX_PLAYERS,
        doc.notes.len(),
        lock
    );
    println!("{}", "─".repeat(50).dimmed());
}

/// Print the whole party
pub fn print_party(doc: &SyncedDocument, standings: &[Standing], notes: &[Note]) {
    print_header(doc);
    println!();
    print_leaderboard(standings);
    println!();
    print_categories(&doc.categories);
    println!();
    print_notes(notes);
}

/// Print the leaderboard
pub fn print_leaderboard(standings: &[Standing]) {
    if standings.is_empty() {
        println!("{}", "No predictions yet. Add one with 'predict'".dimmed());
        return;
    }

    println!("{}", "Leaderboard".bold());
    let top = standings.first().map(|s| s.score).unwrap_or(0);
    for standing in standings {
        let medal = match standing.rank {
            1 => "🥇",
            2 => "🥈",
            3 => "🥉",
            _ => "  ",
        };
        let line = format!(
            "  {} {:>2}. {:<20} {:>4} pts",
            medal, standing.rank, standing.player_name, standing.score
        );
        if standing.score > 0 && standing.score == top {
            println!("{}", line.yellow().bold());
        } else {
            println!("{line}");
        }
    }
}

/// Print categories with their point values
pub fn print_categories(categories: &[Category]) {
    if categories.is_empty() {
        println!("{}", "No categories".dimmed());
        return;
    }

    println!("{}", format!("Categories ({}):", categories.len()).bold());
    for category in categories {
        println!(
            "  {:<22} {:<24} {:<7} {:>3} pts",
            category.key.cyan(),
            category.label,
            category.kind.to_string().dimmed(),
            category.point_value
        );
    }
}

/// Print one player's predictions in category order
pub fn print_prediction(prediction: &Prediction, categories: &[Category]) {
    println!("{}", prediction.player_name.yellow().bold());
    for category in categories {
        let answer = prediction
            .answer(&category.key)
            .unwrap_or_else(|| "-".dimmed().to_string());
        println!("  {:<24} {}", category.label.dimmed(), answer);
    }
}

/// Print notes, newest first
pub fn print_notes(notes: &[Note]) {
    if notes.is_empty() {
        println!("{}", "No notes yet. Post one with 'note'".dimmed());
        return;
    }

    println!("{}", format!("Notes ({}):", notes.len()).bold());
    for note in notes {
        let when = note.timestamp.with_timezone(&Local).format("%H:%M");
        let team = if note.team.is_empty() {
            String::new()
        } else {
            format!("[{}]", note.team).dimmed().to_string()
        };
        println!(
            "  {} {} {} {}: {}",
            format!("#{}", note.id).dimmed(),
            when,
            team,
            note.author.cyan(),
            note.text
        );
    }
}

/// Print a sync event while watching
pub fn print_event(event: &SyncEvent) {
    match event {
        SyncEvent::Ready(reason) => print_info(&format!("Connected ({reason})")),
        SyncEvent::RemoteApplied { seq } => {
            println!("{} {}", "↓".blue(), format!("update #{seq}").dimmed())
        }
        SyncEvent::Saved { save_id } => {
            println!("{} {}", "↑".green(), format!("saved #{save_id}").dimmed())
        }
        SyncEvent::SaveFailed { error, .. } => {
            print_error(&format!("Not synced: {error}. Will retry on next edit"))
        }
        SyncEvent::SubscriptionFailed { error } => {
            print_error(&format!("Could not watch the store: {error}"))
        }
        SyncEvent::SubscriptionClosed => print_error("Store stopped sending updates"),
    }
}
