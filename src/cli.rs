use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Color;

use crate::message::Participant;
use crate::transport::ScreenName;

#[derive(Parser)]
#[command(name = "panelflow")]
#[command(version)]
#[command(about = "Watch and drive multi-party AI panel discussions from the terminal")]
pub struct Args {
    /// Path to a TOML config file (endpoints, timing knobs)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List rooms on the server
    Rooms,
    /// Create a room
    CreateRoom {
        /// Display name for the new room
        name: String,
    },
    /// Delete a room
    DeleteRoom {
        /// Room id to delete
        room: u64,
    },
    /// List discussion config files and their panelists
    Configs,
    /// Show the agenda list from a preset agenda file
    Agenda {
        /// Agenda file name, e.g. agenda_list_ja.yml
        file: String,
    },
    /// Watch a room as a viewer over the push transport
    Watch {
        /// Room id to watch
        #[arg(long)]
        room: u64,
        /// Which presentation surface to announce to the server
        #[arg(long, value_enum, default_value = "chat")]
        screen: ScreenName,
    },
    /// Drive a room as executor: start a round, advance with Enter, type to intervene
    Exec {
        #[arg(long)]
        room: u64,
        #[arg(long, default_value = "0")]
        agenda_id: u64,
        /// The agenda to discuss
        #[arg(long)]
        agenda_text: String,
        #[arg(long, default_value = "1")]
        config_id: u64,
        /// Discussion config file name on the server
        #[arg(long)]
        config_file: String,
        /// Discussion language: ja or en
        #[arg(long, default_value = "ja")]
        lang: String,
        /// Enable the discussion-strategy module
        #[arg(long)]
        tech: bool,
        /// Treat the agenda as picked from the preset list (enables cache)
        #[arg(long)]
        select_agenda: bool,
    },
    /// Pull-based presentation surface with paced reveal
    Typing {
        #[arg(long)]
        room: u64,
    },
}

// ---------------------------------------------------------------------------
// Speaker colors
// ---------------------------------------------------------------------------

/// Colors assigned to speakers in roster order.
pub const SPEAKER_COLORS: &[Color] = &[
    Color::BrightBlue,
    Color::BrightYellow,
    Color::BrightMagenta,
    Color::BrightGreen,
    Color::BrightCyan,
    Color::BrightRed,
];

/// Pick a stable terminal color for a speaker. Roster members get their
/// roster position's color; unknown speakers (system notices) get white.
pub fn speaker_color(roster: &[Participant], name: &str) -> Color {
    match roster.iter().position(|p| p.name == name) {
        Some(idx) => SPEAKER_COLORS[idx % SPEAKER_COLORS.len()],
        None => Color::White,
    }
}

/// Default executor user name when none is configured.
pub fn default_user_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("user-{}", &id[..8])
}
