//! cadenza CLI — loads a sound directory and drives the music manager.
//!
//! Usage:
//!   cadenza <assets-dir> <track> [track...]
//!
//! `<assets-dir>` may be omitted when `CADENZA_ASSETS` is set; an explicit
//! directory argument wins over the variable. Commands are then read from
//! stdin, one per line:
//!   play <id>          Make <id> the only audible track
//!   volume <0-100>     Set volume for every track
//!   reset-volume       Back to full volume
//!   pause              Pause everything
//!   resume             Resume the selected track
//!   stop               Stop and rewind everything
//!   mute <on|off>      Persisted mute
//!   status             Print the manager state
//!   quit               Exit

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use cadenza_core::prefs::ShellPreferences;
use cadenza_core::{MusicCommand, MusicManager};
use nine_s_shell::Shell;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((assets, args)) = split_args(args, std::env::var("CADENZA_ASSETS").ok()) else {
        print_usage();
        return;
    };

    // 9S root defaults to ~/.cadenza
    if std::env::var("NINE_S_ROOT").is_err() {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        let root = format!("{}/.cadenza", home);
        std::fs::create_dir_all(&root).ok();
        std::env::set_var("NINE_S_ROOT", &root);
    }

    let shell = match Shell::open("cadenza", &[]) {
        Ok(shell) => shell,
        Err(e) => {
            eprintln!("failed to open 9S shell: {}", e);
            std::process::exit(1);
        }
    };
    let manager = MusicManager::native(&assets, Arc::new(ShellPreferences::new(shell)));

    let report = manager.setup(&args);
    println!("loaded {} of {} tracks from {}", report.loaded.len(), args.len(), assets);
    for id in &report.missing {
        eprintln!("  missing: {}", id);
    }
    for (id, reason) in &report.failed {
        eprintln!("  failed: {} ({})", id, reason);
    }

    let stdin = io::stdin();
    prompt();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => {}
            ["quit"] | ["exit"] => break,
            ["status"] => cmd_status(&manager),
            words => match parse_command(words) {
                Some(cmd) => manager.apply(cmd),
                None => eprintln!("unknown command: {}", line.trim()),
            },
        }
        prompt();
    }

    manager.stop_and_reset_all();
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Split argv into the asset directory and track names.
///
/// A leading argument that names a directory is the asset directory.
/// Otherwise `env_assets` is used and every argument is a track. Without
/// either, the first argument is taken as the directory. `None` when no
/// tracks remain.
fn split_args(mut args: Vec<String>, env_assets: Option<String>) -> Option<(String, Vec<String>)> {
    let first_is_dir = args.first().is_some_and(|a| Path::new(a).is_dir());
    let assets = match env_assets {
        Some(dir) if !first_is_dir => dir,
        _ if !args.is_empty() => args.remove(0),
        _ => return None,
    };
    if args.is_empty() {
        return None;
    }
    Some((assets, args))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn parse_command(words: &[&str]) -> Option<MusicCommand> {
    let cmd = match words {
        ["play", id] => MusicCommand::Play { id: id.to_string() },
        ["volume", level] => {
            let level: u32 = level.parse().ok()?;
            MusicCommand::SetVolume {
                volume: level.min(100) as f32 / 100.0,
            }
        }
        ["reset-volume"] => MusicCommand::ResetVolume,
        ["pause"] => MusicCommand::Pause,
        ["resume"] => MusicCommand::Resume,
        ["stop"] => MusicCommand::Stop,
        ["mute", "on"] => MusicCommand::Mute { muted: true },
        ["mute", "off"] => MusicCommand::Mute { muted: false },
        _ => return None,
    };
    Some(cmd)
}

fn cmd_status(manager: &MusicManager) {
    let snap = manager.snapshot();
    let selected = snap
        .selection
        .track()
        .map(|t| t.as_str())
        .unwrap_or("(none)");
    println!(
        "selected: {}  volume: {}%  paused: {}  muted: {}",
        selected,
        (snap.volume * 100.0).round() as u32,
        snap.paused,
        snap.muted
    );
    for t in &snap.tracks {
        let marker = if t.playing { "▶" } else { " " };
        println!(
            "  {} {:<20} {:>3}%  {}",
            marker,
            t.id.as_str(),
            (t.volume * 100.0).round() as u32,
            format_time(t.position_ms)
        );
    }
    if log::log_enabled!(log::Level::Debug) {
        log::debug!("cadenza: {}", serde_json::to_string(&snap).unwrap_or_default());
    }
}

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn prompt() {
    print!("> ");
    io::stdout().flush().ok();
}

fn format_time(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn print_usage() {
    eprintln!("cadenza — background music manager");
    eprintln!();
    eprintln!("usage: cadenza <assets-dir> <track> [track...]");
    eprintln!("       CADENZA_ASSETS=<dir> cadenza <track> [track...]");
    eprintln!();
    eprintln!("stdin commands:");
    eprintln!("  play <id>          Make <id> the only audible track");
    eprintln!("  volume <0-100>     Set volume for every track");
    eprintln!("  reset-volume       Back to full volume");
    eprintln!("  pause              Pause everything");
    eprintln!("  resume             Resume the selected track");
    eprintln!("  stop               Stop and rewind everything");
    eprintln!("  mute <on|off>      Persisted mute");
    eprintln!("  status             Print the manager state");
    eprintln!("  quit               Exit");
}
