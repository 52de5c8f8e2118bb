//! mw - MacroWing CLI
//!
//! Record keyboard and mouse macros, replay them, and bind them to hotkeys.
//!
//! Supported: macOS, Windows

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use macrowing::prelude::*;
use macrowing::recorder::StopReason;

const POLL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "mw")]
#[command(about = "MacroWing - record and replay keyboard and mouse macros")]
#[command(version)]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // === Recording ===
    /// Record a new macro (Ctrl+C to stop)
    Record {
        #[arg(default_value = "New Macro")]
        name: String,
        /// Record pointer motion
        #[arg(long)]
        movement: bool,
        /// Skip key-up events
        #[arg(long)]
        no_release: bool,
        /// Minimum pointer travel in pixels between recorded moves
        #[arg(long)]
        threshold: Option<f64>,
        /// Seconds to wait before recording starts
        #[arg(long)]
        countdown: Option<u64>,
    },
    /// Play a macro by id or name (Ctrl+C to stop)
    Play {
        target: String,
        /// Override the loop count (0 = until stopped)
        #[arg(short, long)]
        loops: Option<u32>,
        /// Jump the pointer instead of gliding
        #[arg(long)]
        no_smooth: bool,
    },

    // === Library ===
    /// List saved macros
    List,
    /// Show a macro and its actions
    Show {
        target: String,
    },
    /// Delete a macro
    Delete {
        target: String,
    },
    /// Copy a macro under a new id
    Duplicate {
        target: String,
    },
    /// Export macros to a file (all when none given)
    Export {
        output: String,
        targets: Vec<String>,
    },
    /// Import macros from an export file
    Import {
        file: String,
    },

    // === Runtime ===
    /// Listen for macro hotkeys until Ctrl+C
    Listen,
    /// Print the effective settings
    Settings,
}

#[derive(Serialize)]
struct Output<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T: Serialize> Output<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data: Some(data) }
    }
}

fn print_json<T: Serialize>(output: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(output)?);
    Ok(())
}

#[derive(Serialize)]
struct MacroSummary<'a> {
    id: &'a str,
    name: &'a str,
    hotkey: Option<&'a str>,
    actions: usize,
    loop_count: u32,
    enabled: bool,
    duration_ms: f64,
}

impl<'a> From<&'a Macro> for MacroSummary<'a> {
    fn from(m: &'a Macro) -> Self {
        Self {
            id: m.id(),
            name: m.name(),
            hotkey: m.hotkey(),
            actions: m.len(),
            loop_count: m.loop_count(),
            enabled: m.enabled(),
            duration_ms: m.total_duration_ms(),
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Record { name, movement, no_release, threshold, countdown } => {
            record(&name, movement, no_release, threshold, countdown)
        }
        Commands::Play { target, loops, no_smooth } => play(&target, loops, no_smooth),
        Commands::List => list(),
        Commands::Show { target } => show(&target),
        Commands::Delete { target } => delete(&target),
        Commands::Duplicate { target } => duplicate(&target),
        Commands::Export { output, targets } => export(&output, &targets),
        Commands::Import { file } => import(&file),
        Commands::Listen => listen(),
        Commands::Settings => settings(),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn load_settings() -> Result<Settings> {
    let path = Settings::default_path().context("locating settings")?;
    debug!(path = %path.display(), "loading settings");
    Ok(Settings::load(path))
}

fn storage() -> Result<MacroStorage> {
    MacroStorage::new().context("opening macro storage")
}

/// Exact id first, then a case-insensitive name match
fn resolve(macros: &[Macro], target: &str) -> Result<Macro> {
    if let Some(m) = macros.iter().find(|m| m.id() == target) {
        return Ok(m.clone());
    }
    let matches: Vec<&Macro> = macros
        .iter()
        .filter(|m| m.name().eq_ignore_ascii_case(target))
        .collect();
    match matches.as_slice() {
        [m] => Ok((*m).clone()),
        [] => bail!("no macro with id or name '{}'", target),
        _ => bail!("'{}' matches {} macros, use the id", target, matches.len()),
    }
}

fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))
        .context("installing Ctrl+C handler")?;
    Ok(running)
}

// ── Recording ───────────────────────────────────────────────────────────────

fn record(
    name: &str,
    movement: bool,
    no_release: bool,
    threshold: Option<f64>,
    countdown: Option<u64>,
) -> Result<()> {
    let mut settings = load_settings()?;
    settings.record_mouse_movement |= movement;
    if no_release {
        settings.record_key_release = false;
    }
    if let Some(t) = threshold {
        settings.mouse_move_threshold = t;
    }

    let source = macrowing::system_source()?;
    let engine = MacroEngine::new(macrowing::system_synth()?, &settings);
    engine.attach(source.as_ref())?;
    let running = interrupt_flag()?;

    for remaining in (1..=countdown.unwrap_or(settings.countdown_secs)).rev() {
        print!("\rRecording in {}...", remaining);
        io::stdout().flush()?;
        std::thread::sleep(Duration::from_secs(1));
        if !running.load(Ordering::SeqCst) {
            println!();
            return Ok(());
        }
    }

    let events = engine.recorder().subscribe();
    engine.start_recording();
    println!("\rRecording: {} (Ctrl+C to stop)", name);

    let mut count = 0;
    while running.load(Ordering::SeqCst) {
        while let Ok(event) = events.try_recv() {
            if let RecorderEvent::ActionRecorded(_) = event {
                count += 1;
                print!("\r{} actions", count);
                io::stdout().flush()?;
            }
        }
        std::thread::sleep(POLL);
    }

    let mac = engine.finish_recording(name);
    engine.shutdown();
    println!("\n{} actions recorded", mac.len());
    if mac.is_empty() {
        warn!("nothing recorded, not saving");
        return Ok(());
    }
    let storage = storage()?;
    storage.save_macro(&mac)?;
    println!("Saved: {} ({})", mac.name(), mac.id());
    Ok(())
}

fn play(target: &str, loops: Option<u32>, no_smooth: bool) -> Result<()> {
    let mut settings = load_settings()?;
    if no_smooth {
        settings.smooth_mouse_enabled = false;
    }
    let mut mac = resolve(&storage()?.load_all(), target)?;
    if let Some(n) = loops {
        mac.set_loop_count(n);
    }

    let engine = MacroEngine::new(macrowing::system_synth()?, &settings);
    // Without capture the panic key is unavailable but Ctrl+C still works
    match macrowing::system_source() {
        Ok(source) => match engine.attach(source.as_ref()) {
            Ok(()) => {
                engine.register_hotkeys(&[]);
            }
            Err(e) => warn!("panic key unavailable: {}", e),
        },
        Err(e) => warn!("panic key unavailable: {}", e),
    }
    let running = interrupt_flag()?;
    let events = engine.player().subscribe();

    match engine.play(&mac)? {
        PlayOutcome::Started => {}
        PlayOutcome::Empty => {
            println!("{} has no actions", mac.name());
            return Ok(());
        }
        PlayOutcome::RejectedWhileRecording => bail!("cannot play while recording"),
    }
    println!("Playing: {} ({} actions, Ctrl+C to stop)", mac.name(), mac.len());

    let reason = loop {
        if !running.load(Ordering::SeqCst) {
            engine.stop_playback();
        }
        match events.recv_timeout(POLL) {
            Ok(PlayerEvent::Stopped { reason }) => break reason,
            Ok(PlayerEvent::LoopCompleted { loop_index }) => {
                debug!(loop_index, "loop completed");
            }
            Ok(PlayerEvent::ActionFailed { index, message }) => {
                eprintln!("action {} failed: {}", index, message);
            }
            Ok(PlayerEvent::Error { message }) => eprintln!("playback error: {}", message),
            Ok(_) => {}
            Err(e) if e.is_timeout() => {}
            Err(_) => break StopReason::Cancelled,
        }
    };
    engine.shutdown();

    match reason {
        StopReason::Finished => println!("Done"),
        StopReason::Cancelled => println!("Stopped"),
        StopReason::Abandoned => println!("Stopped (playback thread did not exit in time)"),
    }
    Ok(())
}

// ── Library ─────────────────────────────────────────────────────────────────

fn list() -> Result<()> {
    let macros = storage()?.load_all();
    let summaries: Vec<MacroSummary> = macros.iter().map(MacroSummary::from).collect();
    print_json(&Output::ok(summaries))
}

fn show(target: &str) -> Result<()> {
    let mac = resolve(&storage()?.load_all(), target)?;
    println!("{} ({})", mac.name(), mac.id());
    if let Some(hotkey) = mac.hotkey() {
        println!("  hotkey: {}", hotkey);
    }
    println!(
        "  loops: {}  loop delay: {}ms  enabled: {}",
        mac.loop_count(),
        mac.loop_delay(),
        mac.enabled()
    );
    println!("  {} actions, ~{:.0}ms per loop", mac.len(), mac.total_duration_ms());
    for (i, action) in mac.actions().iter().enumerate() {
        println!("  {:>4}  +{:>6.0}ms  {}", i, action.delay_before, action);
    }
    Ok(())
}

fn delete(target: &str) -> Result<()> {
    let storage = storage()?;
    let mac = resolve(&storage.load_all(), target)?;
    storage.delete_macro(mac.id())?;
    println!("Deleted: {} ({})", mac.name(), mac.id());
    Ok(())
}

fn duplicate(target: &str) -> Result<()> {
    let storage = storage()?;
    let copy = resolve(&storage.load_all(), target)?.duplicate();
    storage.save_macro(&copy)?;
    println!("Created: {} ({})", copy.name(), copy.id());
    Ok(())
}

fn export(output: &str, targets: &[String]) -> Result<()> {
    let storage = storage()?;
    let all = storage.load_all();
    match targets {
        [] => storage.export_all(&all, output)?,
        [one] => storage.export_macro(&resolve(&all, one)?, output)?,
        many => {
            let picked = many
                .iter()
                .map(|t| resolve(&all, t))
                .collect::<Result<Vec<_>>>()?;
            storage.export_all(&picked, output)?;
        }
    }
    println!("Exported to {}", output);
    Ok(())
}

fn import(file: &str) -> Result<()> {
    let storage = storage()?;
    let mut macros = storage.load_all();
    let imported = storage
        .import_file(file)
        .with_context(|| format!("importing {}", file))?;
    let count = imported.len();
    for mac in imported {
        // Colliding ids get a fresh one rather than overwriting
        let mac = if macros.iter().any(|m| m.id() == mac.id()) {
            mac.duplicate()
        } else {
            mac
        };
        println!("Imported: {} ({})", mac.name(), mac.id());
        macros.push(mac);
    }
    storage.save_all(&macros)?;
    println!("{} macros imported", count);
    Ok(())
}

// ── Runtime ─────────────────────────────────────────────────────────────────

fn listen() -> Result<()> {
    let settings = load_settings()?;
    let macros = storage()?.load_all();
    let source = macrowing::system_source()?;
    let engine = MacroEngine::new(macrowing::system_synth()?, &settings);
    engine.attach(source.as_ref())?;
    let bound = engine.register_hotkeys(&macros);
    let running = interrupt_flag()?;

    for info in engine.hotkeys().bindings() {
        println!("  {:<16} {}", info.combo.to_string(), info.description);
    }
    println!("Listening for {} hotkeys (Ctrl+C to quit)", bound);

    let events = engine.player().subscribe();
    while running.load(Ordering::SeqCst) {
        while let Ok(event) = events.try_recv() {
            match event {
                PlayerEvent::Started { macro_id } => println!("Playing {}", macro_id),
                PlayerEvent::Stopped { reason } => println!("Stopped ({:?})", reason),
                PlayerEvent::Error { message } => eprintln!("playback error: {}", message),
                _ => {}
            }
        }
        std::thread::sleep(POLL);
    }
    engine.shutdown();
    Ok(())
}

fn settings() -> Result<()> {
    print_json(&Output::ok(load_settings()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> Macro {
        Macro::new(name)
    }

    #[test]
    fn resolves_by_id_then_name() {
        let a = named("Farm");
        let b = named("Login");
        let macros = vec![a.clone(), b.clone()];
        assert_eq!(resolve(&macros, a.id()).unwrap().id(), a.id());
        assert_eq!(resolve(&macros, "login").unwrap().id(), b.id());
        assert!(resolve(&macros, "missing").is_err());
    }

    #[test]
    fn ambiguous_name_is_an_error() {
        let macros = vec![named("Dup"), named("dup")];
        let err = resolve(&macros, "DUP").unwrap_err();
        assert!(err.to_string().contains("matches 2 macros"));
    }

    #[test]
    fn cli_parses_record_flags() {
        let cli = Cli::try_parse_from([
            "mw", "record", "farm", "--movement", "--threshold", "4", "--countdown", "0",
        ])
        .unwrap();
        match cli.command {
            Commands::Record { name, movement, no_release, threshold, countdown } => {
                assert_eq!(name, "farm");
                assert!(movement);
                assert!(!no_release);
                assert_eq!(threshold, Some(4.0));
                assert_eq!(countdown, Some(0));
            }
            _ => panic!("expected record"),
        }
    }

    #[test]
    fn cli_parses_export_targets() {
        let cli = Cli::try_parse_from(["mw", "export", "out.json", "a", "b"]).unwrap();
        match cli.command {
            Commands::Export { output, targets } => {
                assert_eq!(output, "out.json");
                assert_eq!(targets, vec!["a", "b"]);
            }
            _ => panic!("expected export"),
        }
    }
}
