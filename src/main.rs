//! qinmap - turns MIDI files into guqin keyboard scripts.
//!
//! # Usage
//!
//! ```bash
//! qinmap tracks song.mid
//! qinmap render song.mid --config session.json --out song.ahk
//! qinmap render --config session.json --json   # file taken from "midi_path"
//! qinmap analyze ~/midi --config session.json
//! ```
//!
//! Set `RUST_LOG=debug` to see what the loader repaired.

use anyhow::{bail, Context, Result};
use qinmap::analyze::analyze_directory;
use qinmap::color::track_palette;
use qinmap::midi::load_midi_file;
use qinmap::script::write_script;
use qinmap::worker::TransformSession;
use qinmap::SessionConfig;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What the user asked the tool to do.
enum Command {
    /// Print the track table of a file.
    Tracks { file: PathBuf },
    /// Run a transform and export the result.
    Render {
        /// Overrides the configuration's `midi_path`.
        file: Option<PathBuf>,
        out: Option<PathBuf>,
        json: bool,
    },
    /// Rank every MIDI file in a directory by playable range.
    Analyze { dir: PathBuf },
}

/// Command-line options for the application.
struct CliOptions {
    command: Command,
    /// Session settings file.
    config: Option<PathBuf>,
}

fn print_help(program: &str) {
    eprintln!("qinmap - MIDI to guqin keyboard mapper");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {} tracks <FILE>", program);
    eprintln!("  {} render [FILE] [--config PATH] [--out PATH] [--json]", program);
    eprintln!("  {} analyze <DIR> [--config PATH]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config PATH  Session settings (JSON)");
    eprintln!("  -o, --out PATH     Write the key-press script here");
    eprintln!("  --json             Print the resolved notes as JSON on stdout");
    eprintln!("  -h, --help         Print this help message");
    eprintln!();
    eprintln!("render reads FILE from the config's \"midi_path\" when it is omitted.");
}

impl CliOptions {
    /// Parses command-line arguments.
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let program = args.first().map(String::as_str).unwrap_or("qinmap");

        if args.len() < 2 || args.iter().any(|a| a == "--help" || a == "-h") {
            print_help(program);
            std::process::exit(0);
        }

        let subcommand = args[1].as_str();
        let mut positional: Option<PathBuf> = None;
        let mut config = None;
        let mut out = None;
        let mut json = false;
        let mut i = 2;

        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    i += 1;
                    let path = args.get(i).context("--config requires a path argument")?;
                    config = Some(PathBuf::from(path));
                }
                "--out" | "-o" if subcommand == "render" => {
                    i += 1;
                    let path = args.get(i).context("--out requires a path argument")?;
                    out = Some(PathBuf::from(path));
                }
                "--json" if subcommand == "render" => json = true,
                other if !other.starts_with('-') && positional.is_none() => {
                    positional = Some(PathBuf::from(other));
                }
                other => bail!("unexpected argument: {} (use --help for usage)", other),
            }
            i += 1;
        }

        let command = match subcommand {
            "tracks" => Command::Tracks {
                file: positional.context("'tracks' requires a file argument")?,
            },
            "analyze" => Command::Analyze {
                dir: positional.context("'analyze' requires a directory argument")?,
            },
            "render" => Command::Render {
                file: positional,
                out,
                json,
            },
            other => bail!("unknown command: {} (use --help for usage)", other),
        };

        Ok(Self { command, config })
    }
}

fn main() -> Result<()> {
    let cli = CliOptions::parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => SessionConfig::load_from_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => SessionConfig::default(),
    };

    match cli.command {
        Command::Tracks { file } => print_tracks(&file),
        Command::Render { file, out, json } => {
            let file = file
                .or_else(|| config.midi_path.clone())
                .context("No MIDI file given and the config has no \"midi_path\"")?;
            render(&file, &config, out, json)
        }
        Command::Analyze { dir } => analyze(&dir, &config),
    }
}

fn print_tracks(path: &Path) -> Result<()> {
    let file = load_midi_file(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let session = TransformSession::new(file, Arc::default());
    let palette = track_palette(session.tracks().len());

    println!("{:>5}  {:>6}  {:<7}  Name", "Track", "Notes", "Color");
    for (track, color) in session.tracks().iter().zip(&palette) {
        println!(
            "{:>5}  {:>6}  {:<7}  {}",
            track.index,
            track.note_count,
            color.hex(),
            track.name
        );
    }
    Ok(())
}

fn render(path: &Path, config: &SessionConfig, out: Option<PathBuf>, json: bool) -> Result<()> {
    let file = load_midi_file(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let track_count = file.track_count();
    let mut session = TransformSession::new(file, Arc::new(config.keymap()));

    let keymap = session.keymap();
    eprintln!(
        "Mappable range: {}-{}",
        keymap.name_of(keymap.min_mapped()).unwrap_or("?"),
        keymap.name_of(keymap.max_mapped()).unwrap_or("?")
    );

    let run = session
        .submit(config.request(track_count))
        .context("Failed to start transform")?;

    let mut stderr = io::stderr();
    for percent in run.progress.iter() {
        let _ = write!(stderr, "\rMapping... {:>3}%", percent);
        let _ = stderr.flush();
    }
    let _ = writeln!(stderr);

    let output = run.wait().context("Transform was cancelled")?;
    let mapped = output.notes.iter().filter(|n| n.key.is_some()).count();
    let in_range = output
        .notes
        .iter()
        .filter(|n| n.in_mappable_range)
        .count();
    eprintln!(
        "{} notes: {} mapped to keys, {} in range, {} out of range",
        output.notes.len(),
        mapped,
        in_range,
        output.notes.len() - in_range
    );

    if let Some(out) = out {
        write_script(&output.notes, config.playback_speed, &out)
            .with_context(|| format!("Failed to write script {}", out.display()))?;
        eprintln!("Script written to {}", out.display());
    }

    if json {
        let stdout = io::stdout();
        serde_json::to_writer_pretty(stdout.lock(), &output)
            .context("Failed to write JSON output")?;
        println!();
    }

    Ok(())
}

fn analyze(dir: &Path, config: &SessionConfig) -> Result<()> {
    let keymap = config.keymap();
    let entries = analyze_directory(dir, &keymap)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;

    if entries.is_empty() {
        eprintln!("No MIDI files found in {}", dir.display());
        return Ok(());
    }

    println!("{:>7}  {:>6}  {:>8}  File", "Range", "Notes", "In range");
    for entry in &entries {
        println!(
            "{:>6.1}%  {:>6}  {:>8}  {}",
            entry.percentage,
            entry.total_notes,
            entry.in_range,
            entry.path.display()
        );
    }
    Ok(())
}
