//! stint - Terminal timer and stopwatch with resumable named sessions
//!
//! Usage:
//!   stint timer DURATION [-n NAME]   Count down (bare numbers are seconds)
//!   stint counter [-n NAME]          Count up from zero
//!   stint resume [NAME]              Continue a stored session
//!   stint status [NAME]              Show one stored session
//!   stint list                       Show every session in this directory
//!   stint rm NAME                    Delete a stored session
//!   stint config                     Show effective configuration

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use stint_core::format::{format_duration, parse_duration, suffix_bare_number};
use stint_core::{Config, Paths};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use stint::session::{Mode, Session, SessionState};
use stint::store::{SessionStore, StoreError};

/// stint - Terminal timer and stopwatch
#[derive(Parser)]
#[command(name = "stint")]
#[command(about = "Terminal timer and stopwatch with resumable named sessions")]
#[command(version)]
#[command(after_help = r#"KEYS:
    space, p      Pause / resume
    r             Reset (starts a new run)
    q, Esc, C-c   Quit and save

EXAMPLES:
    stint timer 25m -n tea      # 25-minute countdown named "tea"
    stint timer 90              # 90 seconds (bare numbers are seconds)
    stint counter --inline      # Count up on a single line
    stint resume tea            # Pick up where "tea" left off
    stint list                  # Sessions stored in this directory

FILES:
    .stint-sessions.json        Sessions for the current directory
    ~/.config/stint/config.json Tick rates, warning threshold, restore

ALIASES:
    stint t     # timer
    stint c     # counter
    stint st    # status
    stint ls    # list
"#)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Count down from a duration
    #[command(alias = "t")]
    Timer {
        /// Duration such as 90, 2.5m, 1h30m (bare numbers are seconds)
        duration: String,

        /// Session name (default: "default")
        #[arg(short, long, default_value = "")]
        name: String,

        /// Render on one line instead of full screen
        #[arg(long)]
        inline: bool,
    },

    /// Count up from zero
    #[command(alias = "c")]
    Counter {
        /// Session name (default: "default")
        #[arg(short, long, default_value = "")]
        name: String,

        /// Render on one line instead of full screen
        #[arg(long)]
        inline: bool,
    },

    /// Continue a stored session
    #[command(alias = "r")]
    Resume {
        /// Session name (default: "default")
        #[arg(default_value = "")]
        name: String,
    },

    /// Show a stored session
    #[command(alias = "st")]
    Status {
        /// Session name (default: "default")
        #[arg(default_value = "")]
        name: String,
    },

    /// List sessions stored in this directory
    #[command(alias = "ls")]
    List,

    /// Delete a stored session
    #[command(alias = "remove")]
    Rm {
        /// Session name
        name: String,
    },

    /// Show effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        write_defaults: bool,
    },
}

// ANSI color codes
const GREEN: &str = "\x1b[0;32m";
const YELLOW: &str = "\x1b[0;33m";
const CYAN: &str = "\x1b[0;36m";
const DIM: &str = "\x1b[2m";
const NC: &str = "\x1b[0m";

/// Check if stdout is a TTY and colors should be used
fn use_colors() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stdout())
}

/// Conditionally apply color
fn color(code: &str, text: &str) -> String {
    if use_colors() {
        format!("{}{}{}", code, text, NC)
    } else {
        text.to_string()
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let paths = Paths::new();
    let config = Config::load(&paths.config_file());
    let cwd = std::env::current_dir().context("failed to determine working directory")?;
    let store = SessionStore::in_dir(&cwd);

    match cli.command {
        Some(Commands::Timer {
            duration,
            name,
            inline,
        }) => cmd_timer(&store, &config, &duration, name, inline),
        Some(Commands::Counter { name, inline }) => cmd_counter(&store, &config, name, inline),
        Some(Commands::Resume { name }) => cmd_resume(&store, &config, &name),
        Some(Commands::Status { name }) => cmd_status(&store, &name),
        Some(Commands::List) => cmd_list(&store),
        Some(Commands::Rm { name }) => cmd_rm(&store, &name),
        Some(Commands::Config { write_defaults }) => cmd_config(&paths, &config, write_defaults),
        None => cmd_list(&store),
    }
}

/// Parse a CLI duration, treating a bare number as seconds
fn parse_target(arg: &str) -> Result<std::time::Duration> {
    let target = parse_duration(&suffix_bare_number(arg, "s"))
        .with_context(|| format!("invalid duration '{}'", arg))?;
    if target.is_zero() {
        bail!("duration must be greater than zero");
    }
    Ok(target)
}

/// Pick up elapsed time from a stored run when restore is enabled.
///
/// A stored record that cannot be read is skipped and the session starts
/// fresh.
fn restore(store: &SessionStore, config: &Config, session: &mut Session) -> Result<()> {
    if !config.restore {
        return Ok(());
    }
    match store.load(session.key()) {
        Ok(stored) => {
            session.restore_from(&stored);
            Ok(())
        }
        Err(StoreError::NotFound(_)) => Ok(()),
        Err(e @ StoreError::Malformed { .. }) => {
            warn!("not restoring {}: {}", session.key(), e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Start a countdown
fn cmd_timer(
    store: &SessionStore,
    config: &Config,
    duration: &str,
    name: String,
    inline: bool,
) -> Result<()> {
    let mut session = Session::timer(name, parse_target(duration)?);
    session.inline = inline;
    restore(store, config, &mut session)?;

    let session = stint::app::run(session, store, config)?;
    print_outcome(&session);
    Ok(())
}

/// Start a count-up
fn cmd_counter(store: &SessionStore, config: &Config, name: String, inline: bool) -> Result<()> {
    let mut session = Session::counter(name);
    session.inline = inline;
    restore(store, config, &mut session)?;

    let session = stint::app::run(session, store, config)?;
    print_outcome(&session);
    Ok(())
}

/// Continue a stored session exactly where it stopped
fn cmd_resume(store: &SessionStore, config: &Config, name: &str) -> Result<()> {
    let mut session = store.load(name)?;
    if session.finished {
        bail!(
            "session '{}' has already finished. Start a new one with 'stint timer'",
            session.key()
        );
    }
    session.resume()?;

    let session = stint::app::run(session, store, config)?;
    print_outcome(&session);
    Ok(())
}

/// One-line summary printed after the interactive loop exits
fn print_outcome(session: &Session) {
    match session.state() {
        SessionState::Finished => {
            println!("{} {} finished", color(GREEN, "[done]"), session.key());
        }
        _ => {
            println!(
                "{} {} saved at {}",
                color(CYAN, "[saved]"),
                session.key(),
                describe_time(session)
            );
        }
    }
}

fn describe_time(session: &Session) -> String {
    match session.mode {
        Mode::Timer => format!(
            "{} of {}",
            format_duration(session.elapsed),
            format_duration(session.target)
        ),
        Mode::Counter => format_duration(session.elapsed),
    }
}

fn state_label(state: SessionState) -> String {
    match state {
        SessionState::Running => color(GREEN, state.as_str()),
        SessionState::Paused => color(YELLOW, state.as_str()),
        SessionState::Finished => color(DIM, state.as_str()),
    }
}

/// Show a stored session
fn cmd_status(store: &SessionStore, name: &str) -> Result<()> {
    let session = store.load(name)?;

    println!("{}", color(CYAN, session.key()));
    println!("  {}     {}", color(CYAN, "Mode:"), session.mode.as_str());
    println!("  {}    {}", color(CYAN, "State:"), state_label(session.state()));
    println!("  {}  {}", color(CYAN, "Elapsed:"), format_duration(session.elapsed));
    if let Some(left) = session.remaining() {
        println!("  {}   {}", color(CYAN, "Target:"), format_duration(session.target));
        println!("  {}     {}", color(CYAN, "Left:"), format_duration(left));
    }
    println!(
        "  {}  {}",
        color(CYAN, "Started:"),
        session.start.format("%Y-%m-%d %H:%M:%S")
    );

    Ok(())
}

/// List every session in this directory's store
fn cmd_list(store: &SessionStore) -> Result<()> {
    let sessions = store.list()?;
    if sessions.is_empty() {
        println!("No sessions in this directory");
        println!();
        println!("Start one with: stint timer 25m");
        return Ok(());
    }

    for (key, session) in &sessions {
        println!(
            "  {:<16} {:<8} {:<9} {}",
            key,
            session.mode.as_str(),
            session.state().as_str(),
            describe_time(session)
        );
    }

    Ok(())
}

/// Delete a stored session
fn cmd_rm(store: &SessionStore, name: &str) -> Result<()> {
    store.remove(name)?;
    println!("{} Removed {}", color(GREEN, "[ok]"), stint::session::resolve_name(name));
    Ok(())
}

/// Show (and optionally write) the effective configuration
fn cmd_config(paths: &Paths, config: &Config, write_defaults: bool) -> Result<()> {
    let file = paths.config_file();

    if write_defaults {
        config
            .save(&file)
            .with_context(|| format!("failed to write {}", file.display()))?;
        println!("{} Wrote {}", color(GREEN, "[ok]"), file.display());
        return Ok(());
    }

    println!("{}", color(CYAN, &file.display().to_string()));
    println!(
        "  {}    {:?} / {:?} / {:?}",
        color(CYAN, "Ticks:"),
        config.ticks.fast,
        config.ticks.medium,
        config.ticks.slow
    );
    println!("  {}  {}", color(CYAN, "Warning:"), format_duration(config.warning_threshold));
    println!(
        "  {}    {}x{} spacing {}",
        color(CYAN, "Glyph:"),
        config.glyph.width,
        config.glyph.height,
        config.glyph.spacing
    );
    println!("  {} {}", color(CYAN, "Key buffer:"), config.key_buffer_size);
    println!(
        "  {} {}x{}",
        color(CYAN, "Term size:"),
        config.term.width,
        config.term.height
    );
    println!("  {}  {}", color(CYAN, "Restore:"), config.restore);

    Ok(())
}
