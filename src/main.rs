use chronos::{
    app::App,
    app_dirs::AppDirs,
    archive::{SessionArchive, SqliteArchive},
    clock::SystemClock,
    config::{Config, ConfigStore, FileConfigStore},
    export::{export, ExportFormat},
    format::{format_duration, format_signed},
    haptics::{Haptics, NoHaptics, TerminalBell},
    runtime::{ChronoEvent, CrosstermEventSource, FixedTicker, Runner},
};
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::{self, File},
    io::{self, stdin, Write},
    path::PathBuf,
    sync::Mutex,
};

/// several independent stopwatches with laps and a saved history
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal stopwatch: run several independent timers side by side, record laps, and keep a history of finished runs."
)]
pub struct Cli {
    /// number of timers to show (1-9)
    #[clap(short = 'n', long)]
    timers: Option<usize>,

    /// label prefix for laps recorded without a label
    #[clap(long)]
    lap_prefix: Option<String>,

    /// disable the bell on every action
    #[clap(long)]
    no_haptics: bool,

    /// session history database (defaults to ~/.local/state/chronos/history.db)
    #[clap(long)]
    db: Option<PathBuf>,

    /// config file (defaults to the platform config directory)
    #[clap(long)]
    config: Option<PathBuf>,

    /// increase log verbosity (-v warn, -vv info, -vvv debug, -vvvv trace)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// print saved sessions, newest first
    List,
    /// write saved sessions as json or csv
    Export {
        #[clap(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// output file (stdout if omitted)
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// delete a saved session
    Delete { session: String },
    /// delete one lap from a saved session
    DeleteLap { session: String, lap: String },
    /// delete every saved session
    Clear,
}

impl Cli {
    fn resolve_config(&self) -> Config {
        let store = match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        };
        let mut config = store.load();

        if let Some(timers) = self.timers {
            config.timer_count = timers;
        }
        if let Some(prefix) = &self.lap_prefix {
            config.lap_label_prefix = prefix.clone();
        }
        if self.no_haptics {
            config.haptics = false;
        }
        config.sanitized()
    }

    fn db_path(&self) -> PathBuf {
        self.db
            .clone()
            .or_else(AppDirs::db_path)
            .unwrap_or_else(|| PathBuf::from("chronos_history.db"))
    }
}

fn log_level(verbosity: u8) -> tracing::Level {
    match verbosity {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

/// The TUI owns the terminal, so it logs to a file; subcommands log to stderr.
fn init_logging(verbosity: u8, to_file: bool) -> Result<(), Box<dyn Error>> {
    let level = log_level(verbosity);

    let log_file = if to_file {
        AppDirs::log_path().and_then(|path| {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).ok()?;
            }
            File::options().create(true).append(true).open(path).ok()
        })
    } else {
        None
    };

    match log_file {
        Some(file) => {
            let subscriber = tracing_subscriber::FmtSubscriber::builder()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None if to_file => {
            // nowhere to write without corrupting the screen
            let subscriber = tracing_subscriber::FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(io::sink)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = tracing_subscriber::FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.command.is_none())?;
    tracing::debug!(?cli, "starting chronos");

    if let Some(command) = cli.command.clone() {
        let mut archive = SqliteArchive::open(cli.db_path())?;
        return run_command(command, &mut archive, &mut io::stdout().lock());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let config = cli.resolve_config();
    let archive: Option<Box<dyn SessionArchive>> = match SqliteArchive::open(cli.db_path()) {
        Ok(archive) => Some(Box::new(archive)),
        Err(e) => {
            tracing::error!(%e, "session history unavailable");
            None
        }
    };
    let haptics: Box<dyn Haptics> = if config.haptics {
        Box::new(TerminalBell::stdout())
    } else {
        Box::new(NoHaptics)
    };
    let ticker = FixedTicker::new(config.frame_interval());
    let mut app = App::new(config, SystemClock::new(), archive, haptics);

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, ticker);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    ticker: FixedTicker,
) -> Result<(), Box<dyn Error>> {
    let mut runner = Runner::new(CrosstermEventSource::new(), ticker);

    terminal.draw(|f| f.render_widget(&*app, f.area()))?;

    loop {
        match runner.step() {
            ChronoEvent::Frame => {
                // nothing running means nothing changes on screen
                if app.on_frame() {
                    terminal.draw(|f| f.render_widget(&*app, f.area()))?;
                }
            }
            ChronoEvent::Resize => {
                terminal.draw(|f| f.render_widget(&*app, f.area()))?;
            }
            ChronoEvent::Key(key) => {
                app.on_key(key);
                if app.should_quit {
                    break;
                }
                terminal.draw(|f| f.render_widget(&*app, f.area()))?;
            }
        }
    }

    Ok(())
}

fn run_command<W: Write>(
    command: Command,
    archive: &mut dyn SessionArchive,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::List => {
            let sessions = archive.list()?;
            if sessions.is_empty() {
                writeln!(out, "No saved sessions")?;
            }
            for session in sessions {
                let label = if session.label.is_empty() {
                    "(no label)"
                } else {
                    session.label.as_str()
                };
                writeln!(
                    out,
                    "{}  {}  {}  {}",
                    session.id,
                    session.timestamp,
                    format_duration(session.total_time),
                    label
                )?;
                for (i, lap) in session.laps.iter().enumerate() {
                    writeln!(
                        out,
                        "    {:>3}  {:<20} {:>12} {:>12}  {}",
                        i + 1,
                        lap.label,
                        format_signed(lap.lap_time),
                        format_duration(lap.total_time).to_string(),
                        lap.id
                    )?;
                }
            }
        }
        Command::Export { format, output } => {
            let sessions = archive.list()?;
            match output {
                Some(path) => export(format, &sessions, File::create(&path)?)?,
                None => {
                    export(format, &sessions, &mut *out)?;
                    if format == ExportFormat::Json {
                        writeln!(out)?;
                    }
                }
            }
            tracing::info!(count = sessions.len(), %format, "exported sessions");
        }
        Command::Delete { session } => {
            if archive.delete(&session)? {
                writeln!(out, "Deleted session {session}")?;
            } else {
                writeln!(out, "No session {session}")?;
            }
        }
        Command::DeleteLap { session, lap } => {
            if archive.delete_lap(&session, &lap)? {
                writeln!(out, "Deleted lap {lap} from session {session}")?;
            } else {
                writeln!(out, "No lap {lap} in session {session}")?;
            }
        }
        Command::Clear => {
            archive.clear()?;
            writeln!(out, "History cleared")?;
        }
    }
    Ok(())
}
