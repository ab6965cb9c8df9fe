use std::{
    io::{BufRead, Write},
    path::PathBuf,
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use clap::{Parser, Subcommand};
use metronome_core::{
    store::{deserialize_divisions, serialize_divisions},
    AppConfig, AudioSink, JsonFileStore, MemoryStore, Metronome, MetronomeError, MonotonicClock,
    NullSink, RhythmModel, RhythmStore,
};
use tracing_subscriber::EnvFilter;

fn main() -> metronome_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_json_file(path)?,
        None => AppConfig::default(),
    };
    let store = if cli.ephemeral {
        AppStore::Memory(MemoryStore::new())
    } else {
        AppStore::File(JsonFileStore::new(&cli.state))
    };

    match cli.command.unwrap_or(Commands::Interactive { silent: false }) {
        Commands::Play {
            bpm,
            divisions,
            seconds,
            silent,
        } => run_play(store, &config, bpm, divisions.as_deref(), seconds, silent),
        Commands::Interactive { silent } => run_interactive(store, &config, silent),
        Commands::Show => run_show(&store),
    }
}

fn run_play(
    store: AppStore,
    config: &AppConfig,
    bpm: Option<u32>,
    divisions: Option<&str>,
    seconds: u64,
    silent: bool,
) -> metronome_core::Result<()> {
    let metronome = build_metronome(store, config, silent)?;
    metronome.start_service()?;

    if let Some(bpm) = bpm {
        metronome.set_tempo(i64::from(bpm))?;
    }
    if let Some(divisions) = divisions {
        let parsed = parse_divisions(divisions)?;
        metronome.set_divisions(&parsed)?;
    }

    let rhythm = metronome.set_playing(true)?;
    tracing::info!(%rhythm, seconds, "playing");
    std::thread::sleep(Duration::from_secs(seconds));
    metronome.set_playing(false)?;
    metronome.stop_service()
}

fn run_interactive(
    store: AppStore,
    config: &AppConfig,
    silent: bool,
) -> metronome_core::Result<()> {
    let metronome = build_metronome(store, config, silent)?;
    metronome.start_service()?;
    println!("{}", HELP);
    print_status(&metronome.rhythm());

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        let result = match command {
            Command::Quit => break,
            Command::Help => {
                println!("{}", HELP);
                continue;
            }
            Command::Show => Ok(metronome.rhythm()),
            Command::Toggle => metronome.toggle_playing(),
            Command::Play => metronome.set_playing(true),
            Command::Stop => metronome.set_playing(false),
            Command::Tap => metronome
                .tap()
                .map(|changed| changed.unwrap_or_else(|| metronome.rhythm())),
            Command::Tempo(Change::To(bpm)) => metronome.set_tempo(bpm),
            Command::Tempo(Change::By(delta)) => metronome.nudge_tempo(delta),
            Command::Group(index, Change::To(beats)) => metronome.set_group(index, beats),
            Command::Group(index, Change::By(delta)) => metronome.nudge_group(index, delta),
            Command::Divisions(divisions) => metronome.set_divisions(&divisions),
        };

        match result {
            Ok(rhythm) => print_status(&rhythm),
            Err(err) => tracing::error!(%err, "command failed"),
        }
    }

    metronome.stop_service()
}

fn run_show(store: &AppStore) -> metronome_core::Result<()> {
    let rhythm = store.load()?;
    println!(
        "{rhythm} (divisions {})",
        serialize_divisions(rhythm.divisions())
    );
    Ok(())
}

fn build_metronome(
    store: AppStore,
    config: &AppConfig,
    silent: bool,
) -> metronome_core::Result<Metronome<AppStore>> {
    let sink: Box<dyn AudioSink> = if silent {
        Box::new(NullSink)
    } else {
        Box::new(ConsoleSink::default())
    };
    Metronome::new(store, sink, Arc::new(MonotonicClock::start()), config)
}

fn print_status(rhythm: &RhythmModel) {
    let state = if rhythm.playing() { "playing" } else { "stopped" };
    println!(
        "{rhythm} [{}] {state}",
        serialize_divisions(rhythm.divisions())
    );
}

fn parse_divisions(raw: &str) -> metronome_core::Result<Vec<u32>> {
    let normalized = raw.replace('+', ",");
    deserialize_divisions(&normalized)
        .ok_or_else(|| MetronomeError::msg(format!("cannot read divisions `{raw}`")))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Prints one line per click. Accented clicks show up in capitals.
#[derive(Debug, Default)]
struct ConsoleSink {
    pending: bool,
}

impl AudioSink for ConsoleSink {
    fn set_up(&mut self) -> bool {
        true
    }

    fn tear_down(&mut self) {
        self.pending = false;
    }

    fn trigger(&mut self) {
        self.pending = true;
    }

    // The scheduler sets the gain right after each trigger.
    fn set_gain(&mut self, gain: f32) {
        if std::mem::take(&mut self.pending) {
            let click = if gain >= 1.0 { "TICK" } else { "tock" };
            let mut stdout = std::io::stdout().lock();
            let _ = writeln!(stdout, "{click}");
            let _ = stdout.flush();
        }
    }
}

/// Rhythm storage picked on the command line.
#[derive(Debug)]
enum AppStore {
    File(JsonFileStore),
    Memory(MemoryStore),
}

impl RhythmStore for AppStore {
    fn load(&self) -> metronome_core::Result<RhythmModel> {
        match self {
            Self::File(store) => store.load(),
            Self::Memory(store) => store.load(),
        }
    }

    fn save(&self, rhythm: &RhythmModel) -> metronome_core::Result<()> {
        match self {
            Self::File(store) => store.save(rhythm),
            Self::Memory(store) => store.save(rhythm),
        }
    }
}

const HELP: &str = "\
commands:
  play | stop | toggle      start or stop the clicks
  tap                       tap the tempo (twice or more)
  bpm <n> | bpm +<n>|-<n>   set or nudge the tempo
  group <i> <n> | +<n>|-<n> set or nudge the beats of group i (0 = first)
  div <a+b+c>               replace all groups, e.g. div 4+2+3
  show | help | quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    To(i64),
    By(i64),
}

impl FromStr for Change {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s.parse().map_err(|_| format!("not a number: `{s}`"))?;
        if s.starts_with('+') || s.starts_with('-') {
            Ok(Self::By(value))
        } else {
            Ok(Self::To(value))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Play,
    Stop,
    Toggle,
    Tap,
    Tempo(Change),
    Group(usize, Change),
    Divisions(Vec<u32>),
    Show,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let head = words.next().unwrap_or_default().to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        match (head.as_str(), args.as_slice()) {
            ("play", []) => Ok(Self::Play),
            ("stop", []) => Ok(Self::Stop),
            ("toggle", []) => Ok(Self::Toggle),
            ("tap" | "t", []) => Ok(Self::Tap),
            ("bpm", [value]) => Ok(Self::Tempo(value.parse()?)),
            ("group", [index, value]) => {
                let index = index
                    .parse()
                    .map_err(|_| format!("not a group index: `{index}`"))?;
                Ok(Self::Group(index, value.parse()?))
            }
            ("div", [value]) => parse_divisions(value)
                .map(Self::Divisions)
                .map_err(|err| err.to_string()),
            ("show", []) => Ok(Self::Show),
            ("help" | "?", []) => Ok(Self::Help),
            ("quit" | "exit" | "q", []) => Ok(Self::Quit),
            _ => Err(format!("unknown command `{}`, type `help`", s.trim())),
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Metronome with accented beat groups", long_about = None)]
struct Cli {
    /// File the rhythm is restored from and saved to.
    #[arg(long, default_value = "metronome-rhythm.json", global = true)]
    state: PathBuf,
    /// Keep the rhythm in memory only.
    #[arg(long, global = true)]
    ephemeral: bool,
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play the saved rhythm for a fixed time, optionally changing it first.
    Play {
        #[arg(short, long)]
        bpm: Option<u32>,
        /// Beat groups such as `4+2+3` or `4,2,3`.
        #[arg(short, long)]
        divisions: Option<String>,
        #[arg(short, long, default_value_t = 10)]
        seconds: u64,
        /// Do not print clicks.
        #[arg(long)]
        silent: bool,
    },
    /// Edit and play the rhythm from a prompt.
    Interactive {
        /// Do not print clicks.
        #[arg(long)]
        silent: bool,
    },
    /// Print the saved rhythm.
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!("play".parse::<Command>(), Ok(Command::Play));
        assert_eq!("  TAP ".parse::<Command>(), Ok(Command::Tap));
        assert_eq!("bpm 140".parse::<Command>(), Ok(Command::Tempo(Change::To(140))));
        assert_eq!("bpm -5".parse::<Command>(), Ok(Command::Tempo(Change::By(-5))));
        assert_eq!(
            "group 1 +2".parse::<Command>(),
            Ok(Command::Group(1, Change::By(2)))
        );
        assert_eq!(
            "div 4+2+3".parse::<Command>(),
            Ok(Command::Divisions(vec![4, 2, 3]))
        );
        assert_eq!("q".parse::<Command>(), Ok(Command::Quit));
    }

    #[test]
    fn rejects_garbage() {
        assert!("bpm fast".parse::<Command>().is_err());
        assert!("group x 1".parse::<Command>().is_err());
        assert!("div 4++3".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().is_err());
    }

    #[test]
    fn cli_defaults_to_file_state() {
        let cli = Cli::parse_from(["metronome", "play", "--bpm", "90", "-d", "3+2"]);
        assert_eq!(cli.state, PathBuf::from("metronome-rhythm.json"));
        assert!(!cli.ephemeral);
        match cli.command {
            Some(Commands::Play { bpm, divisions, .. }) => {
                assert_eq!(bpm, Some(90));
                assert_eq!(divisions.as_deref(), Some("3+2"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
