//! palrcon CLI
//!
//! Command-line interface for administering a Palworld server over RCON.

use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use palrcon::{Config, Session, SessionEvent};
use tracing_subscriber::{fmt, EnvFilter};

/// palrcon CLI
#[derive(Parser, Debug)]
#[command(name = "palrcon")]
#[command(about = "RCON client for Palworld dedicated servers")]
#[command(version)]
struct Args {
    /// Server host name or IP address
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server RCON port
    #[arg(short, long, default_value_t = palrcon::config::DEFAULT_PORT)]
    port: u16,

    /// Admin password
    #[arg(short = 'P', long, env = "PALRCON_PASSWORD", hide_env_values = true)]
    password: String,

    /// Per-command timeout in seconds
    #[arg(short, long, default_value = "20")]
    timeout: u64,

    /// Log protocol traffic
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print server version and name
    Info,

    /// List connected players
    Players,

    /// Send a message to every player
    Broadcast {
        /// The message to show
        message: Vec<String>,
    },

    /// Shut the server down
    Shutdown {
        /// Delay before shutdown
        #[arg(short, long, default_value = "30")]
        seconds: u32,

        /// Message shown to players
        message: Vec<String>,
    },

    /// Save the world
    Save,

    /// Kick a player
    Kick {
        /// Steam id of the player
        id: String,
    },

    /// Ban a player
    Ban {
        /// Steam id of the player
        id: String,
    },

    /// Send a command verbatim
    Raw {
        /// Command text
        command: Vec<String>,
    },

    /// Keep the session open and print player list changes
    Watch {
        /// Refresh interval in seconds
        #[arg(short, long, default_value = "10")]
        interval: u64,
    },
}

fn main() {
    let args = Args::parse();

    // Initialize tracing/logging
    let default_filter = if args.verbose { "info,palrcon=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> palrcon::Result<()> {
    let mut builder = Config::builder()
        .host(&args.host)
        .port(args.port)
        .password(&args.password)
        .command_timeout(Duration::from_secs(args.timeout));

    if let Commands::Watch { interval } = args.command {
        builder = builder.player_poll_interval(Duration::from_secs(interval.max(1)));
    }

    let session = Session::new(builder.build());
    session.connect()?;

    let info = session.server_info();
    tracing::info!("Connected to {} ({})", info.name, info.version);

    let result = match args.command {
        Commands::Info => session.info().map(|info| format!("{} {}", info.name, info.version)),
        Commands::Players => session.list_players().map(|players| {
            players
                .iter()
                .map(|p| format!("{}\t{}\t{}", p.name, p.character_id, p.steam_id))
                .collect::<Vec<_>>()
                .join("\n")
        }),
        Commands::Broadcast { message } => session.broadcast(&message.join(" ")),
        Commands::Shutdown { seconds, message } => session.shutdown(seconds, &message.join(" ")),
        Commands::Save => session.save(),
        Commands::Kick { id } => session.kick(&id),
        Commands::Ban { id } => session.ban(&id),
        Commands::Raw { command } => session.raw_command(&command.join(" ")),
        Commands::Watch { .. } => {
            watch(&session);
            Ok(String::new())
        }
    };

    session.disconnect();

    let output = result?;
    let output = output.trim_end();
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

/// Print events until the connection goes away
fn watch(session: &Session) {
    let events = session.events();
    let mut known: Vec<palrcon::Player> = Vec::new();

    for event in events.iter() {
        match event {
            SessionEvent::PlayersUpdated(players) => {
                for player in players.iter().filter(|p| !known.contains(p)) {
                    println!("+ {} ({})", player.name, player.steam_id);
                }
                for player in known.iter().filter(|p| !players.contains(p)) {
                    println!("- {} ({})", player.name, player.steam_id);
                }
                known = players;
            }
            SessionEvent::ServerInfoUpdated(info) => {
                println!("server: {} {}", info.name, info.version);
            }
            SessionEvent::Disconnected { kind, reason } => {
                match reason {
                    Some(reason) => println!("disconnected ({}): {}", kind, reason),
                    None => println!("disconnected ({})", kind),
                }
                break;
            }
            _ => {}
        }
    }
}
