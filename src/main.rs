//! navidbg - Debug client inspector
//!
//! Entry point that handles CLI argument parsing, builds the process model
//! from a recorded reply stream or a live debug client, and starts the REPL.

use clap::Parser;
use navidbg::app::AppState;
use navidbg::ui::cli::run_cli;
use navidbg::SessionConfig;

/// navidbg: debug client protocol inspector
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Recorded reply stream to replay before starting the REPL
    #[arg(short, long, conflicts_with = "connect")]
    replay: Option<String>,

    /// Debug client to connect to (host:port)
    #[arg(short, long)]
    connect: Option<String>,

    /// Do not expect the authentication magic before the first reply
    #[arg(long, default_value_t = false)]
    no_auth: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    // 1. Parse command line arguments
    let args = Args::parse();

    // 2. Initialize logger with verbosity level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        },
    ))
    .init();

    log::debug!("Replay: {:?}", args.replay);
    log::debug!("Connect: {:?}", args.connect);

    let config = SessionConfig::default().with_authentication(!args.no_auth);
    let mut state = AppState::new(config);

    println!("[*] navidbg v{}", env!("CARGO_PKG_VERSION"));

    // 3. Populate the process model
    if let Some(path) = &args.replay {
        let session_state = state.replay(path)?;
        println!(
            "[*] Replayed {} replies from {}, session {}",
            state.reply_count(),
            path,
            session_state
        );
    } else if let Some(address) = &args.connect {
        state.connect(address)?;
        println!("[*] Connected to {}", address);
    }

    // 4. Inspect
    run_cli(&mut state)
}
