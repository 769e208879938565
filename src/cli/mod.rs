pub mod daemon_path;
pub mod process;
pub mod report;

use std::{env, path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use daemon_path::to_daemon_path;
use process::{kill_previous_servers, restart_server};
use report::{milestones_report, print_report, today_report, week_report};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::{
        start_daemon,
        storage::{daily_stats::DailyStatsStore, kv_store::JsonFileStore},
        DaemonSettings,
    },
    input_api::{GenericInputSource, InputSource},
    utils::{
        clock::DefaultClock,
        dir::{create_application_default_path, data_dir, log_dir},
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "keytrail", version, long_about = None)]
#[command(about = "Counts your keystrokes and how far your cursor travels", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application")]
    Init {
        #[arg(long = "mm-per-point", help = "Physical millimetres per display point")]
        mm_per_point: Option<f64>,
    },
    #[command(
        about = "Run a daemon directly in current console. Used for debugging and for platforms without a detached daemon"
    )]
    Serve {
        #[arg(long = "mm-per-point", help = "Physical millimetres per display point")]
        mm_per_point: Option<f64>,
    },
    #[command(about = "Stop currently running daemon.")]
    Stop {},
    #[command(about = "Today's keystrokes, cursor distance and milestone progress")]
    Today {
        #[arg(long, help = "Print as JSON")]
        json: bool,
    },
    #[command(about = "The last 7 days, weekly totals and the daily average")]
    Week {
        #[arg(long, help = "Print as JSON")]
        json: bool,
    },
    #[command(about = "Milestones completed today")]
    Milestones {
        #[arg(long, help = "Print as JSON")]
        json: bool,
    },
    #[command(about = "Remove all recorded statistics")]
    Clear {
        #[arg(long, help = "Confirm removal")]
        yes: bool,
    },
    #[command(about = "Check whether global input can be observed")]
    Permission {
        #[arg(long, help = "Ask the platform to grant input monitoring")]
        request: bool,
    },
}

fn open_store(dir: &std::path::Path) -> Result<DailyStatsStore<JsonFileStore>> {
    Ok(DailyStatsStore::new(
        JsonFileStore::new(data_dir(dir))?,
        Arc::new(DefaultClock),
    ))
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = args
        .dir
        .map_or_else(create_application_default_path, Ok)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &log_dir(&dir), logging_level, args.log)?;

    match args.commands {
        Commands::Init { mm_per_point } => {
            let daemon = to_daemon_path(env::current_exe()?);
            restart_server(daemon, &dir, &DaemonSettings { mm_per_point })
        }
        Commands::Stop {} => {
            let daemon = to_daemon_path(env::current_exe()?);
            let stopped = kill_previous_servers(&daemon)?;
            println!("Stopped {stopped} daemon(s)");
            Ok(())
        }
        Commands::Serve { mm_per_point } => {
            start_daemon(dir, DaemonSettings { mm_per_point }).await
        }
        Commands::Today { json } => print_report(&today_report(&open_store(&dir)?).await?, json),
        Commands::Week { json } => print_report(&week_report(&open_store(&dir)?).await?, json),
        Commands::Milestones { json } => {
            print_report(&milestones_report(&open_store(&dir)?).await?, json)
        }
        Commands::Clear { yes } => {
            if !yes {
                return Err(Args::command()
                    .error(
                        clap::error::ErrorKind::MissingRequiredArgument,
                        "Removing all statistics can't be undone, pass --yes to confirm",
                    )
                    .into());
            }
            open_store(&dir)?.clear_all_data().await?;
            println!("All statistics removed");
            Ok(())
        }
        Commands::Permission { request } => {
            let mut input = GenericInputSource::new();
            if request && !input.is_permitted() {
                input.request_permission();
            }
            println!(
                "Input monitoring is {}",
                if input.is_permitted() {
                    "permitted"
                } else {
                    "not permitted"
                }
            );
            Ok(())
        }
    }
}
