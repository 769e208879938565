use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

use super::DaemonSettings;

#[derive(Parser)]
#[command(name = "keytrail-daemon", version, about = "Records keystrokes and cursor travel")]
pub struct DaemonArgs {
    /// Keep running in the current process instead of detaching.
    #[arg(long)]
    pub force: bool,
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
    /// Physical millimetres per display point. Overrides the display lookup.
    #[arg(long = "mm-per-point")]
    pub mm_per_point: Option<f64>,
}

impl DaemonArgs {
    pub fn settings(&self) -> DaemonSettings {
        DaemonSettings {
            mm_per_point: self.mm_per_point,
        }
    }
}
