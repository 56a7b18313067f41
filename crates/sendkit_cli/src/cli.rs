use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "sendkit",
    version,
    about = "Export files modified within a date range into a mirrored tree, optionally zipped"
)]
pub(crate) struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Source directory (overrides `source_dir` from config)
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Destination directory (overrides `destination_dir` from config)
    #[arg(short, long)]
    pub destination: Option<PathBuf>,

    /// First modification date to include, YYYY-MM-DD [default: today]
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last modification date to include, YYYY-MM-DD [default: today]
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Zip the destination after a clean copy
    #[arg(long, conflicts_with = "no_zip")]
    pub zip: bool,

    /// Do not zip, even if the config enables it
    #[arg(long)]
    pub no_zip: bool,

    /// Encrypt the archive (requires --zip or `compress = true`)
    #[arg(long)]
    pub protect: bool,

    /// Archive password
    #[arg(long, env = "SENDKIT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Extra directory exclusion pattern (repeatable)
    #[arg(short = 'x', long = "exclude")]
    pub exclude: Vec<String>,

    /// Suppress the live progress line
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Tracing filter directive implied by `-v`.
    pub(crate) fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
