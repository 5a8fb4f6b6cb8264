use crate::file_types::SearchMode;
use crate::report::ReportFormat;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(long, global = true, value_parser, default_value_t = false)]
    pub verbose: bool,

    /// Write log output to this file instead of stderr
    #[clap(long, global = true, value_parser)]
    pub log: Option<PathBuf>,

    /// Use this config file instead of the default lookup
    #[clap(long, global = true, value_parser)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search file contents and write a report
    Search {
        query: String,

        #[clap(long, value_enum)]
        mode: Option<SearchMode>,

        /// Comma-separated extensions, used with `--mode custom`
        #[clap(long, value_parser)]
        extensions: Option<String>,

        /// Directory to search instead of the configured one
        #[clap(long, value_parser)]
        root: Option<PathBuf>,

        #[clap(long, value_parser)]
        output_dir: Option<PathBuf>,

        #[clap(long, value_enum)]
        format: Option<ReportFormat>,

        /// Scan workers, 0 for one per CPU
        #[clap(short, long, value_parser)]
        jobs: Option<usize>,

        #[clap(long, value_parser, default_value_t = false)]
        no_progress: bool,
    },
    /// Show or change persisted settings
    Config {
        #[clap(subcommand)]
        action: ConfigAction,
    },
    Completions {
        #[clap(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    Show,
    /// Set the directory searches start from
    SetRoot { path: PathBuf },
    /// Set the directory reports are written to
    SetOutput { path: PathBuf },
}
