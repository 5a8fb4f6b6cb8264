use byte_unit::Byte;
use clap::{CommandFactory, Parser};
use colored::*;
use env_logger::{Builder, Env, Target};
use is_terminal::IsTerminal;
use log::{info, warn};
use projgrep::error::{ProjgrepError, Result as ProjgrepResult};
use projgrep::file_types::SearchMode;
use projgrep::progress::ProgressBarSink;
use projgrep::search::{SearchOptions, SearchRequest, SearchResult, Searcher};
use projgrep::{Cli, Commands, Config, ConfigAction};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[tokio::main]
async fn main() -> ProjgrepResult<()> {
    let cli = Cli::parse();
    setup_logging(&cli)?;

    let start_time = Instant::now();
    info!("Application started with command: {:?}", cli.command);

    match &cli.command {
        Commands::Search {
            query,
            mode,
            extensions,
            root,
            output_dir,
            format,
            jobs,
            no_progress,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(root) = root {
                config.search.search_path = root.clone();
            }
            if let Some(dir) = output_dir {
                config.report.output_dir = dir.clone();
            }
            if let Some(format) = format {
                config.report.format = *format;
            }
            if let Some(jobs) = jobs {
                config.performance.parallel_jobs = *jobs;
            }

            let mode = mode.unwrap_or(config.search.default_mode);
            let extensions = extensions
                .clone()
                .unwrap_or_else(|| config.search.default_extensions.join(","));

            let request = match SearchRequest::from_csv(
                query.trim(),
                mode,
                &extensions,
                config.search.search_path.clone(),
            ) {
                Ok(request) => request,
                Err(e) => {
                    eprintln!("{}", e.to_string().red());
                    std::process::exit(2);
                }
            };
            if mode == SearchMode::CustomExtensions && request.extensions().is_empty() {
                warn!("Custom mode without any extensions, no file will be searched");
            }

            let visible = !*no_progress && std::io::stderr().is_terminal();
            let searcher = Searcher::new(SearchOptions::from_config(&config));
            let result = searcher
                .perform_search(request, ProgressBarSink::new(visible))
                .await;

            print_summary(&result);
            if !result.success {
                std::process::exit(1);
            }
        }

        Commands::Config { action } => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let mut config = load_config(cli.config.as_deref())?;
            match action {
                ConfigAction::Show => {
                    let rendered = toml::to_string_pretty(&config)
                        .map_err(|e| ProjgrepError::Config(e.to_string()))?;
                    println!("{} {}\n", "Config file:".cyan(), path.display());
                    println!("{rendered}");
                }
                ConfigAction::SetRoot { path: root } => {
                    config.search.search_path = existing_dir(root)?;
                    config.save(&path)?;
                    println!(
                        "{} {}",
                        "Search root set to".green(),
                        config.search.search_path.display()
                    );
                }
                ConfigAction::SetOutput { path: dir } => {
                    config.report.output_dir = dir.clone();
                    config.save(&path)?;
                    println!("{} {}", "Reports will be written to".green(), dir.display());
                }
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "projgrep", &mut std::io::stdout());
        }
    }

    info!(
        "Application finished. Total elapsed time: {:.2?}",
        start_time.elapsed()
    );
    Ok(())
}

fn load_config(explicit: Option<&Path>) -> ProjgrepResult<Config> {
    let config = match explicit {
        Some(path) if path.exists() => Config::load_from(path)?,
        Some(path) => {
            warn!("Config file {} not found, using defaults", path.display());
            Config::default()
        }
        None => Config::load()?,
    };
    Ok(config)
}

fn existing_dir(path: &Path) -> ProjgrepResult<PathBuf> {
    let resolved = path.canonicalize().map_err(ProjgrepError::Io)?;
    if !resolved.is_dir() {
        return Err(ProjgrepError::Config(format!(
            "{} is not a directory",
            resolved.display()
        )));
    }
    Ok(resolved)
}

fn print_summary(result: &SearchResult) {
    if !result.success {
        eprintln!("{}", result.message.red().bold());
        return;
    }

    let stats = &result.stats;
    println!("{}", "Search complete".green().bold());
    println!("{}: {}", "Files searched".cyan(), stats.total_files);
    println!("{}: {}", "Matching files".cyan(), stats.matched_files);
    println!("{}: {}", "Matching lines".cyan(), stats.total_matches);
    let adjusted = Byte::from_u64(stats.bytes_scanned)
        .get_appropriate_unit(byte_unit::UnitType::Binary);
    println!(
        "{}: {:.2} {}",
        "Data scanned".cyan(),
        adjusted.get_value(),
        adjusted.get_unit()
    );
    println!("{}: {:.2?}", "Elapsed".cyan(), result.elapsed);
    if let Some(path) = &result.saved_path {
        println!("{}: {}", "Report".cyan(), path.display());
    }
}

fn setup_logging(cli: &Cli) -> ProjgrepResult<()> {
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level));

    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.module_path().unwrap_or("unknown"),
            record.args()
        )
    });

    if let Some(log_path) = &cli.log {
        if let Some(parent_dir) = log_path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                fs::create_dir_all(parent_dir).map_err(ProjgrepError::Io)?;
            }
        }
        let log_file = fs::File::create(log_path).map_err(ProjgrepError::Io)?;
        builder.target(Target::Pipe(Box::new(log_file)));
    } else {
        builder.target(Target::Stderr);
    }

    builder
        .try_init()
        .map_err(|e| ProjgrepError::Other(e.to_string()))?;
    Ok(())
}
