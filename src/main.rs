//! Cellflow - run a batch of cell edits and print the resulting sheet as CSV

mod batch;
mod config;
mod error;

use anyhow::Context;
use cellflow_core::Document;
use cellflow_core::storage::{to_csv, write_csv};
use std::env;
use std::path::PathBuf;

fn print_usage() {
    eprintln!("Usage: cellflow [OPTIONS] [SCRIPT]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [SCRIPT]                  Script of cell edits to run (default: stdin)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <FILE>       Load settings from FILE instead of cellflow.toml");
    eprintln!("  --no-config               Ignore the user's cellflow.toml");
    eprintln!("  -o, --output <FILE>       Write CSV to FILE instead of stdout");
    eprintln!("  --width <N>               Number of columns");
    eprintln!("  --height <N>              Number of rows");
    eprintln!("  -h, --help                Print help");
}

fn parse_size(args: &[String], i: usize, flag: &str) -> usize {
    match args.get(i).map(|arg| arg.parse::<usize>()) {
        Some(Ok(n)) if n > 0 => n,
        Some(_) => {
            eprintln!("Error: {} requires a positive number", flag);
            std::process::exit(1);
        }
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|err| {
            eprintln!("Warning: invalid log filter {:?}: {}", default_filter, err);
            EnvFilter::new("warn")
        });
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .with(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut script_path: Option<PathBuf> = None;
    let mut config_file: Option<PathBuf> = None;
    let mut no_config = false;
    let mut output_file: Option<PathBuf> = None;
    let mut width: Option<usize> = None;
    let mut height: Option<usize> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                return Ok(());
            }
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a file path");
                    std::process::exit(1);
                }
                config_file = Some(PathBuf::from(&args[i]));
            }
            "--no-config" => no_config = true,
            "-o" | "--output" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --output requires a file path");
                    std::process::exit(1);
                }
                output_file = Some(PathBuf::from(&args[i]));
            }
            "--width" => {
                i += 1;
                width = Some(parse_size(&args, i, "--width"));
            }
            "--height" => {
                i += 1;
                height = Some(parse_size(&args, i, "--height"));
            }
            arg if arg.starts_with('-') && arg != "-" => {
                eprintln!("Error: Unknown option: {}", arg);
                print_usage();
                std::process::exit(1);
            }
            _ => {
                if script_path.is_none() {
                    script_path = Some(PathBuf::from(&args[i]));
                } else {
                    eprintln!("Error: Unexpected argument: {}", args[i]);
                    print_usage();
                    std::process::exit(1);
                }
            }
        }
        i += 1;
    }

    let (config, warnings) = if no_config {
        (config::Config::default(), Vec::new())
    } else {
        config::load_config(config_file.as_ref())?
    };
    for warning in warnings {
        eprintln!("Warning: {}", warning);
    }
    init_tracing(&config.log_filter);

    // "-" reads the script from stdin, same as no argument.
    let script_path = script_path.filter(|path| path.as_os_str() != "-");
    let script = batch::read_script(script_path.as_deref())
        .with_context(|| match &script_path {
            Some(path) => format!("Failed to read script {}", path.display()),
            None => "Failed to read script from stdin".to_string(),
        })?;

    let mut doc = Document::with_size(
        width.unwrap_or(config.width),
        height.unwrap_or(config.height),
    );
    tracing::debug!(width = doc.width(), height = doc.height(), "running script");
    batch::run_script(&mut doc, &script)?;

    match output_file {
        Some(path) => {
            write_csv(&path, &doc)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Exported to {}", path.display());
        }
        None => print!("{}", to_csv(&doc)),
    }
    Ok(())
}
