use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use std::path::PathBuf;
use std::process::ExitCode;

use copybarcodes::*;

#[derive(Parser)]
#[command(version, about = "Recover read barcodes and route paired-end FASTQ files by them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split read pairs into per sample files by barcode
    Demux {
        /// YAML config file
        config: PathBuf,
    },
    /// Move each forward barcode onto its reverse mate
    Attach {
        /// YAML config file
        config: PathBuf,
    },
    /// Keep a fraction of the input read pairs
    Downsample {
        /// YAML config file
        config: PathBuf,
    },
    /// Cut every read to a maximum length
    Truncate(TruncateArgs),
}

#[derive(Args)]
struct TruncateArgs {
    /// File to truncate
    #[arg(long, conflicts_with = "directory", required_unless_present = "directory")]
    file: Option<PathBuf>,
    /// Truncate every file in this directory
    #[arg(long)]
    directory: Option<PathBuf>,
    #[arg(long)]
    max_read_length: usize,
    /// Length of the barcode in front of each read
    #[arg(long, default_value_t = 0)]
    barcode_length: usize,
}

/// Print the summary of a run, also when it stopped early.
fn print_summary(res: Result<RunSummary>) -> Result<()> {
    match res {
        Ok(summary) => {
            println!("{summary}");
            Ok(())
        }
        Err(Error::Interrupted { source, summary }) => {
            println!("{summary}");
            Err(*source)
        }
        Err(e) => Err(e),
    }
}

fn execute(command: Commands) -> Result<()> {
    match command {
        Commands::Demux { config } => {
            print_summary(run(&Config::from_path(config)?, Mode::Demultiplex))?;
        }
        Commands::Attach { config } => {
            print_summary(run(&Config::from_path(config)?, Mode::Attach))?;
        }
        Commands::Downsample { config } => {
            let report = downsample(&Config::from_path(config)?)?;
            for output in &report.outputs {
                println!("Output stored in {}", output.display());
            }
        }
        Commands::Truncate(args) => {
            let files = match (args.file, args.directory) {
                (Some(file), _) => vec![file],
                (None, Some(dir)) => files_in(&dir)?,
                (None, None) => return Err(Error::MissingOption("file")),
            };
            let outputs = truncate_all(&files, args.max_read_length + args.barcode_length)?;
            println!("Truncated {} files.", outputs.len());
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli.command) {
        eprintln!("{} {e}", "Error:".red().bold());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
