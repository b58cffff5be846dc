mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::compute::ComputeArgs;
use commands::filter::FilterArgs;
use commands::mappings::MappingsArgs;
use commands::summary::SummaryArgs;

/// Fair-lending disparity metrics
#[derive(Parser)]
#[command(
    name = "fairlend",
    version,
    about = "Fair-lending disparity metrics",
    long_about = "A CLI for computing subject-vs-peer lending disparity metrics \
                  (shares, gaps, ratios, shortfall and damages) from aggregate \
                  loan counts, with decimal precision. Also filters, sorts and \
                  summarizes computed reports."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute disparity metrics from an aggregate document
    Compute(ComputeArgs),
    /// Summarize a computed report (totals, averages, breakdowns)
    Summary(SummaryArgs),
    /// Filter, sort and band the records of a computed report
    Filter(FilterArgs),
    /// Show or validate geography mapping tables, or normalize a document
    Mappings(MappingsArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Compute(args) => commands::compute::run_compute(args),
        Commands::Summary(args) => commands::summary::run_summary(args),
        Commands::Filter(args) => commands::filter::run_filter(args),
        Commands::Mappings(args) => commands::mappings::run_mappings(args),
        Commands::Version => {
            println!("fairlend {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
