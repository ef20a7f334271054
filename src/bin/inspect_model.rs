//! model.json の概要を表示するツール

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use freshness_checker_lib::model::{print_summary_info, read_document, ModelSummary};

#[derive(Parser)]
#[command(name = "inspect_model")]
#[command(about = "Prints a summary of a layers-model model.json and whether it still needs fixing")]
struct Args {
    /// model.json to inspect
    model: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

fn run(args: &Args) -> anyhow::Result<bool> {
    let document = read_document(&args.model)?;
    let summary = ModelSummary::from_document(&document)?;

    if args.json {
        println!("{}", summary.to_json_string()?);
    } else {
        print_summary_info(&summary);
    }

    Ok(summary.needs_fix())
}

fn main() -> ExitCode {
    freshness_checker_lib::init_tracing();
    let args = Args::parse();

    match run(&args) {
        Ok(needs_fix) => {
            if needs_fix && !args.json {
                println!("→ fix_model --source {} で修正してください", args.model.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ エラー: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
