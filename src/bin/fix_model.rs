//! model.json の inbound_nodes を旧形式に修正するツール
//!
//! ```bash
//! cargo run --bin fix_model -- --source model/model.json --dest-dir model_fixed --copy-weights
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{debug, error, warn};

use freshness_checker_lib::model::{fix_model_file, AppConfig, FixOptions};

/// コマンドライン引数
#[derive(Parser)]
#[command(name = "fix_model")]
#[command(about = "Rewrites Keras 3 style inbound_nodes in a layers-model model.json into the legacy format")]
struct Args {
    /// Settings file (JSON, default: config.json). Defaults are used when it does not exist
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source model.json (overrides model.source_model_path)
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Output directory (overrides model.fixed_model_dir)
    #[arg(short, long)]
    dest_dir: Option<PathBuf>,

    /// Copy the weight shards listed in weightsManifest next to the fixed model
    #[arg(long)]
    copy_weights: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    freshness_checker_lib::init_tracing_with_level(if args.verbose { "debug" } else { "info" });

    let config_path = args.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load_or_default(&config_path);
    if let Some(source) = &args.source {
        config.set_source_model_path(source);
    }
    if let Some(dest_dir) = &args.dest_dir {
        config.set_fixed_model_dir(dest_dir);
    }
    if args.copy_weights {
        config.model.copy_weights = true;
    }

    if args.verbose {
        config.display();
    }
    debug!("出力予定: {}", config.model.fixed_model_path().display());

    let source = PathBuf::from(&config.model.source_model_path);
    let dest_dir = PathBuf::from(&config.model.fixed_model_dir);
    let options = FixOptions {
        copy_weights: config.model.copy_weights,
    };

    match fix_model_file(&source, &dest_dir, &options) {
        Ok(outcome) => {
            if outcome.report.has_warnings() {
                warn!("一部のレイヤーは変換できませんでした ({})", outcome.report);
            }
            println!("✓ 修正済みモデルを保存しました: {}", outcome.destination.display());
            if options.copy_weights {
                println!("  重みファイル {} 件をコピーしました", outcome.copied_weights.len());
            } else {
                println!(
                    "  重みファイル(.bin)を {} にコピーし、読み込み先のパスを更新してください",
                    dest_dir.display()
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("✗ エラー: {}", e);
            ExitCode::FAILURE
        }
    }
}
