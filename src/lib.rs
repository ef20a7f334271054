//! 鮮度判定アプリのモデル修正ツールと分類バックエンド
//!
//! - [`model`]: model.json の inbound_nodes 修正、読み書き、設定
//! - [`ml`]: 画像の前処理と推論結果の整形（`ml` feature）

pub mod model;
#[cfg(feature = "ml")]
pub mod ml;

/// ログ出力を初期化
///
/// `RUST_LOG` が未設定の場合は info レベルで出力する。
pub fn init_tracing() {
    init_tracing_with_level("info");
}

/// ログ出力を初期化（`RUST_LOG` 未設定時のレベルを指定）
pub fn init_tracing_with_level(default_level: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // テストなどで二重に初期化された場合は無視する
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
