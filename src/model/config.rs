//! アプリケーション設定管理モジュール
//!
//! モデルファイルのパスや分類器の前処理設定をJSON形式で保存・読み込みします。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::model::model_storage;

/// 分類クラス名の初期値
pub const DEFAULT_CLASS_NAMES: [&str; 12] = [
    "fresh_apple", "fresh_banana", "fresh_bitter_gourd",
    "fresh_capsicum", "fresh_orange", "fresh_tomato",
    "stale_apple", "stale_banana", "stale_bitter_gourd",
    "stale_capsicum", "stale_orange", "stale_tomato",
];

/// VGG/ResNet(caffe方式)の平均画素値、BGR順
pub const DEFAULT_MEAN_PIXEL_BGR: [f32; 3] = [103.939, 116.779, 123.68];

/// モデルファイル設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// 修正前の model.json のパス
    pub source_model_path: String,
    /// 修正済み model.json の出力先ディレクトリ
    pub fixed_model_dir: String,
    /// 重みファイル(.bin)も出力先へコピーする
    pub copy_weights: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            source_model_path: "model/model.json".to_string(),
            fixed_model_dir: "model_fixed".to_string(),
            copy_weights: false,
        }
    }
}

impl ModelSettings {
    /// 修正済み model.json のパス
    pub fn fixed_model_path(&self) -> PathBuf {
        model_storage::fixed_model_path(
            Path::new(&self.source_model_path),
            Path::new(&self.fixed_model_dir),
        )
    }
}

/// 分類器設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// 出力インデックス順のクラス名
    pub class_names: Vec<String>,
    /// モデル入力サイズ（正方形）。モデルに入力形状があればそちらを優先
    pub input_size: u32,
    /// 前処理で差し引く平均画素値（BGR順）
    pub mean_pixel_bgr: [f32; 3],
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            class_names: DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
            input_size: 224,
            mean_pixel_bgr: DEFAULT_MEAN_PIXEL_BGR,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// モデルファイル設定
    pub model: ModelSettings,
    /// 分類器設定
    pub classifier: ClassifierSettings,
}

impl AppConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        PathBuf::from("config.json")
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 設定を読み込む、存在しない場合や読めない場合はデフォルト設定を返す
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match Self::load(path) {
                Ok(config) => {
                    info!("設定ファイルを読み込みました: {}", path.display());
                    config
                }
                Err(e) => {
                    warn!(
                        "設定ファイルの読み込みに失敗しました ({}): {}。デフォルト設定を使用します",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            }
        } else {
            info!("設定ファイルが存在しません。デフォルト設定を使用します");
            Self::default()
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// ソースモデルのパスを設定
    pub fn set_source_model_path<P: AsRef<Path>>(&mut self, path: P) {
        self.model.source_model_path = path.as_ref().to_string_lossy().to_string();
    }

    /// 出力先ディレクトリを設定
    pub fn set_fixed_model_dir<P: AsRef<Path>>(&mut self, path: P) {
        self.model.fixed_model_dir = path.as_ref().to_string_lossy().to_string();
    }

    /// 設定情報を表示
    pub fn display(&self) {
        println!("=== アプリケーション設定 ===");
        println!("ソースモデル: {}", self.model.source_model_path);
        println!("出力先: {}", self.model.fixed_model_dir);
        println!("重みファイルのコピー: {}", self.model.copy_weights);
        println!("\n--- 分類器設定 ---");
        println!("クラス数: {}", self.classifier.class_names.len());
        println!("入力サイズ: {}x{}", self.classifier.input_size, self.classifier.input_size);
        println!("平均画素値(BGR): {:?}", self.classifier.mean_pixel_bgr);
        println!("========================\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.model.source_model_path, "model/model.json");
        assert_eq!(config.model.fixed_model_dir, "model_fixed");
        assert!(!config.model.copy_weights);
        assert_eq!(config.classifier.class_names.len(), 12);
        assert_eq!(config.classifier.input_size, 224);
    }

    #[test]
    fn test_fixed_model_path() {
        let config = AppConfig::default();
        assert_eq!(
            config.model.fixed_model_path(),
            Path::new("model_fixed").join("model.json")
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "model": { "fixed_model_dir": "out" } }"#).unwrap();
        assert_eq!(config.model.fixed_model_dir, "out");
        assert_eq!(config.model.source_model_path, "model/model.json");
        assert_eq!(config.classifier.class_names[0], "fresh_apple");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.set_source_model_path("exports/model.json");
        config.model.copy_weights = true;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.model.source_model_path, "exports/model.json");
        assert!(loaded.model.copy_weights);
    }

    #[test]
    fn test_load_or_default_with_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "[]").unwrap();

        let config = AppConfig::load_or_default(&path);
        assert_eq!(config.model.fixed_model_dir, "model_fixed");
    }
}
