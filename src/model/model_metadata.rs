//! モデル記述ドキュメント(model.json)の概要
//!
//! 読み込み専用。推論側でのモデル検証と `inspect_model` の表示に使います。

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::model::error::FixError;
use crate::model::topology::{self, InboundShape};

/// モデルの概要情報
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    /// 例: "layers-model"
    pub format: Option<String>,
    /// 例: "keras v3.8.0"
    pub generated_by: Option<String>,
    /// 例: "TensorFlow.js Converter v4.22.0"
    pub converted_by: Option<String>,
    /// 例: "Functional", "Sequential"
    pub model_class: Option<String>,

    /// レイヤー総数
    pub layer_count: usize,
    /// 新形式の inbound_nodes を持つレイヤー数（要修正）
    pub modern_layers: usize,
    /// 旧形式の inbound_nodes を持つレイヤー数
    pub legacy_layers: usize,
    /// inbound_nodes を持たないレイヤー数
    pub source_layers: usize,
    /// 判別できない形式のレイヤー数
    pub unknown_layers: usize,

    /// 入力層の形状 (例: [None, 224, 224, 3])
    pub input_shape: Option<Vec<Option<u64>>>,
    /// 最後の units（通常は出力クラス数）
    pub output_units: Option<u64>,

    /// weightsManifest に記載された重みファイル
    pub weight_paths: Vec<String>,
}

impl ModelSummary {
    /// ドキュメントから概要を作成
    pub fn from_document(document: &Value) -> Result<Self, FixError> {
        let layers = topology::layers(document)?;

        let text = |pointer: &str| {
            document
                .pointer(pointer)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let mut summary = Self {
            format: text("/format"),
            generated_by: text("/generatedBy"),
            converted_by: text("/convertedBy"),
            model_class: text("/modelTopology/model_config/class_name"),
            layer_count: layers.len(),
            modern_layers: 0,
            legacy_layers: 0,
            source_layers: 0,
            unknown_layers: 0,
            input_shape: None,
            output_units: None,
            weight_paths: weight_paths(document),
        };

        for layer in layers {
            let Some(layer) = layer.as_object() else {
                summary.unknown_layers += 1;
                continue;
            };

            match topology::classify_inbound_nodes(layer) {
                InboundShape::Absent => summary.source_layers += 1,
                InboundShape::Legacy => summary.legacy_layers += 1,
                InboundShape::Modern(_) => summary.modern_layers += 1,
                InboundShape::Unknown => summary.unknown_layers += 1,
            }

            let config = layer.get("config");

            // Keras 2 は batch_input_shape、Keras 3 は batch_shape
            if summary.input_shape.is_none() {
                let shape = config
                    .and_then(|c| c.get("batch_input_shape").or_else(|| c.get("batch_shape")))
                    .and_then(Value::as_array);
                if let Some(shape) = shape {
                    summary.input_shape = Some(shape.iter().map(Value::as_u64).collect());
                }
            }

            if let Some(units) = config.and_then(|c| c.get("units")).and_then(Value::as_u64) {
                summary.output_units = Some(units);
            }
        }

        Ok(summary)
    }

    /// 旧形式への変換が必要か
    pub fn needs_fix(&self) -> bool {
        self.modern_layers > 0 || self.unknown_layers > 0
    }

    /// 入力画像の (高さ, 幅)
    ///
    /// NHWC の4次元形状の場合のみ返す。
    pub fn input_hw(&self) -> Option<(u32, u32)> {
        match self.input_shape.as_deref() {
            Some([_, Some(h), Some(w), _]) => {
                Some((u32::try_from(*h).ok()?, u32::try_from(*w).ok()?))
            }
            _ => None,
        }
    }

    /// 概要をJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize model summary to JSON")
    }
}

/// weightsManifest から重みファイル名を列挙
pub fn weight_paths(document: &Value) -> Vec<String> {
    document
        .get("weightsManifest")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|group| group.get("paths").and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

/// 概要をコンソールに表示
pub fn print_summary_info(summary: &ModelSummary) {
    let or_unknown = |value: &Option<String>| value.clone().unwrap_or_else(|| "(不明)".to_string());

    println!("\n=== モデル概要 ===");
    println!("フォーマット: {}", or_unknown(&summary.format));
    println!("生成元: {}", or_unknown(&summary.generated_by));
    println!("変換ツール: {}", or_unknown(&summary.converted_by));
    println!("モデルクラス: {}", or_unknown(&summary.model_class));
    println!("レイヤー数: {}", summary.layer_count);
    println!("  新形式: {}", summary.modern_layers);
    println!("  旧形式: {}", summary.legacy_layers);
    println!("  入力なし: {}", summary.source_layers);
    println!("  不明: {}", summary.unknown_layers);
    match &summary.input_shape {
        Some(shape) => {
            let dims: Vec<String> = shape
                .iter()
                .map(|d| d.map_or_else(|| "None".to_string(), |d| d.to_string()))
                .collect();
            println!("入力形状: [{}]", dims.join(", "));
        }
        None => println!("入力形状: (不明)"),
    }
    if let Some(units) = summary.output_units {
        println!("出力ユニット数: {}", units);
    }
    println!("重みファイル: {}", summary.weight_paths.join(", "));
    println!(
        "修正の要否: {}",
        if summary.needs_fix() { "必要" } else { "不要" }
    );
    println!("==================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "format": "layers-model",
            "generatedBy": "keras v3.8.0",
            "convertedBy": "TensorFlow.js Converter v4.22.0",
            "modelTopology": {
                "model_config": {
                    "class_name": "Functional",
                    "config": {
                        "layers": [
                            { "class_name": "InputLayer", "config": { "name": "input_layer", "batch_shape": [null, 224, 224, 3] }, "inbound_nodes": [] },
                            { "class_name": "Dense", "config": { "name": "fc", "units": 256 }, "inbound_nodes": [{ "args": [{ "config": { "keras_history": ["input_layer", 0, 0] } }] }] },
                            { "class_name": "Dense", "config": { "name": "predictions", "units": 12 }, "inbound_nodes": [[["fc", 0, 0, {}]]] }
                        ]
                    }
                }
            },
            "weightsManifest": [
                { "paths": ["group1-shard1of2.bin", "group1-shard2of2.bin"], "weights": [] },
                { "paths": ["group2-shard1of1.bin"], "weights": [] }
            ]
        })
    }

    #[test]
    fn test_summary_from_document() {
        let summary = ModelSummary::from_document(&sample()).unwrap();

        assert_eq!(summary.format.as_deref(), Some("layers-model"));
        assert_eq!(summary.model_class.as_deref(), Some("Functional"));
        assert_eq!(summary.layer_count, 3);
        assert_eq!(summary.source_layers, 1);
        assert_eq!(summary.modern_layers, 1);
        assert_eq!(summary.legacy_layers, 1);
        assert_eq!(summary.input_shape, Some(vec![None, Some(224), Some(224), Some(3)]));
        assert_eq!(summary.input_hw(), Some((224, 224)));
        assert_eq!(summary.output_units, Some(12));
        assert_eq!(
            summary.weight_paths,
            ["group1-shard1of2.bin", "group1-shard2of2.bin", "group2-shard1of1.bin"]
        );
        assert!(summary.needs_fix());
    }

    #[test]
    fn test_summary_after_fix() {
        let fixed = crate::model::topology::normalize(sample()).unwrap();
        let summary = ModelSummary::from_document(&fixed).unwrap();
        assert_eq!(summary.modern_layers, 0);
        assert_eq!(summary.legacy_layers, 2);
        assert!(!summary.needs_fix());
    }

    #[test]
    fn test_summary_requires_layers() {
        let err = ModelSummary::from_document(&json!({ "format": "layers-model" })).unwrap_err();
        assert!(matches!(err, FixError::MalformedDocument { .. }));
    }

    #[test]
    fn test_weight_paths_without_manifest() {
        assert!(weight_paths(&json!({})).is_empty());
    }
}
