//! レイヤー接続情報(inbound_nodes)の形式判定と正規化
//!
//! 新しいKeras形式でエクスポートされた model.json の `inbound_nodes` を、
//! レイヤーモデルのローダーが解釈できる旧形式に書き換えます。
//!
//! - 旧形式: `[[ [layer_name, node_index, tensor_index, {}], ... ]]`
//! - 新形式: `[{ "args": [ <tensor> | [<tensor>, ...] ], "kwargs": {...} }]`
//!
//! `inbound_nodes` 以外のフィールドには一切触れません。

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::model::error::FixError;

/// layers 配列への JSON Pointer
pub const LAYERS_POINTER: &str = "/modelTopology/model_config/config/layers";

/// `inbound_nodes` の形式
#[derive(Debug, PartialEq)]
pub enum InboundShape<'a> {
    /// フィールドが無い、null、または空配列（入力層など）
    Absent,
    /// 旧形式（先頭要素が配列）
    Legacy,
    /// 新形式（先頭要素が `args` を持つオブジェクト）
    Modern(NodeArgs<'a>),
    /// どちらでもない形式。変更せずにそのまま残す
    Unknown,
}

/// 新形式ノードの入力テンソル一覧
///
/// `args[0]` が単一テンソルの場合も1要素のリストに揃えてある。
#[derive(Debug, PartialEq)]
pub struct NodeArgs<'a> {
    pub inputs: Vec<&'a Value>,
}

/// 正規化の集計結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// レイヤー総数
    pub total_layers: usize,
    /// 新形式から変換したレイヤー数
    pub converted: usize,
    /// 既に旧形式だったレイヤー数
    pub already_legacy: usize,
    /// inbound_nodes を持たないレイヤー数
    pub without_inputs: usize,
    /// 未対応の形式でそのまま残したレイヤー数
    pub unsupported: usize,
    /// keras_history が無く接続を出力しなかった入力テンソル数
    pub dropped_inputs: usize,
}

impl NormalizeReport {
    /// 情報の欠落やスキップが発生したか
    pub fn has_warnings(&self) -> bool {
        self.unsupported > 0 || self.dropped_inputs > 0
    }
}

impl std::fmt::Display for NormalizeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "layers={} converted={} legacy={} no_inputs={} unsupported={} dropped_inputs={}",
            self.total_layers,
            self.converted,
            self.already_legacy,
            self.without_inputs,
            self.unsupported,
            self.dropped_inputs
        )
    }
}

/// レイヤーの `inbound_nodes` がどの形式かを判定
pub fn classify_inbound_nodes(layer: &Map<String, Value>) -> InboundShape<'_> {
    let first = match layer.get("inbound_nodes") {
        None | Some(Value::Null) => return InboundShape::Absent,
        Some(Value::Array(nodes)) => match nodes.first() {
            Some(first) => first,
            None => return InboundShape::Absent,
        },
        Some(_) => return InboundShape::Unknown,
    };

    match first {
        Value::Array(_) => InboundShape::Legacy,
        Value::Object(node) => match node.get("args") {
            Some(Value::Array(args)) if !args.is_empty() => {
                // 複数入力レイヤー(Addなど)は args[0] が配列になる
                let inputs = match &args[0] {
                    Value::Array(many) => many.iter().collect(),
                    single => vec![single],
                };
                InboundShape::Modern(NodeArgs { inputs })
            }
            _ => InboundShape::Unknown,
        },
        _ => InboundShape::Unknown,
    }
}

/// 入力テンソルの `config.keras_history` を取得
pub fn keras_history(tensor: &Value) -> Option<&[Value]> {
    tensor
        .get("config")?
        .get("keras_history")?
        .as_array()
        .map(Vec::as_slice)
}

/// keras_history から旧形式の接続タプル `[name, node_index, tensor_index, {}]` を作成
///
/// 要素数が足りない場合は null で埋める。
pub fn connection_tuple(history: &[Value]) -> Value {
    let field = |i: usize| history.get(i).cloned().unwrap_or(Value::Null);
    Value::Array(vec![field(0), field(1), field(2), Value::Object(Map::new())])
}

/// レイヤー名（ログ用）
pub fn layer_name(layer: &Map<String, Value>) -> &str {
    layer
        .get("config")
        .and_then(|config| config.get("name"))
        .or_else(|| layer.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
}

/// layers 配列を取得
pub fn layers(document: &Value) -> Result<&Vec<Value>, FixError> {
    document
        .pointer(LAYERS_POINTER)
        .and_then(Value::as_array)
        .ok_or_else(missing_layers)
}

fn layers_mut(document: &mut Value) -> Result<&mut Vec<Value>, FixError> {
    document
        .pointer_mut(LAYERS_POINTER)
        .and_then(Value::as_array_mut)
        .ok_or_else(missing_layers)
}

fn missing_layers() -> FixError {
    FixError::malformed(
        "`modelTopology.model_config.config.layers` is missing or is not an array",
    )
}

/// ドキュメントを受け取り、正規化したものを返す
///
/// 途中で失敗した場合は中途半端なドキュメントは返さない。
pub fn normalize(mut document: Value) -> Result<Value, FixError> {
    normalize_in_place(&mut document)?;
    Ok(document)
}

/// 全レイヤーの inbound_nodes を旧形式へ書き換える
///
/// エラー時はドキュメントの一部だけが書き換わっている可能性があるため、
/// 呼び出し側は結果を保存してはいけない。
pub fn normalize_in_place(document: &mut Value) -> Result<NormalizeReport, FixError> {
    let layers = layers_mut(document)?;

    let mut report = NormalizeReport {
        total_layers: layers.len(),
        ..Default::default()
    };

    for (index, entry) in layers.iter_mut().enumerate() {
        let layer = entry.as_object_mut().ok_or_else(|| {
            FixError::malformed(format!("layer entry #{} is not an object", index))
        })?;

        let converted = match classify_inbound_nodes(layer) {
            InboundShape::Absent => {
                report.without_inputs += 1;
                continue;
            }
            InboundShape::Legacy => {
                report.already_legacy += 1;
                continue;
            }
            InboundShape::Unknown => {
                warn!(
                    "レイヤー #{} ({}) の inbound_nodes は未対応の形式です。変更せずに残します",
                    index,
                    layer_name(layer)
                );
                report.unsupported += 1;
                continue;
            }
            InboundShape::Modern(args) => {
                let mut tuples = Vec::with_capacity(args.inputs.len());
                for (position, tensor) in args.inputs.iter().enumerate() {
                    match keras_history(tensor) {
                        Some(history) => tuples.push(connection_tuple(history)),
                        None => {
                            warn!(
                                "レイヤー #{} ({}) の入力 {} に keras_history がありません。この接続は出力されません",
                                index,
                                layer_name(layer),
                                position
                            );
                            report.dropped_inputs += 1;
                        }
                    }
                }
                debug!(
                    "レイヤー #{} ({}): 接続 {} 件を変換",
                    index,
                    layer_name(layer),
                    tuples.len()
                );
                Value::Array(vec![Value::Array(tuples)])
            }
        };

        layer.insert("inbound_nodes".to_string(), converted);
        report.converted += 1;
    }

    Ok(report)
}
