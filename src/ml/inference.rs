//! 推論エンジンとアプリケーション状態
//!
//! テンソル演算そのものは [`Predictor`] を実装した外部ライブラリに委譲します。

use anyhow::{bail, Context, Result};
use image::DynamicImage;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info};

use crate::ml::ml_model::{format_class_name, load_and_preprocess_image, preprocess_image, InputTensor};
use crate::model::{read_document, ClassifierSettings, ModelSummary};

/// 画像もモデルも揃っていないときの表示
pub const NOT_READY_TEXT: &str = "Please upload an image first.";
/// 推論に失敗したときの表示
pub const PREDICTION_FAILED_TEXT: &str = "Error predicting the image.";
/// モデルの読み込みに失敗したときの表示
pub const LOAD_FAILED_TEXT: &str = "Failed to load model.";

/// 推論ライブラリとの接続点
///
/// 入力テンソルを受け取り、クラスごとのスコア（出力インデックス順）を返す。
pub trait Predictor {
    fn predict(&self, input: &InputTensor) -> Result<Vec<f32>>;
}

impl<F> Predictor for F
where
    F: Fn(&InputTensor) -> Result<Vec<f32>>,
{
    fn predict(&self, input: &InputTensor) -> Result<Vec<f32>> {
        self(input)
    }
}

/// 予測結果（最もスコアの高いクラス）
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub class_name: String,
    /// 0.0〜1.0
    pub confidence: f32,
}

impl Prediction {
    /// 表示用のクラス名
    pub fn label(&self) -> String {
        format_class_name(&self.class_name)
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Result: {} ({:.2}%)", self.label(), self.confidence * 100.0)
    }
}

/// スコアから最大のクラスを選ぶ
///
/// 同点の場合はインデックスが小さい方を採用する。
pub fn top_prediction(scores: &[f32], class_names: &[String]) -> Result<Prediction> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            bail!("スコアに NaN が含まれています (index {})", index);
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((index, score)),
        }
    }

    let (class_index, confidence) = best.context("推論結果が空です")?;
    let class_name = class_names
        .get(class_index)
        .with_context(|| format!("クラスインデックス {} は範囲外です", class_index))?
        .clone();

    Ok(Prediction {
        class_index,
        class_name,
        confidence,
    })
}

/// 推論エンジン
pub struct InferenceEngine<P> {
    predictor: P,
    summary: ModelSummary,
    class_names: Vec<String>,
    input_hw: (u32, u32),
    mean_pixel_bgr: [f32; 3],
}

impl<P: Predictor> InferenceEngine<P> {
    /// 修正済み model.json を検証して推論エンジンを初期化
    ///
    /// inbound_nodes が新形式のままのモデルは読み込まない。
    pub fn load<Q: AsRef<Path>>(
        model_path: Q,
        predictor: P,
        settings: &ClassifierSettings,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let document = read_document(model_path)
            .with_context(|| format!("Failed to load model: {}", model_path.display()))?;
        let summary = ModelSummary::from_document(&document)?;

        if summary.needs_fix() {
            bail!(
                "{} は未修正のレイヤーを {} 件含んでいます。先に fix_model で修正してください",
                model_path.display(),
                summary.modern_layers + summary.unknown_layers
            );
        }

        if settings.class_names.is_empty() {
            bail!("クラス名が設定されていません");
        }

        if let Some(units) = summary.output_units {
            if units as usize != settings.class_names.len() {
                bail!(
                    "モデルの出力数 {} とクラス名の数 {} が一致しません",
                    units,
                    settings.class_names.len()
                );
            }
        }

        let input_hw = summary
            .input_hw()
            .unwrap_or((settings.input_size, settings.input_size));

        info!(
            "モデルを読み込みました: {} (入力 {}x{}, {}クラス)",
            model_path.display(),
            input_hw.0,
            input_hw.1,
            settings.class_names.len()
        );

        Ok(Self {
            predictor,
            summary,
            class_names: settings.class_names.clone(),
            input_hw,
            mean_pixel_bgr: settings.mean_pixel_bgr,
        })
    }

    /// 画像を分類
    pub fn classify(&self, image: &DynamicImage) -> Result<Prediction> {
        let tensor = preprocess_image(image, self.input_hw, self.mean_pixel_bgr);
        self.classify_tensor(&tensor)
    }

    /// 画像ファイルを分類
    pub fn classify_image<Q: AsRef<Path>>(&self, image_path: Q) -> Result<Prediction> {
        let tensor =
            load_and_preprocess_image(image_path.as_ref(), self.input_hw, self.mean_pixel_bgr)?;
        self.classify_tensor(&tensor)
    }

    fn classify_tensor(&self, tensor: &InputTensor) -> Result<Prediction> {
        let scores = self.predictor.predict(tensor)?;
        top_prediction(&scores, &self.class_names)
    }

    /// モデル概要への参照を取得
    pub fn summary(&self) -> &ModelSummary {
        &self.summary
    }

    /// 入力画像の (高さ, 幅)
    pub fn input_hw(&self) -> (u32, u32) {
        self.input_hw
    }
}

/// 推論の結果
#[derive(Debug)]
pub enum PredictOutcome {
    /// モデル未読み込み、または画像未選択
    NotReady,
    Failed(anyhow::Error),
    Predicted(Prediction),
}

impl PredictOutcome {
    /// 画面に表示する文言
    pub fn result_text(&self) -> String {
        match self {
            PredictOutcome::NotReady => NOT_READY_TEXT.to_string(),
            PredictOutcome::Failed(_) => PREDICTION_FAILED_TEXT.to_string(),
            PredictOutcome::Predicted(prediction) => prediction.to_string(),
        }
    }
}

/// 画面ハンドラ間で共有するアプリケーション状態
pub struct AppState<P> {
    engine: Arc<Mutex<Option<InferenceEngine<P>>>>,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<P> Default for AppState<P> {
    fn default() -> Self {
        Self {
            engine: Arc::new(Mutex::new(None)),
        }
    }
}

impl<P: Predictor> AppState<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// モデルを読み込んで状態を差し替える
    ///
    /// 失敗した場合は以前のモデルをそのまま残し、`Failed to load model.` を
    /// 最上位のメッセージとするエラーを返す。
    pub fn load_model<Q: AsRef<Path>>(
        &self,
        model_path: Q,
        predictor: P,
        settings: &ClassifierSettings,
    ) -> Result<()> {
        match InferenceEngine::load(model_path, predictor, settings) {
            Ok(engine) => {
                *self.engine.lock().unwrap_or_else(PoisonError::into_inner) = Some(engine);
                Ok(())
            }
            Err(e) => {
                error!("{}: {:#}", LOAD_FAILED_TEXT, e);
                Err(e.context(LOAD_FAILED_TEXT))
            }
        }
    }

    /// モデルが読み込み済みか
    pub fn is_loaded(&self) -> bool {
        self.engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// 選択中の画像を分類
    pub fn predict(&self, image_path: Option<&Path>) -> PredictOutcome {
        let guard = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        let (Some(engine), Some(image_path)) = (guard.as_ref(), image_path) else {
            return PredictOutcome::NotReady;
        };

        match engine.classify_image(image_path) {
            Ok(prediction) => PredictOutcome::Predicted(prediction),
            Err(e) => {
                error!("推論エラー: {:#}", e);
                PredictOutcome::Failed(e)
            }
        }
    }

    /// 選択中の画像を分類し、表示用の文言を返す
    pub fn result_text(&self, image_path: Option<&Path>) -> String {
        self.predict(image_path).result_text()
    }
}
