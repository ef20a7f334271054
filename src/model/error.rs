//! モデル修正処理のエラー定義

use std::path::PathBuf;

use thiserror::Error;

/// モデル記述ドキュメントの読み込み・修正・書き込みで発生するエラー
///
/// いずれも致命的で、リトライはしない。
/// 未対応の inbound_nodes 形式や keras_history の欠落はエラーではなく
/// [`NormalizeReport`](crate::model::NormalizeReport) に集計される。
#[derive(Debug, Error)]
pub enum FixError {
    #[error("Failed to read source model {path:?}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed model document: {detail}")]
    MalformedDocument { detail: String },

    #[error("Failed to write {path:?}: {source}")]
    DestinationWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FixError {
    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        FixError::MalformedDocument {
            detail: detail.into(),
        }
    }
}
