//! モデル記述ドキュメントの読み込み・保存
//!
//! 正規化そのものはファイルに触れないため、入出力はすべてここで行います。
//!
//! - 読み込み: ソースファイルを丸ごと読み込んでからパース
//! - 保存: 同じディレクトリの一時ファイルに書き込み、rename で置き換え
//! - 重みファイル(.bin)のコピー: weightsManifest に記載されたものを出力先へ

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::model::error::FixError;
use crate::model::model_metadata::weight_paths;
use crate::model::topology::{self, NormalizeReport};

/// ソースファイル名が取得できない場合の出力ファイル名
pub const DEFAULT_MODEL_FILE_NAME: &str = "model.json";

/// 修正処理のオプション
#[derive(Debug, Clone, Default)]
pub struct FixOptions {
    /// 重みファイルを出力先ディレクトリへコピーする
    pub copy_weights: bool,
}

/// 修正処理の結果
#[derive(Debug, Clone)]
pub struct FixOutcome {
    /// 書き込んだ model.json のパス
    pub destination: PathBuf,
    /// 正規化の集計
    pub report: NormalizeReport,
    /// コピーした重みファイル
    pub copied_weights: Vec<PathBuf>,
}

/// 修正済み model.json の出力パス（ファイル名はソースと同じ）
pub fn fixed_model_path(source: &Path, dest_dir: &Path) -> PathBuf {
    let file_name = source
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_FILE_NAME));
    dest_dir.join(file_name)
}

/// モデル記述ドキュメントを読み込む
pub fn read_document(path: &Path) -> Result<Value, FixError> {
    let content = fs::read_to_string(path).map_err(|source| FixError::SourceUnreadable {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content)
        .map_err(|e| FixError::malformed(format!("{}: {}", path.display(), e)))
}

/// モデル記述ドキュメントを保存する
///
/// 親ディレクトリが無ければ作成し、2スペースインデントで書き込む。
/// 途中で失敗しても既存の出力ファイルは壊れない。
pub fn write_document(path: &Path, document: &Value) -> Result<(), FixError> {
    let write_failure = |source: std::io::Error| FixError::DestinationWriteFailure {
        path: path.to_path_buf(),
        source,
    };

    let json_str = serde_json::to_string_pretty(document)
        .map_err(|e| write_failure(e.into()))?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(write_failure)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(write_failure)?;
    temp_file
        .write_all(json_str.as_bytes())
        .map_err(write_failure)?;
    temp_file.flush().map_err(write_failure)?;
    temp_file
        .persist(path)
        .map_err(|e| write_failure(e.error))?;

    Ok(())
}

/// weightsManifest に記載された重みファイルを出力先へコピー
///
/// 出力先ディレクトリが無ければ作成する。ソースと出力先が同じ場合は何もしない。
pub fn copy_weight_files(
    document: &Value,
    source_dir: &Path,
    dest_dir: &Path,
) -> Result<Vec<PathBuf>, FixError> {
    let files = weight_paths(document);
    check_weight_files(&files, source_dir)?;

    fs::create_dir_all(dest_dir).map_err(|source| FixError::DestinationWriteFailure {
        path: dest_dir.to_path_buf(),
        source,
    })?;

    if same_directory(source_dir, dest_dir) {
        debug!("ソースと出力先が同じため重みファイルのコピーを省略します");
        return Ok(Vec::new());
    }

    let mut copied = Vec::with_capacity(files.len());
    for file in &files {
        let from = source_dir.join(file);
        let to = dest_dir.join(file);

        // 同一ファイルへのコピーは中身を空にしてしまう
        if same_file(&from, &to) {
            debug!("コピー元と同じファイルのため省略します: {}", to.display());
            continue;
        }

        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|source| FixError::DestinationWriteFailure {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::copy(&from, &to).map_err(|source| FixError::DestinationWriteFailure {
            path: to.clone(),
            source,
        })?;
        debug!("重みファイルをコピーしました: {}", to.display());
        copied.push(to);
    }

    Ok(copied)
}

/// 重みファイルのパスが相対パスで、すべて存在するか確認
///
/// 絶対パスや `..` を含むパスはディレクトリの外を指すため受け付けない。
fn check_weight_files(files: &[String], source_dir: &Path) -> Result<(), FixError> {
    for file in files {
        let escapes = Path::new(file).components().any(|component| {
            matches!(
                component,
                Component::RootDir | Component::Prefix(_) | Component::ParentDir
            )
        });
        if escapes || file.is_empty() {
            return Err(FixError::malformed(format!(
                "weightsManifest path {:?} must be relative to the model directory",
                file
            )));
        }

        let path = source_dir.join(file);
        if let Err(source) = fs::metadata(&path) {
            return Err(FixError::SourceUnreadable { path, source });
        }
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// model.json を読み込み、inbound_nodes を修正して出力先ディレクトリへ保存する
///
/// 出力ファイル名はソースと同じ。正規化に失敗した場合は何も書き込まない。
pub fn fix_model_file(
    source: &Path,
    dest_dir: &Path,
    options: &FixOptions,
) -> Result<FixOutcome, FixError> {
    info!("モデルを読み込みます: {}", source.display());
    let mut document = read_document(source)?;

    let report = topology::normalize_in_place(&mut document)?;
    info!("inbound_nodes の修正が完了しました ({})", report);

    let source_dir = match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // 書き込み前に重みファイルのパスと欠落を検査する
    if options.copy_weights {
        check_weight_files(&weight_paths(&document), source_dir)?;
    }

    let destination = fixed_model_path(source, dest_dir);

    write_document(&destination, &document)?;
    info!("修正済みモデルを保存しました: {}", destination.display());

    let copied_weights = if options.copy_weights {
        copy_weight_files(&document, source_dir, dest_dir)?
    } else {
        Vec::new()
    };

    Ok(FixOutcome {
        destination,
        report,
        copied_weights,
    })
}
