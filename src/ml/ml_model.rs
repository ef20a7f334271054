//! 分類モデルへの入力前処理と表示用の共通定義
//!
//! モデル本体は外部の推論ライブラリに任せ、ここでは入力テンソルの作成と
//! クラス名の整形のみを扱います。

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::DynamicImage;
use std::path::Path;

pub use crate::model::config::{DEFAULT_CLASS_NAMES as CLASS_NAMES, DEFAULT_MEAN_PIXEL_BGR as MEAN_PIXEL_BGR};

/// デフォルトの入力画像サイズ
pub const IMAGE_SIZE: u32 = 224;

/// モデル入力テンソル
///
/// NHWC レイアウト `[1, height, width, 3]`、チャネルは BGR 順。
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    pub shape: [usize; 4],
    pub data: Vec<f32>,
}

impl InputTensor {
    /// 画素 (y, x) のチャネル値を取得
    pub fn at(&self, y: usize, x: usize, channel: usize) -> Option<f32> {
        let [_, height, width, channels] = self.shape;
        if y >= height || x >= width || channel >= channels {
            return None;
        }
        self.data.get((y * width + x) * channels + channel).copied()
    }
}

/// 画像を前処理してモデル入力テンソルを作成
///
/// VGG/ResNet(caffe方式)と同じ前処理:
/// 1. 最近傍補間で `height x width` にリサイズ
/// 2. RGB → BGR に並び替え
/// 3. 平均画素値を差し引く（スケーリングなし）
/// 4. バッチ次元を追加
pub fn preprocess_image(
    image: &DynamicImage,
    (height, width): (u32, u32),
    mean_pixel_bgr: [f32; 3],
) -> InputTensor {
    let rgb = image.to_rgb8();
    let resized = imageops::resize(&rgb, width, height, FilterType::Nearest);

    let mut data = Vec::with_capacity(height as usize * width as usize * 3);
    for y in 0..height {
        for x in 0..width {
            let pixel = resized.get_pixel(x, y);
            for channel in 0..3 {
                let value = pixel[2 - channel] as f32;
                data.push(value - mean_pixel_bgr[channel]);
            }
        }
    }

    InputTensor {
        shape: [1, height as usize, width as usize, 3],
        data,
    }
}

/// 画像ファイルを読み込んで前処理
pub fn load_and_preprocess_image(
    path: &Path,
    size: (u32, u32),
    mean_pixel_bgr: [f32; 3],
) -> Result<InputTensor> {
    let image = image::open(path)
        .with_context(|| format!("Failed to open image: {}", path.display()))?;
    Ok(preprocess_image(&image, size, mean_pixel_bgr))
}

/// クラス名を 'snake_case' から 'Title Case' に整形
///
/// 例: `fresh_bitter_gourd` → `Fresh Bitter Gourd`
pub fn format_class_name(class_name: &str) -> String {
    class_name
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn test_format_class_name() {
        assert_eq!(format_class_name("fresh_apple"), "Fresh Apple");
        assert_eq!(format_class_name("stale_bitter_gourd"), "Stale Bitter Gourd");
        assert_eq!(format_class_name("tomato"), "Tomato");
        assert_eq!(format_class_name(""), "");
    }

    #[test]
    fn test_preprocess_shape() {
        let size = (IMAGE_SIZE, IMAGE_SIZE);
        let tensor = preprocess_image(&solid(40, 30, [0, 0, 0]), size, MEAN_PIXEL_BGR);
        assert_eq!(tensor.shape, [1, 224, 224, 3]);
        assert_eq!(tensor.data.len(), 224 * 224 * 3);
    }

    #[test]
    fn test_preprocess_bgr_and_mean() {
        let tensor = preprocess_image(&solid(8, 8, [255, 0, 0]), (4, 4), MEAN_PIXEL_BGR);

        // 赤 (R=255) は BGR の3番目のチャネルに入る
        let b = tensor.at(0, 0, 0).unwrap();
        let g = tensor.at(0, 0, 1).unwrap();
        let r = tensor.at(3, 3, 2).unwrap();
        assert!((b - (-103.939)).abs() < 1e-4);
        assert!((g - (-116.779)).abs() < 1e-4);
        assert!((r - (255.0 - 123.68)).abs() < 1e-4);
    }

    #[test]
    fn test_tensor_at_out_of_range() {
        let tensor = preprocess_image(&solid(2, 2, [1, 2, 3]), (2, 2), [0.0; 3]);
        assert_eq!(tensor.at(0, 0, 0), Some(3.0));
        assert_eq!(tensor.at(2, 0, 0), None);
        assert_eq!(tensor.at(0, 0, 3), None);
    }

    #[test]
    fn test_load_missing_image() {
        let err = load_and_preprocess_image(Path::new("no/such/image.png"), (4, 4), MEAN_PIXEL_BGR)
            .unwrap_err();
        assert!(err.to_string().contains("no/such/image.png"));
    }
}
