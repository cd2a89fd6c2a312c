// 该文件是 Dongfeng （东风） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件输出
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, Luma, RgbImage, RgbaImage};
use thiserror::Error;
use tracing::warn;

use crate::{
  frame::{NormalizedTensor, OutputTensor},
  output::Render,
  preprocess::denormalize_sample,
  task::PipelineOutput,
};

pub const RESIZED_FILE_NAME: &str = "resized.png";
pub const SCORE_MAP_FILE_NAME: &str = "score_map.png";

/// 将送入检测器的输入图像与得分图保存到目录
pub struct SaveImageFileOutput {
  dir: PathBuf,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("得分图形状无法保存为灰度图: {0:?}")]
  ScoreMapShape(Vec<usize>),
  #[error("输入张量形状无法保存为图像: {0:?}")]
  InputShape([usize; 4]),
}

/// 把归一化的输入张量还原为 8 位 RGB/RGBA 图像，不做重采样
fn input_image(tensor: &NormalizedTensor) -> Result<DynamicImage, SaveImageFileError> {
  let (width, height) = (tensor.width() as u32, tensor.height() as u32);
  let samples: Vec<u8> = tensor.as_nhwc().iter().map(|&v| denormalize_sample(v)).collect();
  let image = match tensor.channels() {
    3 => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
    4 => RgbaImage::from_raw(width, height, samples).map(DynamicImage::ImageRgba8),
    _ => None,
  };
  image.ok_or(SaveImageFileError::InputShape(tensor.shape()))
}

/// `[1, H, W, 1]` 的得分图转换为 8 位灰度图，数值截断到 `[0, 1]`
fn score_map_image(score_map: &OutputTensor) -> Result<GrayImage, SaveImageFileError> {
  let &[1, height, width, 1] = score_map.shape.as_slice() else {
    return Err(SaveImageFileError::ScoreMapShape(score_map.shape.clone()));
  };

  let mut image = GrayImage::new(width as u32, height as u32);
  for (pixel, &score) in image.pixels_mut().zip(score_map.data.iter()) {
    *pixel = Luma([(score.clamp(0.0, 1.0) * 255.0).round() as u8]);
  }
  Ok(image)
}

impl SaveImageFileOutput {
  pub fn new(dir: impl AsRef<Path>) -> Self {
    SaveImageFileOutput {
      dir: dir.as_ref().to_path_buf(),
    }
  }

  fn save_image(&self, name: &str, image: &DynamicImage) -> Result<(), SaveImageFileError> {
    std::fs::create_dir_all(&self.dir)?;
    let path = self.dir.join(name);
    image.save(&path)?;
    warn!("保存图像到文件: {}", path.display());
    Ok(())
  }
}

impl Render<DynamicImage, PipelineOutput> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(
    &self,
    _frame: &DynamicImage,
    result: &PipelineOutput,
  ) -> Result<(), Self::Error> {
    let resized = input_image(&result.input)?;
    self.save_image(RESIZED_FILE_NAME, &resized)?;

    let score_map = score_map_image(&result.result.score_map)?;
    self.save_image(SCORE_MAP_FILE_NAME, &DynamicImage::ImageLuma8(score_map))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    model::InferenceResult,
    plan::plan,
    preprocess::{CpuPreprocessor, Preprocessor},
  };
  use image::{GenericImageView, ImageBuffer, Rgb};

  fn pipeline_output(frame: &DynamicImage) -> PipelineOutput {
    let (width, height) = frame.dimensions();
    let plan = plan(height, width, 2400, 32).unwrap();
    let input = CpuPreprocessor.preprocess(frame, &plan, 3).unwrap();
    let (h, w) = (plan.target_height as usize, plan.target_width as usize);
    let scores = (0..h * w).map(|i| (i % 2) as f32).collect();
    PipelineOutput {
      plan,
      input,
      result: InferenceResult {
        score_map: OutputTensor::new("pred_score_map/Sigmoid", vec![1, h, w, 1], scores).unwrap(),
        geo_map: OutputTensor::new("pred_geo_map/concat", vec![1, h, w, 5], vec![0.0; h * w * 5])
          .unwrap(),
      },
    }
  }

  #[test]
  fn writes_resized_and_score_map() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("dump");
    let frame = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(100, 70, Rgb([1, 2, 3])));

    let output = SaveImageFileOutput::new(&out_dir);
    output.render_result(&frame, &pipeline_output(&frame)).unwrap();

    let resized = image::open(out_dir.join(RESIZED_FILE_NAME)).unwrap().to_rgb8();
    assert_eq!(resized.dimensions(), (96, 64));
    assert!(resized.pixels().all(|p| p.0 == [1, 2, 3]));
    let score = image::open(out_dir.join(SCORE_MAP_FILE_NAME)).unwrap().to_luma8();
    assert_eq!(score.dimensions(), (96, 64));
    assert_eq!(score.get_pixel(0, 0)[0], 0);
    assert_eq!(score.get_pixel(1, 0)[0], 255);
  }

  #[test]
  fn dumps_detector_input_without_resampling() {
    let dir = tempfile::tempdir().unwrap();
    let frame = DynamicImage::ImageRgb8(ImageBuffer::from_fn(64, 32, |x, y| {
      Rgb([(x * 4) as u8, (y * 8) as u8, ((x + y) * 3) as u8])
    }));
    let mut result = pipeline_output(&frame);
    assert!(result.plan.is_identity());

    SaveImageFileOutput::new(dir.path())
      .render_result(&frame, &result)
      .unwrap();
    let resized = image::open(dir.path().join(RESIZED_FILE_NAME)).unwrap();
    assert_eq!(resized.to_rgb8(), frame.to_rgb8());

    // 写出的是张量内容，而不是重新从原图缩放
    let dark = NormalizedTensor::from_vec(32, 64, 3, vec![-1.0; 32 * 64 * 3]).unwrap();
    result.input = dark;
    SaveImageFileOutput::new(dir.path())
      .render_result(&frame, &result)
      .unwrap();
    let resized = image::open(dir.path().join(RESIZED_FILE_NAME)).unwrap().to_rgb8();
    assert!(resized.pixels().all(|p| p.0 == [0, 0, 0]));
  }

  #[test]
  fn rejects_unsupported_input_channels() {
    let tensor = NormalizedTensor::from_vec(2, 2, 2, vec![0.0; 8]).unwrap();
    assert!(matches!(
      input_image(&tensor),
      Err(SaveImageFileError::InputShape([1, 2, 2, 2]))
    ));
  }

  #[test]
  fn rejects_multichannel_score_map() {
    let tensor = OutputTensor::new("x", vec![1, 2, 2, 2], vec![0.0; 8]).unwrap();
    assert!(matches!(
      score_map_image(&tensor),
      Err(SaveImageFileError::ScoreMapShape(_))
    ));
  }
}
