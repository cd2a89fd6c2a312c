// 该文件是 Dongfeng （东风） 项目的一部分。
// src/preprocess/cpu.rs - CPU 预处理
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

use image::DynamicImage;
use tracing::debug;

use super::{
  PreprocessError, Preprocessor, check_request, normalize_sample, resize_to_plan,
  samples_on_u8_scale,
};
use crate::{frame::NormalizedTensor, plan::SizePlan};

/// 基于 `image` 库的预处理实现
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuPreprocessor;

impl Preprocessor for CpuPreprocessor {
  fn preprocess(
    &self,
    image: &DynamicImage,
    plan: &SizePlan,
    channels: usize,
  ) -> Result<NormalizedTensor, PreprocessError> {
    check_request(image, plan, channels)?;

    let now = std::time::Instant::now();
    let resized = resize_to_plan(image, plan);
    debug!(
      "重采样 {}x{} -> {}x{}, 耗时: {:.2?}",
      plan.source_height,
      plan.source_width,
      plan.target_height,
      plan.target_width,
      now.elapsed()
    );

    let mut data = samples_on_u8_scale(&resized, channels);
    data.iter_mut().for_each(|v| *v = normalize_sample(*v));

    Ok(NormalizedTensor::from_vec(
      plan.target_height as usize,
      plan.target_width as usize,
      channels,
      data,
    )?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::plan::plan;
  use image::{ImageBuffer, Rgb, Rgba};

  fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
      Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
    }))
  }

  #[test]
  fn produces_batched_nhwc_in_range() {
    let image = gradient(100, 70);
    let plan = plan(70, 100, 2400, 32).unwrap();
    let tensor = CpuPreprocessor.preprocess(&image, &plan, 3).unwrap();

    assert_eq!(tensor.shape(), [1, 64, 96, 3]);
    assert!(tensor.as_nhwc().iter().all(|v| (-1.0..=1.0).contains(v)));
  }

  #[test]
  fn identity_plan_normalizes_exact_values() {
    let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(32, 32, Rgb([0, 255, 51])));
    let plan = plan(32, 32, 2400, 32).unwrap();
    let tensor = CpuPreprocessor.preprocess(&image, &plan, 3).unwrap();

    assert_eq!(tensor.get(5, 7, 0), Some(-1.0));
    assert!((tensor.get(5, 7, 1).unwrap() - 1.0).abs() < 1e-6);
    assert!((tensor.get(5, 7, 2).unwrap() - (51.0 / 127.5 - 1.0)).abs() < 1e-6);
  }

  #[test]
  fn drops_alpha_unless_requested() {
    let image = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(32, 64, Rgba([255, 0, 0, 0])));
    let plan = plan(64, 32, 2400, 32).unwrap();

    let rgb = CpuPreprocessor.preprocess(&image, &plan, 3).unwrap();
    assert_eq!(rgb.shape(), [1, 64, 32, 3]);

    let rgba = CpuPreprocessor.preprocess(&image, &plan, 4).unwrap();
    assert_eq!(rgba.shape(), [1, 64, 32, 4]);
    assert_eq!(rgba.get(0, 0, 3), Some(-1.0));
  }

  #[test]
  fn repeated_runs_are_identical() {
    let image = gradient(257, 129);
    let plan = plan(129, 257, 2400, 32).unwrap();
    let first = CpuPreprocessor.preprocess(&image, &plan, 3).unwrap();
    let second = CpuPreprocessor.preprocess(&image, &plan, 3).unwrap();
    assert_eq!(first, second);
  }

  #[test]
  fn does_not_touch_source_image() {
    let image = gradient(100, 70);
    let before = image.clone();
    let plan = plan(70, 100, 2400, 32).unwrap();
    CpuPreprocessor.preprocess(&image, &plan, 3).unwrap();
    assert_eq!(image.as_bytes(), before.as_bytes());
  }

  #[test]
  fn rejects_bad_requests() {
    let image = gradient(64, 64);
    let plan64 = plan(64, 64, 2400, 32).unwrap();
    assert!(matches!(
      CpuPreprocessor.preprocess(&image, &plan64, 2),
      Err(PreprocessError::UnsupportedChannels(2))
    ));

    let plan96 = plan(96, 64, 2400, 32).unwrap();
    assert!(matches!(
      CpuPreprocessor.preprocess(&image, &plan96, 3),
      Err(PreprocessError::PlanMismatch { .. })
    ));
  }
}
