// 该文件是 Dongfeng （东风） 项目的一部分。
// src/preprocess.rs - 图像预处理
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

//! 预处理把原图按 [`SizePlan`] 重采样到目标尺寸，将像素值归一化到 `[-1, 1]`，
//! 并打包成 `[1, H, W, C]` 的张量。
//!
//! 提供两种等价的实现：
//! - [`CpuPreprocessor`]：`image` 库双线性缩放 + 主机端计算；
//! - `GraphPreprocessor`（`tensorflow` 特性）：构建一次的小型 TensorFlow 计算图。

use std::borrow::Cow;

use image::{DynamicImage, GenericImageView, imageops::FilterType};
use thiserror::Error;

use crate::frame::{LengthMismatch, NormalizedTensor};
use crate::plan::SizePlan;

/// 默认输入通道数 (RGB)
pub const DEFAULT_CHANNELS: usize = 3;

const HALF_RANGE: f32 = 127.5;
const U16_TO_U8: f32 = 255.0 / 65535.0;

#[derive(Error, Debug)]
pub enum PreprocessError {
  #[error("不支持的通道数: {0}, 仅支持 3 (RGB) 或 4 (RGBA)")]
  UnsupportedChannels(usize),
  #[error("尺寸规划与图像不符: 规划原图 {plan_height}x{plan_width}, 实际 {image_height}x{image_width}")]
  PlanMismatch {
    plan_height: u32,
    plan_width: u32,
    image_height: u32,
    image_width: u32,
  },
  #[error("张量构建错误: {0}")]
  Tensor(#[from] LengthMismatch),
  #[cfg(feature = "tensorflow")]
  #[error("预处理计算图错误: {0}")]
  Graph(#[from] tensorflow::Status),
}

/// 预处理后端
pub trait Preprocessor: std::fmt::Debug {
  fn preprocess(
    &self,
    image: &DynamicImage,
    plan: &SizePlan,
    channels: usize,
  ) -> Result<NormalizedTensor, PreprocessError>;
}

/// 将 8 位尺度的采样值映射到 `[-1, 1]`
///
/// 必须在浮点下计算；经 8 位整数中转会被截断成 0 或 -1。
#[inline]
pub fn normalize_sample(value: f32) -> f32 {
  value / HALF_RANGE - 1.0
}

/// [`normalize_sample`] 的逆变换，还原为 8 位采样
#[inline]
pub fn denormalize_sample(value: f32) -> u8 {
  ((value + 1.0) * HALF_RANGE).round().clamp(0.0, 255.0) as u8
}

/// 按规划重采样，规划尺寸与原图相同时直接借用原图
pub fn resize_to_plan<'a>(image: &'a DynamicImage, plan: &SizePlan) -> Cow<'a, DynamicImage> {
  if plan.is_identity() {
    Cow::Borrowed(image)
  } else {
    Cow::Owned(image.resize_exact(
      plan.target_width,
      plan.target_height,
      FilterType::Triangle,
    ))
  }
}

pub(crate) fn check_request(
  image: &DynamicImage,
  plan: &SizePlan,
  channels: usize,
) -> Result<(), PreprocessError> {
  if !(3..=4).contains(&channels) {
    return Err(PreprocessError::UnsupportedChannels(channels));
  }

  let (width, height) = image.dimensions();
  if width != plan.source_width || height != plan.source_height {
    return Err(PreprocessError::PlanMismatch {
      plan_height: plan.source_height,
      plan_width: plan.source_width,
      image_height: height,
      image_width: width,
    });
  }

  Ok(())
}

/// 以 HWC 顺序取出前 `channels` 个通道，并换算到 8 位尺度的浮点值
///
/// 16 位采样按 `255 / 65535` 缩放，浮点采样先截断到 `[0, 1]` 再乘 255；
/// 缺少 alpha 通道时按不透明处理。
pub(crate) fn samples_on_u8_scale(image: &DynamicImage, channels: usize) -> Vec<f32> {
  let color = image.color();
  let bytes_per_sample = color.bytes_per_pixel() / color.channel_count();
  let (width, height) = image.dimensions();
  let mut samples = Vec::with_capacity(width as usize * height as usize * channels);

  match bytes_per_sample {
    1 => {
      for pixel in image.to_rgba8().pixels() {
        samples.extend(pixel.0[..channels].iter().map(|&s| f32::from(s)));
      }
    }
    2 => {
      for pixel in image.to_rgba16().pixels() {
        samples.extend(pixel.0[..channels].iter().map(|&s| f32::from(s) * U16_TO_U8));
      }
    }
    _ => {
      for pixel in image.to_rgba32f().pixels() {
        samples.extend(pixel.0[..channels].iter().map(|&s| s.clamp(0.0, 1.0) * 255.0));
      }
    }
  }

  samples
}

mod cpu;
pub use self::cpu::CpuPreprocessor;

#[cfg(feature = "tensorflow")]
mod graph;
#[cfg(feature = "tensorflow")]
pub use self::graph::GraphPreprocessor;

/// 预处理后端选择
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessBackend {
  /// `image` 库双线性缩放
  #[default]
  Cpu,
  /// TensorFlow 预处理计算图
  #[cfg(feature = "tensorflow")]
  Graph,
}

impl std::str::FromStr for PreprocessBackend {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "cpu" => Ok(PreprocessBackend::Cpu),
      #[cfg(feature = "tensorflow")]
      "graph" => Ok(PreprocessBackend::Graph),
      other => Err(format!("未知的预处理后端: {}", other)),
    }
  }
}

#[derive(Debug)]
pub enum PreprocessorWrapper {
  Cpu(CpuPreprocessor),
  #[cfg(feature = "tensorflow")]
  Graph(GraphPreprocessor),
}

impl PreprocessorWrapper {
  pub fn new(backend: PreprocessBackend) -> Result<Self, PreprocessError> {
    match backend {
      PreprocessBackend::Cpu => Ok(PreprocessorWrapper::Cpu(CpuPreprocessor)),
      #[cfg(feature = "tensorflow")]
      PreprocessBackend::Graph => Ok(PreprocessorWrapper::Graph(GraphPreprocessor::new()?)),
    }
  }
}

impl Preprocessor for PreprocessorWrapper {
  fn preprocess(
    &self,
    image: &DynamicImage,
    plan: &SizePlan,
    channels: usize,
  ) -> Result<NormalizedTensor, PreprocessError> {
    match self {
      PreprocessorWrapper::Cpu(inner) => inner.preprocess(image, plan, channels),
      #[cfg(feature = "tensorflow")]
      PreprocessorWrapper::Graph(inner) => inner.preprocess(image, plan, channels),
    }
  }
}
