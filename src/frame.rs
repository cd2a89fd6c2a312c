// 该文件是 Dongfeng （东风） 项目的一部分。
// src/frame.rs - NHWC 张量定义
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

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
pub struct LengthMismatch {
  pub expected: usize,
  pub actual: usize,
}

/// 归一化后的单张图像张量，布局为 `[1, H, W, C]`
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
  height: usize,
  width: usize,
  channels: usize,
  data: Box<[f32]>,
}

impl NormalizedTensor {
  pub fn from_vec(
    height: usize,
    width: usize,
    channels: usize,
    data: Vec<f32>,
  ) -> Result<Self, LengthMismatch> {
    let expected = height * width * channels;
    if data.len() != expected {
      return Err(LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      height,
      width,
      channels,
      data: data.into_boxed_slice(),
    })
  }

  pub fn batch(&self) -> usize {
    1
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, self.height, self.width, self.channels]
  }

  pub fn as_nhwc(&self) -> &[f32] {
    &self.data
  }

  /// 读取 `(y, x, c)` 处的值
  pub fn get(&self, y: usize, x: usize, c: usize) -> Option<f32> {
    if y >= self.height || x >= self.width || c >= self.channels {
      return None;
    }
    self
      .data
      .get((y * self.width + x) * self.channels + c)
      .copied()
  }
}

/// 推理引擎返回的原始输出张量
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
  pub name: String,
  pub shape: Vec<usize>,
  pub data: Box<[f32]>,
}

impl OutputTensor {
  pub fn new(
    name: impl Into<String>,
    shape: Vec<usize>,
    data: Vec<f32>,
  ) -> Result<Self, LengthMismatch> {
    let expected = shape.iter().product::<usize>();
    if data.len() != expected {
      return Err(LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      name: name.into(),
      shape,
      data: data.into_boxed_slice(),
    })
  }

  /// NHWC 布局下的通道数
  pub fn channels(&self) -> Option<usize> {
    if self.shape.len() == 4 {
      Some(self.shape[3])
    } else {
      None
    }
  }

  /// 返回 `(min, max, mean)`，空张量返回 `None`
  pub fn stats(&self) -> Option<(f32, f32, f32)> {
    if self.data.is_empty() {
      return None;
    }
    let (min, max, sum) = self.data.iter().fold(
      (f32::INFINITY, f32::NEG_INFINITY, 0f64),
      |(min, max, sum), &v| (min.min(v), max.max(v), sum + v as f64),
    );
    Some((min, max, (sum / self.data.len() as f64) as f32))
  }
}
