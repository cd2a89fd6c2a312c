// 该文件是 Dongfeng （东风） 项目的一部分。
// src/plan.rs - 输入尺寸规划
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
use tracing::debug;

/// 最长边上限
pub const DEFAULT_MAX_SIDE: u32 = 2400;
/// EAST 网络的下采样对齐单位
pub const DEFAULT_STRIDE: u32 = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
  #[error("尺寸规划参数无效: {0}")]
  InvalidConfig(String),
  #[error("图像尺寸 {height}x{width} 过小, 无法对齐到步长 {stride}")]
  DegenerateSize { height: u32, width: u32, stride: u32 },
}

/// 一次缩放的规划结果
///
/// `ratio_h` 与 `ratio_w` 由对齐之后的目标尺寸重新计算，二者一般不相等，
/// 将检测结果映射回原图时需要分别使用。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizePlan {
  pub source_height: u32,
  pub source_width: u32,
  pub target_height: u32,
  pub target_width: u32,
  pub ratio_h: f64,
  pub ratio_w: f64,
}

impl SizePlan {
  /// 目标尺寸与原图一致，不需要重采样
  pub fn is_identity(&self) -> bool {
    self.source_height == self.target_height && self.source_width == self.target_width
  }

  /// 将目标坐标系下的点映射回原图坐标系
  pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
    ((x as f64 / self.ratio_w) as f32, (y as f64 / self.ratio_h) as f32)
  }
}

fn check_constants(max_side: u32, stride: u32) -> Result<(), PlanError> {
  if stride == 0 {
    return Err(PlanError::InvalidConfig("步长不能为 0".to_string()));
  }
  if max_side < stride {
    return Err(PlanError::InvalidConfig(format!(
      "最长边上限 {} 小于步长 {}",
      max_side, stride
    )));
  }
  Ok(())
}

/// 计算缩放规划
///
/// 只缩小不放大；最长边超过 `max_side` 时按比例缩小，随后两条边分别向下对齐到
/// `stride` 的整数倍。对齐后任意一边为 0 时返回 [`PlanError::DegenerateSize`]。
pub fn plan(
  source_height: u32,
  source_width: u32,
  max_side: u32,
  stride: u32,
) -> Result<SizePlan, PlanError> {
  check_constants(max_side, stride)?;

  let degenerate = PlanError::DegenerateSize {
    height: source_height,
    width: source_width,
    stride,
  };
  if source_height == 0 || source_width == 0 {
    return Err(degenerate);
  }

  let biggest = source_height.max(source_width);
  // 整数运算保证最长边恰好落在 max_side 上
  let scale = |side: u32| -> u32 {
    if biggest > max_side {
      (side as u64 * max_side as u64 / biggest as u64) as u32
    } else {
      side
    }
  };

  let target_height = scale(source_height) / stride * stride;
  let target_width = scale(source_width) / stride * stride;

  if target_height == 0 || target_width == 0 {
    return Err(degenerate);
  }

  let plan = SizePlan {
    source_height,
    source_width,
    target_height,
    target_width,
    ratio_h: target_height as f64 / source_height as f64,
    ratio_w: target_width as f64 / source_width as f64,
  };

  debug!(
    "尺寸规划: {}x{} -> {}x{} (ratio_h={:.4}, ratio_w={:.4})",
    source_height, source_width, target_height, target_width, plan.ratio_h, plan.ratio_w
  );

  Ok(plan)
}

/// 持有规划常量的尺寸规划器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizePlanner {
  pub max_side: u32,
  pub stride: u32,
}

impl Default for SizePlanner {
  fn default() -> Self {
    Self {
      max_side: DEFAULT_MAX_SIDE,
      stride: DEFAULT_STRIDE,
    }
  }
}

impl SizePlanner {
  pub fn new(max_side: u32, stride: u32) -> Self {
    Self { max_side, stride }
  }

  /// 在处理任何图像之前检查规划常量
  pub fn validate(&self) -> Result<(), PlanError> {
    check_constants(self.max_side, self.stride)
  }

  pub fn plan(&self, source_height: u32, source_width: u32) -> Result<SizePlan, PlanError> {
    plan(source_height, source_width, self.max_side, self.stride)
  }
}
