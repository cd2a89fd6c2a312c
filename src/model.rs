// 该文件是 Dongfeng （东风） 项目的一部分。
// src/model.rs - 检测模型
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

use std::path::PathBuf;

use thiserror::Error;

use crate::frame::{NormalizedTensor, OutputTensor};

pub const DEFAULT_INPUT_NAME: &str = "input_image";
pub const DEFAULT_SCORE_MAP_NAME: &str = "pred_score_map/Sigmoid";
pub const DEFAULT_GEO_MAP_NAME: &str = "pred_geo_map/concat";

pub trait Detector {
  type Error;

  fn detect(&self, input: &NormalizedTensor) -> Result<InferenceResult, Self::Error>;
}

impl<D: Detector> Detector for &D {
  type Error = D::Error;

  fn detect(&self, input: &NormalizedTensor) -> Result<InferenceResult, Self::Error> {
    (*self).detect(input)
  }
}

/// 检测图中输入与两个输出操作的名称
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNames {
  pub input: String,
  pub score_map: String,
  pub geo_map: String,
}

impl Default for GraphNames {
  fn default() -> Self {
    Self {
      input: DEFAULT_INPUT_NAME.to_string(),
      score_map: DEFAULT_SCORE_MAP_NAME.to_string(),
      geo_map: DEFAULT_GEO_MAP_NAME.to_string(),
    }
  }
}

/// 单次推理的输出：文字得分图与几何图
///
/// 张量保持引擎返回时的原样，几何图中的坐标位于目标尺寸坐标系，
/// 需要配合 [`crate::plan::SizePlan`] 的比例映射回原图。
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
  pub score_map: OutputTensor,
  pub geo_map: OutputTensor,
}

impl InferenceResult {
  /// 按输出操作名称查找
  pub fn get(&self, name: &str) -> Option<&OutputTensor> {
    self.iter().find(|t| t.name == name)
  }

  pub fn iter(&self) -> impl Iterator<Item = &OutputTensor> {
    [&self.score_map, &self.geo_map].into_iter()
  }
}

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("模型加载错误: {path}: {source}")]
  ModelLoad {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("计算图导入失败: {0}")]
  GraphImport(String),
  #[error("计算图中缺少操作: {0}")]
  MissingOperation(String),
  #[error("创建推理会话失败: {0}")]
  Session(String),
  #[error("输入张量不匹配: {0}")]
  ShapeMismatch(String),
  #[error("推理执行失败: {0}")]
  Execution(String),
}

impl DetectorError {
  /// 模型或计算图配置类错误，在构建阶段产生
  pub fn is_configuration(&self) -> bool {
    matches!(
      self,
      DetectorError::ModelLoad { .. }
        | DetectorError::GraphImport(_)
        | DetectorError::MissingOperation(_)
        | DetectorError::Session(_)
    )
  }
}

#[cfg(feature = "tensorflow")]
mod tf;
#[cfg(feature = "tensorflow")]
pub use self::tf::{TfDetector, TfDetectorBuilder};
