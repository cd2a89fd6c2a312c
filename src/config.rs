// 该文件是 Dongfeng （东风） 项目的一部分。
// src/config.rs - 运行配置
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

use crate::{
  model::GraphNames,
  plan::SizePlanner,
  preprocess::{DEFAULT_CHANNELS, PreprocessBackend, PreprocessError},
  task::PipelineError,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
  pub model_path: PathBuf,
  pub image_path: PathBuf,
  pub planner: SizePlanner,
  pub channels: usize,
  pub backend: PreprocessBackend,
  pub graph: GraphNames,
}

impl Config {
  pub fn new(model_path: impl AsRef<Path>, image_path: impl AsRef<Path>) -> Self {
    Config {
      model_path: model_path.as_ref().to_path_buf(),
      image_path: image_path.as_ref().to_path_buf(),
      planner: SizePlanner::default(),
      channels: DEFAULT_CHANNELS,
      backend: PreprocessBackend::default(),
      graph: GraphNames::default(),
    }
  }

  /// 检查与输入图像无关的参数
  pub fn validate(&self) -> Result<(), PipelineError> {
    self.planner.validate()?;
    if !(3..=4).contains(&self.channels) {
      return Err(PreprocessError::UnsupportedChannels(self.channels).into());
    }
    Ok(())
  }

  #[cfg(feature = "tensorflow")]
  pub fn build_pipeline(
    &self,
  ) -> Result<
    crate::task::Pipeline<crate::preprocess::PreprocessorWrapper, crate::model::TfDetector>,
    PipelineError,
  > {
    use crate::{model::TfDetectorBuilder, preprocess::PreprocessorWrapper, task::Pipeline};
    use tracing::info;

    self.validate()?;
    info!(
      "构建检测流水线: 预处理后端 {:?}, 最长边 {}, 步长 {}, 通道数 {}",
      self.backend, self.planner.max_side, self.planner.stride, self.channels
    );

    let preprocessor = PreprocessorWrapper::new(self.backend)?;
    let detector = TfDetectorBuilder::new(&self.model_path)
      .names(self.graph.clone())
      .build()
      .map_err(PipelineError::Detect)?;

    Ok(
      Pipeline::new(preprocessor, detector)
        .with_planner(self.planner)
        .with_channels(self.channels),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::plan::PlanError;

  #[test]
  fn defaults() {
    let config = Config::new("frozen_east_text_detection.pb", "sign.png");
    assert_eq!(config.planner, SizePlanner::new(2400, 32));
    assert_eq!(config.channels, 3);
    assert_eq!(config.backend, PreprocessBackend::Cpu);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn rejects_invalid_constants() {
    let mut config = Config::new("m.pb", "i.png");
    config.planner = SizePlanner::new(16, 32);
    assert!(matches!(
      config.validate(),
      Err(PipelineError::Plan(PlanError::InvalidConfig(_)))
    ));

    let mut config = Config::new("m.pb", "i.png");
    config.channels = 2;
    assert!(matches!(
      config.validate(),
      Err(PipelineError::Preprocess(PreprocessError::UnsupportedChannels(2)))
    ));
  }

  #[cfg(feature = "tensorflow")]
  #[test]
  fn missing_model_is_configuration_error() {
    let config = Config::new("/nonexistent/model.pb", "i.png");
    match config.build_pipeline() {
      Err(PipelineError::Detect(e)) => assert!(e.is_configuration()),
      other => panic!("unexpected: {:?}", other.map(|_| ())),
    }
  }
}
