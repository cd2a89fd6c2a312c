// 该文件是 Dongfeng （东风） 项目的一部分。
// src/model/tf.rs - TensorFlow EAST 检测模型
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

use tensorflow::{
  Code, DataType, FetchToken, Graph, ImportGraphDefOptions, Operation, Output, Session,
  SessionOptions, SessionRunArgs, Status, Tensor,
};
use tracing::{debug, error, info};

use crate::{
  frame::{NormalizedTensor, OutputTensor},
  model::{Detector, DetectorError, GraphNames, InferenceResult},
};

pub struct TfDetector {
  graph: Graph,
  session: Session,
  input: Operation,
  score_map: Operation,
  geo_map: Operation,
  names: GraphNames,
}

impl std::fmt::Debug for TfDetector {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TfDetector")
      .field("names", &self.names)
      .finish()
  }
}

pub struct TfDetectorBuilder {
  model_path: PathBuf,
  names: GraphNames,
}

impl TfDetectorBuilder {
  pub fn new(model_path: impl AsRef<Path>) -> Self {
    TfDetectorBuilder {
      model_path: model_path.as_ref().to_path_buf(),
      names: GraphNames::default(),
    }
  }

  pub fn names(mut self, names: GraphNames) -> Self {
    self.names = names;
    self
  }

  pub fn build(self) -> Result<TfDetector, DetectorError> {
    info!("加载模型文件: {}", self.model_path.display());
    let graph_def = std::fs::read(&self.model_path).map_err(|source| {
      error!("读取模型文件失败: {}", source);
      DetectorError::ModelLoad {
        path: self.model_path.clone(),
        source,
      }
    })?;
    debug!(
      "模型文件大小: {:.2} MB",
      graph_def.len() as f64 / (1024.0 * 1024.0)
    );

    let mut graph = Graph::new();
    graph
      .import_graph_def(&graph_def, &ImportGraphDefOptions::new())
      .map_err(|e| DetectorError::GraphImport(e.to_string()))?;

    let input = lookup(&graph, &self.names.input)?;
    let score_map = lookup(&graph, &self.names.score_map)?;
    let geo_map = lookup(&graph, &self.names.geo_map)?;

    info!("创建 TensorFlow 推理会话");
    let session = Session::new(&SessionOptions::new(), &graph)
      .map_err(|e| DetectorError::Session(e.to_string()))?;
    info!("模型加载完成");

    Ok(TfDetector {
      graph,
      session,
      input,
      score_map,
      geo_map,
      names: self.names,
    })
  }
}

fn lookup(graph: &Graph, name: &str) -> Result<Operation, DetectorError> {
  graph.operation_by_name_required(name).map_err(|e| {
    error!("计算图中找不到操作 {}: {}", name, e);
    DetectorError::MissingOperation(name.to_string())
  })
}

fn run_error(status: Status) -> DetectorError {
  if status.code() == Code::InvalidArgument {
    DetectorError::ShapeMismatch(status.to_string())
  } else {
    DetectorError::Execution(status.to_string())
  }
}

fn fetch_output(
  args: &mut SessionRunArgs<'_>,
  token: FetchToken,
  name: &str,
) -> Result<OutputTensor, DetectorError> {
  let tensor: Tensor<f32> = args.fetch(token).map_err(run_error)?;
  let shape = tensor.dims().iter().map(|&d| d as usize).collect();
  OutputTensor::new(name, shape, tensor.to_vec())
    .map_err(|e| DetectorError::Execution(e.to_string()))
}

impl TfDetector {
  /// 按输入操作声明的类型与静态形状检查张量，未知维度不检查
  fn check_input(&self, input: &NormalizedTensor) -> Result<(), DetectorError> {
    let dtype = self.input.output_type(0);
    if dtype != DataType::Float {
      return Err(DetectorError::ShapeMismatch(format!(
        "输入 {} 期望类型 {}, 实际为 float",
        self.names.input, dtype
      )));
    }

    let declared = self
      .graph
      .tensor_shape(Output {
        operation: self.input.clone(),
        index: 0,
      })
      .map_err(|e| DetectorError::Execution(e.to_string()))?;

    let Some(rank) = declared.dims() else {
      return Ok(());
    };
    let actual = input.shape();
    if rank != actual.len() {
      return Err(DetectorError::ShapeMismatch(format!(
        "输入 {} 期望秩 {}, 实际秩 {}",
        self.names.input,
        rank,
        actual.len()
      )));
    }

    for (axis, &size) in actual.iter().enumerate() {
      if let Some(expected) = declared[axis]
        && expected >= 0
        && expected as usize != size
      {
        return Err(DetectorError::ShapeMismatch(format!(
          "输入 {} 第 {} 维期望 {}, 实际 {}",
          self.names.input, axis, expected, size
        )));
      }
    }

    Ok(())
  }
}

impl Detector for TfDetector {
  type Error = DetectorError;

  fn detect(&self, input: &NormalizedTensor) -> Result<InferenceResult, Self::Error> {
    self.check_input(input)?;

    let dims = input.shape().map(|d| d as u64);
    let tensor = Tensor::<f32>::new(&dims)
      .with_values(input.as_nhwc())
      .map_err(|e| DetectorError::ShapeMismatch(e.to_string()))?;

    debug!("设置模型输入: {:?}", dims);
    let mut args = SessionRunArgs::new();
    args.add_feed(&self.input, 0, &tensor);
    let score_token = args.request_fetch(&self.score_map, 0);
    let geo_token = args.request_fetch(&self.geo_map, 0);

    debug!("执行模型推理");
    self.session.run(&mut args).map_err(|e| {
      error!("模型推理失败: {}", e);
      run_error(e)
    })?;

    debug!("获取模型输出");
    let score_map = fetch_output(&mut args, score_token, &self.names.score_map)?;
    let geo_map = fetch_output(&mut args, geo_token, &self.names.geo_map)?;
    debug!(
      "得分图形状: {:?}, 几何图形状: {:?}",
      score_map.shape, geo_map.shape
    );

    Ok(InferenceResult { score_map, geo_map })
  }
}
