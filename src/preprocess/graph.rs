// 该文件是 Dongfeng （东风） 项目的一部分。
// src/preprocess/graph.rs - TensorFlow 预处理计算图
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
use tensorflow::{
  DataType, Operation, Scope, Session, SessionOptions, SessionRunArgs, Tensor, ops,
};
use tracing::{debug, info};

use super::{HALF_RANGE, PreprocessError, Preprocessor, check_request, samples_on_u8_scale};
use crate::{frame::NormalizedTensor, plan::SizePlan};

/// 由小型 TensorFlow 计算图完成重采样与归一化
///
/// 计算图：`pixels[H,W,C] -> expand_dims -> resize_bilinear(size) -> / 127.5 -> - 1`，
/// 在 [`GraphPreprocessor::new`] 中构建一次，之后每次调用只执行会话。
pub struct GraphPreprocessor {
  session: Session,
  pixels: Operation,
  size: Operation,
  normalized: Operation,
}

impl std::fmt::Debug for GraphPreprocessor {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GraphPreprocessor")
      .field("pixels", &self.pixels.name().unwrap_or_default())
      .field("normalized", &self.normalized.name().unwrap_or_default())
      .finish()
  }
}

impl GraphPreprocessor {
  pub fn new() -> Result<Self, PreprocessError> {
    info!("构建预处理计算图");
    let mut scope = Scope::new_root_scope();

    let pixels = ops::Placeholder::new()
      .dtype(DataType::Float)
      .build(&mut scope.with_op_name("pixels"))?;
    let size = ops::Placeholder::new()
      .dtype(DataType::Int32)
      .build(&mut scope.with_op_name("size"))?;

    let batch_axis = ops::constant(0i32, &mut scope.with_op_name("batch_axis"))?;
    let batched = ops::expand_dims(
      pixels.clone(),
      batch_axis,
      &mut scope.with_op_name("batched"),
    )?;
    let resized = ops::ResizeBilinear::new()
      .half_pixel_centers(true)
      .build(batched, size.clone(), &mut scope.with_op_name("resized"))?;

    let half_range = ops::constant(HALF_RANGE, &mut scope.with_op_name("half_range"))?;
    let one = ops::constant(1.0f32, &mut scope.with_op_name("one"))?;
    let scaled = ops::div(resized, half_range, &mut scope.with_op_name("scaled"))?;
    let normalized = ops::sub(scaled, one, &mut scope.with_op_name("normalized"))?;

    let session = Session::new(&SessionOptions::new(), &scope.graph())?;
    debug!("预处理计算图构建完成");

    Ok(GraphPreprocessor {
      session,
      pixels,
      size,
      normalized,
    })
  }
}

impl Preprocessor for GraphPreprocessor {
  fn preprocess(
    &self,
    image: &DynamicImage,
    plan: &SizePlan,
    channels: usize,
  ) -> Result<NormalizedTensor, PreprocessError> {
    check_request(image, plan, channels)?;

    let now = std::time::Instant::now();
    let samples = samples_on_u8_scale(image, channels);
    let pixels = Tensor::<f32>::new(&[
      plan.source_height as u64,
      plan.source_width as u64,
      channels as u64,
    ])
    .with_values(&samples)?;
    let size = Tensor::<i32>::new(&[2])
      .with_values(&[plan.target_height as i32, plan.target_width as i32])?;

    let mut args = SessionRunArgs::new();
    args.add_feed(&self.pixels, 0, &pixels);
    args.add_feed(&self.size, 0, &size);
    let token = args.request_fetch(&self.normalized, 0);
    self.session.run(&mut args)?;
    let output: Tensor<f32> = args.fetch(token)?;
    debug!("预处理计算图执行完成，耗时: {:.2?}", now.elapsed());

    Ok(NormalizedTensor::from_vec(
      plan.target_height as usize,
      plan.target_width as usize,
      channels,
      output.to_vec(),
    )?)
  }
}
