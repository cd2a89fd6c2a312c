// 该文件是 Dongfeng （东风） 项目的一部分。
// src/task.rs - 检测流水线与任务
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

use std::time::{Duration, Instant};

use image::{DynamicImage, GenericImageView};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  frame::NormalizedTensor,
  model::{Detector, DetectorError, InferenceResult},
  output::Render,
  plan::{PlanError, SizePlan, SizePlanner},
  preprocess::{DEFAULT_CHANNELS, PreprocessError, Preprocessor},
};

/// 一次检测的结果，附带所用的尺寸规划以便把几何信息映射回原图
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
  pub plan: SizePlan,
  /// 实际送入检测器的张量
  pub input: NormalizedTensor,
  pub result: InferenceResult,
}

#[derive(Error, Debug)]
pub enum PipelineError<E = DetectorError> {
  #[error("尺寸规划错误: {0}")]
  Plan(#[from] PlanError),
  #[error("预处理错误: {0}")]
  Preprocess(#[from] PreprocessError),
  #[error("模型推理错误: {0}")]
  Detect(#[source] E),
}

/// 尺寸规划 -> 预处理 -> 检测
///
/// 预处理器与检测器只构建一次，`run` 可以对不同图像反复调用。
#[derive(Debug)]
pub struct Pipeline<P, D> {
  planner: SizePlanner,
  preprocessor: P,
  detector: D,
  channels: usize,
}

impl<P: Preprocessor, D: Detector> Pipeline<P, D> {
  pub fn new(preprocessor: P, detector: D) -> Self {
    Pipeline {
      planner: SizePlanner::default(),
      preprocessor,
      detector,
      channels: DEFAULT_CHANNELS,
    }
  }

  pub fn with_planner(mut self, planner: SizePlanner) -> Self {
    self.planner = planner;
    self
  }

  pub fn with_channels(mut self, channels: usize) -> Self {
    self.channels = channels;
    self
  }

  pub fn planner(&self) -> &SizePlanner {
    &self.planner
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn detector(&self) -> &D {
    &self.detector
  }

  pub fn run(&self, image: &DynamicImage) -> Result<PipelineOutput, PipelineError<D::Error>> {
    let (width, height) = image.dimensions();
    let plan = self.planner.plan(height, width)?;

    let now = Instant::now();
    let tensor = self.preprocessor.preprocess(image, &plan, self.channels)?;
    let preprocess_elapsed = now.elapsed();
    debug!("输入张量形状: {:?}", tensor.shape());

    let now = Instant::now();
    let result = self
      .detector
      .detect(&tensor)
      .map_err(PipelineError::Detect)?;
    let detect_elapsed = now.elapsed();

    info!(
      "预处理耗时: {:.2?}, 推理耗时: {:.2?}",
      preprocess_elapsed, detect_elapsed
    );

    Ok(PipelineOutput {
      plan,
      input: tensor,
      result,
    })
  }
}

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  DE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: IntoIterator<Item = DynamicImage>,
  P: Preprocessor,
  D: Detector<Error = DE>,
  O: Render<DynamicImage, PipelineOutput, Error = RE>,
> Task<I, &Pipeline<P, D>, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, pipeline: &Pipeline<P, D>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let image = input
      .into_iter()
      .next()
      .ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;
    info!("输入图像获取成功，开始推理...");
    let now = Instant::now();
    let result = pipeline.run(&image)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&image, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 预热轮次，不计入平均耗时
pub const WARMUP_RUNS: usize = 2;

/// 去掉预热轮次后的平均耗时；轮次不足时使用全部样本
pub fn mean_latency(times: &[Duration], warmup: usize) -> Option<Duration> {
  let measured = if times.len() > warmup {
    &times[warmup..]
  } else {
    times
  };
  if measured.is_empty() {
    return None;
  }
  Some(measured.iter().sum::<Duration>() / measured.len() as u32)
}

/// 用同一条流水线对同一张图像重复推理，统计平均耗时
#[derive(Debug, Clone, Copy)]
pub struct RepeatShotTask {
  repeat: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    RepeatShotTask { repeat: 100 }
  }
}

impl RepeatShotTask {
  pub fn new(repeat: usize) -> Self {
    RepeatShotTask { repeat }
  }

  pub fn repeat(&self) -> usize {
    self.repeat
  }
}

impl<
  DE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: IntoIterator<Item = DynamicImage>,
  P: Preprocessor,
  D: Detector<Error = DE>,
  O: Render<DynamicImage, PipelineOutput, Error = RE>,
> Task<I, &Pipeline<P, D>, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, pipeline: &Pipeline<P, D>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let image = input
      .into_iter()
      .next()
      .ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;
    info!("输入图像获取成功，开始推理...");

    let mut times = Vec::with_capacity(self.repeat);
    let mut last = None;
    for i in 0..self.repeat {
      let now = Instant::now();
      let result = pipeline.run(&image)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);
      last = Some(result);
    }

    if let Some(result) = last {
      output.render_result(&image, &result)?;
    }

    match mean_latency(&times, WARMUP_RUNS) {
      Some(mean) => warn!("平均推理时间: {:.2?} ({} 次)", mean, times.len()),
      None => warn!("未执行推理"),
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{frame::OutputTensor, preprocess::CpuPreprocessor};
  use image::{ImageBuffer, Rgb};
  use std::cell::{Cell, RefCell};

  #[derive(Debug, Error)]
  #[error("mock failure")]
  struct MockError;

  /// 记录输入形状，并返回与输入同尺寸的输出
  #[derive(Default)]
  struct MockDetector {
    shapes: RefCell<Vec<[usize; 4]>>,
    fail: bool,
  }

  impl Detector for MockDetector {
    type Error = MockError;

    fn detect(&self, input: &NormalizedTensor) -> Result<InferenceResult, Self::Error> {
      if self.fail {
        return Err(MockError);
      }
      self.shapes.borrow_mut().push(input.shape());
      let [_, h, w, _] = input.shape();
      Ok(InferenceResult {
        score_map: OutputTensor::new("pred_score_map/Sigmoid", vec![1, h, w, 1], vec![0.5; h * w])
          .unwrap(),
        geo_map: OutputTensor::new("pred_geo_map/concat", vec![1, h, w, 5], vec![0.0; h * w * 5])
          .unwrap(),
      })
    }
  }

  #[derive(Default)]
  struct CountingOutput {
    renders: Cell<usize>,
  }

  impl Render<DynamicImage, PipelineOutput> for &CountingOutput {
    type Error = MockError;

    fn render_result(&self, _: &DynamicImage, _: &PipelineOutput) -> Result<(), Self::Error> {
      self.renders.set(self.renders.get() + 1);
      Ok(())
    }
  }

  fn image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([9, 99, 199])))
  }

  #[test]
  fn runs_plan_preprocess_detect() {
    let pipeline = Pipeline::new(CpuPreprocessor, MockDetector::default());
    let output = pipeline.run(&image(500, 1000)).unwrap();

    assert_eq!((output.plan.target_height, output.plan.target_width), (992, 480));
    assert_eq!(pipeline.detector().shapes.borrow()[0], [1, 992, 480, 3]);
    assert_eq!(output.result.score_map.shape, vec![1, 992, 480, 1]);
    assert_eq!(output.input.shape(), [1, 992, 480, 3]);
  }

  #[test]
  fn honours_planner_and_channels() {
    let pipeline = Pipeline::new(CpuPreprocessor, MockDetector::default())
      .with_planner(SizePlanner::new(320, 32))
      .with_channels(4);
    let output = pipeline.run(&image(640, 480)).unwrap();

    assert_eq!((output.plan.target_height, output.plan.target_width), (224, 320));
    assert_eq!(pipeline.detector().shapes.borrow()[0], [1, 224, 320, 4]);
  }

  #[test]
  fn propagates_stage_errors() {
    let pipeline = Pipeline::new(CpuPreprocessor, MockDetector::default());
    assert!(matches!(
      pipeline.run(&image(10, 10)),
      Err(PipelineError::Plan(PlanError::DegenerateSize { .. }))
    ));

    let pipeline = pipeline.with_channels(1);
    assert!(matches!(
      pipeline.run(&image(64, 64)),
      Err(PipelineError::Preprocess(PreprocessError::UnsupportedChannels(1)))
    ));

    let failing = Pipeline::new(
      CpuPreprocessor,
      MockDetector {
        fail: true,
        ..Default::default()
      },
    );
    assert!(matches!(
      failing.run(&image(64, 64)),
      Err(PipelineError::Detect(MockError))
    ));
  }

  #[test]
  fn one_shot_renders_once() {
    let pipeline = Pipeline::new(CpuPreprocessor, MockDetector::default());
    let output = CountingOutput::default();
    OneShotTask
      .run_task(Some(image(64, 64)), &pipeline, &output)
      .unwrap();
    assert_eq!(output.renders.get(), 1);

    let empty: Option<DynamicImage> = None;
    assert!(OneShotTask.run_task(empty, &pipeline, &output).is_err());
  }

  #[test]
  fn repeat_shot_reuses_pipeline() {
    let pipeline = Pipeline::new(CpuPreprocessor, MockDetector::default());
    let output = CountingOutput::default();
    assert_eq!(RepeatShotTask::default().repeat(), 100);
    let task = RepeatShotTask::new(5);
    assert_eq!(task.repeat(), 5);
    task
      .run_task(Some(image(64, 96)), &pipeline, &output)
      .unwrap();

    let shapes = pipeline.detector().shapes.borrow();
    assert_eq!(shapes.len(), 5);
    assert!(shapes.iter().all(|s| *s == [1, 96, 64, 3]));
    assert_eq!(output.renders.get(), 1);
  }

  #[test]
  fn mean_latency_skips_warmup() {
    let ms = Duration::from_millis;
    assert_eq!(
      mean_latency(&[ms(100), ms(50), ms(10), ms(20)], 2),
      Some(ms(15))
    );
    assert_eq!(mean_latency(&[ms(8), ms(4)], 2), Some(ms(6)));
    assert_eq!(mean_latency(&[], 2), None);
  }
}
