// 该文件是 Dongfeng （东风） 项目的一部分。
// src/bin/simple_oneshot.rs - 单次检测并保存中间图像
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

use anyhow::Result;
use clap::Parser;
use tracing::info;

use dongfeng::{
  Config,
  input::ImageFileInput,
  output::{OutputWrapper, Render, SaveImageFileOutput, SummaryOutput},
};

/// Dongfeng 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// EAST 模型文件路径
  #[arg(long = "model_path", value_name = "MODEL")]
  pub model_path: PathBuf,
  /// 输入图像路径
  #[arg(long = "image_path", value_name = "IMAGE")]
  pub image_path: PathBuf,
  /// 输出目录，保存缩放后的输入与得分图
  #[arg(long, value_name = "DIR")]
  pub output: PathBuf,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model_path.display());
  info!("输入图像路径: {}", args.image_path.display());
  info!("输出目录: {}", args.output.display());

  let pipeline = Config::new(&args.model_path, &args.image_path).build_pipeline()?;
  let image = ImageFileInput::open(&args.image_path)?.into_image();
  let outputs = [
    OutputWrapper::Summary(SummaryOutput::pretty()),
    OutputWrapper::SaveImageFile(SaveImageFileOutput::new(&args.output)),
  ];

  info!("开始推理...");
  let now = std::time::Instant::now();
  let result = pipeline.run(&image)?;
  info!("推理完成，耗时: {:.2?}", now.elapsed());
  info!(
    "目标尺寸 {}x{}, ratio_h={:.4}, ratio_w={:.4}",
    result.plan.target_height, result.plan.target_width, result.plan.ratio_h, result.plan.ratio_w
  );
  for output in &outputs {
    output.render_result(&image, &result)?;
  }

  Ok(())
}
