// 该文件是 Dongfeng （东风） 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 重复推理基准测试
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
  output::SummaryOutput,
  preprocess::PreprocessBackend,
  task::{RepeatShotTask, Task},
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
  /// 重复推理次数
  #[arg(long, default_value = "100", value_name = "N")]
  pub repeat: usize,
  /// 预处理后端: cpu 或 graph
  #[arg(long, default_value = "cpu", value_name = "BACKEND")]
  pub preprocess: PreprocessBackend,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model_path.display());
  info!("输入图像路径: {}", args.image_path.display());
  info!("重复次数: {}", args.repeat);

  let mut config = Config::new(&args.model_path, &args.image_path);
  config.backend = args.preprocess;

  let pipeline = config.build_pipeline()?;
  let input = ImageFileInput::open(&config.image_path)?;

  RepeatShotTask::new(args.repeat).run_task(input, &pipeline, SummaryOutput::default())?;

  Ok(())
}
