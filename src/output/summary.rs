// 该文件是 Dongfeng （东风） 项目的一部分。
// src/output/summary.rs - 推理结果摘要输出
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
use serde_json::{Value, json};
use tracing::debug;

use crate::{frame::OutputTensor, output::Render, task::PipelineOutput};

/// 以 JSON 形式打印尺寸规划与两个输出张量的统计信息
#[derive(Debug, Default, Clone, Copy)]
pub struct SummaryOutput {
  pub pretty: bool,
}

fn describe(tensor: &OutputTensor) -> Value {
  let (min, max, mean) = match tensor.stats() {
    Some((min, max, mean)) => (json!(min), json!(max), json!(mean)),
    None => (Value::Null, Value::Null, Value::Null),
  };
  json!({
    "name": tensor.name,
    "shape": tensor.shape,
    "min": min,
    "max": max,
    "mean": mean,
  })
}

impl SummaryOutput {
  pub fn pretty() -> Self {
    SummaryOutput { pretty: true }
  }

  pub fn summary(&self, result: &PipelineOutput) -> Value {
    let plan = &result.plan;
    json!({
      "plan": {
        "source": [plan.source_height, plan.source_width],
        "target": [plan.target_height, plan.target_width],
        "ratio_h": plan.ratio_h,
        "ratio_w": plan.ratio_w,
      },
      "input": result.input.shape(),
      "outputs": result.result.iter().map(describe).collect::<Vec<_>>(),
    })
  }
}

impl Render<DynamicImage, PipelineOutput> for SummaryOutput {
  type Error = serde_json::Error;

  fn render_result(
    &self,
    _frame: &DynamicImage,
    result: &PipelineOutput,
  ) -> Result<(), Self::Error> {
    let summary = self.summary(result);
    let text = if self.pretty {
      serde_json::to_string_pretty(&summary)?
    } else {
      serde_json::to_string(&summary)?
    };
    debug!("输出推理结果摘要");
    println!("{}", text);
    Ok(())
  }
}
