// 该文件是 Weili （微粒） 项目的一部分。
// src/bin/simple.rs - 单张图像检测
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

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use weili::{
  FromUrl,
  config::{CONFIDENCE_THRESHOLD, DEFAULT_FONT_PATH, DEFAULT_FONT_SIZE, DEFAULT_MODEL_URL},
  input::ImageFileInput,
  model::FasterRcnnBuilder,
  output::{Draw, LabelFont, SaveImageFileOutput},
  postprocess::DetectionOutcome,
  task::DetectTask,
};

/// 对单张图像执行微塑料检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址
  #[arg(long, default_value = DEFAULT_MODEL_URL, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像，例如 image:///data/sample.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，检测结果写入同名 .json 文件
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 置信度阈值
  #[arg(long, default_value_t = CONFIDENCE_THRESHOLD)]
  pub confidence: f32,
  /// 标签字体文件
  #[arg(long, default_value = DEFAULT_FONT_PATH, value_name = "FILE")]
  pub font: PathBuf,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = ImageFileInput::from_url(&args.input)?;
  let model = FasterRcnnBuilder::from_url(&args.model)?.build()?;
  let output = SaveImageFileOutput::from_url(&args.output)?;

  let font = LabelFont::resolve(Some(args.font.as_path()), DEFAULT_FONT_SIZE)?;
  let task = DetectTask::new(Arc::new(model), Draw::new(font)).with_threshold(args.confidence);

  match task.run_oneshot(input, &output)? {
    DetectionOutcome::Summary(summary) => {
      info!("检测到 {} 个微塑料", summary.total_detections);
      for det in &summary.detections {
        info!(
          "  - #{}: {:.2}% at [{}, {}, {}, {}]",
          det.id,
          det.confidence * 100.0,
          det.bbox[0],
          det.bbox[1],
          det.bbox[2],
          det.bbox[3]
        );
      }
    }
    DetectionOutcome::Missing { error } => info!("{}", error),
  }

  Ok(())
}
