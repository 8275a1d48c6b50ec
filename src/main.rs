// 该文件是 Weili （微粒） 项目的一部分。
// src/main.rs - 服务主程序
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

mod args;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use weili::{
  FromUrl,
  model::{FasterRcnnBuilder, Model},
  output::{Draw, LabelFont},
  server::{self, ServerConfig},
  task::DetectTask,
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();

  info!("Weili 微塑料检测服务");
  info!("模型地址: {}", args.model);
  info!("置信度阈值: {}", args.confidence);

  let model = FasterRcnnBuilder::from_url(&args.model)
    .context("模型地址无效")?
    .build()
    .context("模型加载失败")?;
  info!("推理设备: {}", model.device());

  let font = LabelFont::resolve(Some(args.font.as_path()), args.font_size).context("字体无效")?;
  let task = DetectTask::new(Arc::new(model), Draw::new(font)).with_threshold(args.confidence);

  let config = ServerConfig {
    addr: args.addr(),
    max_upload_bytes: args.max_upload_bytes,
  };

  let app = server::router(task, &config);
  server::serve(app, config.addr).await
}
