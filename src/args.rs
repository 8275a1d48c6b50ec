// 该文件是 Weili （微粒） 项目的一部分。
// src/args.rs - 服务参数配置
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

use std::{
  net::{IpAddr, SocketAddr},
  path::PathBuf,
};

use clap::Parser;
use url::Url;

use weili::config::{
  CONFIDENCE_THRESHOLD, DEFAULT_FONT_PATH, DEFAULT_FONT_SIZE, DEFAULT_HOST,
  DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_MODEL_URL, DEFAULT_PORT,
};

/// Weili 微塑料检测服务
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址，例如 onnx:model.onnx?device=cuda&threads=4
  #[arg(long, env = "WEILI_MODEL", default_value = DEFAULT_MODEL_URL, value_name = "MODEL")]
  pub model: Url,

  /// 监听地址，支持 IPv4 与 IPv6
  #[arg(long, env = "WEILI_HOST", default_value = DEFAULT_HOST)]
  pub host: IpAddr,

  /// 监听端口
  #[arg(long, env = "WEILI_PORT", default_value_t = DEFAULT_PORT)]
  pub port: u16,

  /// 置信度阈值 (0.0 - 1.0)，严格大于该值的检测才会保留
  #[arg(long, default_value_t = CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// 标签字体文件，加载失败时使用内置点阵字体
  #[arg(long, env = "WEILI_FONT", default_value = DEFAULT_FONT_PATH, value_name = "FILE")]
  pub font: PathBuf,

  /// 标签字号
  #[arg(long, default_value_t = DEFAULT_FONT_SIZE)]
  pub font_size: f32,

  /// 上传大小上限（字节）
  #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, value_name = "BYTES")]
  pub max_upload_bytes: usize,
}

impl Args {
  pub fn addr(&self) -> SocketAddr {
    SocketAddr::new(self.host, self.port)
  }
}
