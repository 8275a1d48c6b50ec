// 该文件是 Weili （微粒） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use image::RgbImage;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, output::Render, postprocess::DetectionOutcome};

/// 保存标注后的图像，并在同目录写入同名 `.json` 检测结果
pub struct SaveImageFileOutput {
  path: PathBuf,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let path = urlencoding::decode(uri.path())
      .map_err(|e| SaveImageFileError::SchemeMismatch(format!("路径解码失败: {}", e)))?;
    Ok(SaveImageFileOutput::new(path.as_ref()))
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl AsRef<Path>) -> Self {
    SaveImageFileOutput {
      path: path.as_ref().to_path_buf(),
    }
  }

  pub fn record_path(&self) -> PathBuf {
    self.path.with_extension("json")
  }

  fn save_image(&self, image: &RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;
    info!("保存图像到文件: {}", self.path.display());
    Ok(())
  }

  fn save_record(&self, outcome: &DetectionOutcome) -> Result<(), SaveImageFileError> {
    let record = self.record_path();
    std::fs::write(&record, serde_json::to_string_pretty(outcome)?)?;
    info!("保存检测结果到文件: {}", record.display());
    Ok(())
  }
}

impl Render<RgbImage, DetectionOutcome> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &RgbImage, result: &DetectionOutcome) -> Result<(), Self::Error> {
    self.save_image(frame)?;
    self.save_record(result)
  }
}
