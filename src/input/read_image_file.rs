// 该文件是 Weili （微粒） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::ImageReader;
use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, input::ImageInput};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch: {0}")]
  SchemaMismatch(String),
  #[error("Invalid path: {0}")]
  InvalidPath(String),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 从磁盘读取的单张图像，迭代一次后耗尽
pub struct ImageFileInput {
  path: PathBuf,
  image: Option<ImageInput>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!("URI scheme mismatch: expected '{}', found '{}'", Self::SCHEME, url.scheme());
      return Err(ImageFileInputError::SchemaMismatch(url.scheme().to_string()));
    }

    let path = urlencoding::decode(url.path())
      .map_err(|e| ImageFileInputError::InvalidPath(e.to_string()))?;
    Self::open(path.as_ref())
  }
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref().to_path_buf();
    let image = ImageReader::open(&path)?.with_guessed_format()?.decode()?;

    Ok(ImageFileInput {
      path,
      image: Some(ImageInput::Decoded(image)),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Iterator for ImageFileInput {
  type Item = ImageInput;

  fn next(&mut self) -> Option<Self::Item> {
    self.image.take()
  }
}
