// 该文件是 Weili （微粒） 项目的一部分。
// src/input.rs - 图像输入
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

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use serde::Deserialize;
use thiserror::Error;

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("图像解码错误: {0}")]
  DecodeError(#[from] image::ImageError),
  #[error("Base64 解码错误: {0}")]
  Base64Error(#[from] base64::DecodeError),
  #[error("像素数据无效: {0}")]
  InvalidPixels(String),
  #[error("上传数据无效: {0}")]
  InvalidUpload(String),
}

/// 一次请求携带的图像，来源可以是编码文件、像素网格或已解码图像
#[derive(Debug, Clone)]
pub enum ImageInput {
  Encoded(Vec<u8>),
  Pixels {
    width: u32,
    height: u32,
    data: Vec<u8>,
  },
  Decoded(DynamicImage),
}

impl ImageInput {
  /// 统一转换为三通道 RGB 图像
  pub fn into_rgb(self) -> Result<RgbImage, InputError> {
    match self {
      ImageInput::Encoded(bytes) => Ok(image::load_from_memory(&bytes)?.to_rgb8()),
      ImageInput::Pixels {
        width,
        height,
        data,
      } => pixels_to_rgb(width, height, data),
      ImageInput::Decoded(image) => Ok(image.to_rgb8()),
    }
  }
}

impl From<RgbImage> for ImageInput {
  fn from(image: RgbImage) -> Self {
    ImageInput::Decoded(DynamicImage::ImageRgb8(image))
  }
}

/// 交错排列的像素数据，按长度推断通道数（1、3 或 4）
fn pixels_to_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<RgbImage, InputError> {
  let area = width as usize * height as usize;
  if area == 0 {
    return Err(InputError::InvalidPixels(format!("图像尺寸无效: {}x{}", width, height)));
  }

  let length = data.len();
  let mismatch = || {
    InputError::InvalidPixels(format!("{}x{} 图像的数据长度 {} 无效", width, height, length))
  };
  let image = match length / area {
    1 if length == area => GrayImage::from_raw(width, height, data).map(DynamicImage::from),
    3 if length == area * 3 => RgbImage::from_raw(width, height, data).map(DynamicImage::from),
    4 if length == area * 4 => RgbaImage::from_raw(width, height, data).map(DynamicImage::from),
    _ => None,
  }
  .ok_or_else(mismatch)?;

  Ok(image.to_rgb8())
}

/// JSON 请求中的图像：data URL / base64 字符串，或像素网格
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ImagePayload {
  Encoded(String),
  Pixels {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
  },
}

impl TryFrom<ImagePayload> for ImageInput {
  type Error = InputError;

  fn try_from(payload: ImagePayload) -> Result<Self, Self::Error> {
    match payload {
      ImagePayload::Encoded(text) => {
        let encoded = match text.strip_prefix("data:") {
          Some(rest) => {
            rest
              .split_once(',')
              .ok_or_else(|| InputError::InvalidUpload("data URL 缺少数据部分".to_string()))?
              .1
          }
          None => text.as_str(),
        };
        Ok(ImageInput::Encoded(STANDARD.decode(encoded.trim())?))
      }
      ImagePayload::Pixels {
        width,
        height,
        pixels,
      } => Ok(ImageInput::Pixels {
        width,
        height,
        data: pixels,
      }),
    }
  }
}
