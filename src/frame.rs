// 该文件是 Weili （微粒） 项目的一部分。
// src/frame.rs - NCHW 张量转换
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

use image::RgbImage;
use ndarray::Array4;

pub const RGB_CHANNELS: usize = 3;

/// 将 RGB 图像转换为形状为 (1, 3, H, W) 的单精度张量，数值缩放到 [0, 1]
pub fn to_nchw_tensor(image: &RgbImage) -> Array4<f32> {
  let (width, height) = image.dimensions();
  let shape = (1, RGB_CHANNELS, height as usize, width as usize);
  let raw = image.as_raw();
  let stride = width as usize * RGB_CHANNELS;

  Array4::from_shape_fn(shape, |(_, c, h, w)| {
    raw[h * stride + w * RGB_CHANNELS + c] as f32 / 255.0
  })
}
