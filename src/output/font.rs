// 该文件是 Weili （微粒） 项目的一部分。
// src/output/font.rs - 标签字体解析
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

use std::path::Path;

use ab_glyph::{FontArc, InvalidFont, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use tracing::{info, warn};

/// 内置字体，磁盘字体不可用时使用
pub(crate) static BUILTIN_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// 标签字体：从磁盘加载的 TrueType 字体，或编译进程序的内置字体
#[derive(Clone)]
pub enum LabelFont {
  Disk { font: FontArc, scale: PxScale },
  Builtin { font: FontArc, scale: PxScale },
}

impl std::fmt::Debug for LabelFont {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      LabelFont::Disk { scale, .. } => write!(f, "LabelFont::Disk({}px)", scale.y),
      LabelFont::Builtin { scale, .. } => write!(f, "LabelFont::Builtin({}px)", scale.y),
    }
  }
}

impl LabelFont {
  /// 内置字体，仅在嵌入的字体数据损坏时失败
  pub fn builtin(size: f32) -> Result<LabelFont, InvalidFont> {
    Ok(LabelFont::Builtin {
      font: FontArc::try_from_slice(BUILTIN_FONT)?,
      scale: PxScale::from(size),
    })
  }

  /// 加载字体文件，文件缺失或无法解析时回退到内置字体
  pub fn resolve(path: Option<&Path>, size: f32) -> Result<LabelFont, InvalidFont> {
    let Some(path) = path else {
      info!("未指定字体文件，使用内置字体");
      return LabelFont::builtin(size);
    };

    let data = match std::fs::read(path) {
      Ok(data) => data,
      Err(e) => {
        warn!("无法读取字体文件 {}: {}，使用内置字体", path.display(), e);
        return LabelFont::builtin(size);
      }
    };

    match FontArc::try_from_vec(data) {
      Ok(font) => {
        info!("已加载字体文件: {}", path.display());
        Ok(LabelFont::Disk {
          font,
          scale: PxScale::from(size),
        })
      }
      Err(e) => {
        warn!("无法解析字体文件 {}: {}，使用内置字体", path.display(), e);
        LabelFont::builtin(size)
      }
    }
  }

  pub fn is_builtin(&self) -> bool {
    matches!(self, LabelFont::Builtin { .. })
  }

  fn parts(&self) -> (&FontArc, PxScale) {
    match self {
      LabelFont::Disk { font, scale } | LabelFont::Builtin { font, scale } => (font, *scale),
    }
  }

  /// 文本的像素尺寸 (宽, 高)
  pub fn text_size(&self, text: &str) -> (u32, u32) {
    let (font, scale) = self.parts();
    text_size(scale, font, text)
  }

  pub fn draw_text(&self, image: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, text: &str) {
    let (font, scale) = self.parts();
    draw_text_mut(image, color, x, y, scale, font, text);
  }
}
