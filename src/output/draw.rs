// 该文件是 Weili （微粒） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut},
  rect::Rect,
};

use crate::{config::CLASS_NAMES, output::font::LabelFont, postprocess::Detection};

const BOX_COLOR: [u8; 3] = [0x00, 0xFF, 0x00]; // #00FF00
const TEXT_COLOR: [u8; 3] = [0x00, 0x00, 0x00];
const BOX_OUTLINE_WIDTH: i32 = 3;
const LABEL_PADDING: i32 = 2;

/// 标签文本，置信度保留两位小数
pub fn label_text(confidence: f32) -> String {
  let (_, name) = CLASS_NAMES[0];
  format!("{}: {:.2}", name, confidence)
}

/// 在图像副本上绘制检测框与置信度标签
#[derive(Debug, Clone)]
pub struct Draw {
  font: LabelFont,
  box_color: Rgb<u8>,
  text_color: Rgb<u8>,
  outline_width: i32,
  label_padding: i32,
}

impl Draw {
  pub fn new(font: LabelFont) -> Self {
    Draw {
      font,
      box_color: Rgb(BOX_COLOR),
      text_color: Rgb(TEXT_COLOR),
      outline_width: BOX_OUTLINE_WIDTH,
      label_padding: LABEL_PADDING,
    }
  }

  pub fn font(&self) -> &LabelFont {
    &self.font
  }

  /// 返回绘制了全部检测结果的新图像，原图不变
  pub fn annotate(&self, image: &RgbImage, detections: &[Detection]) -> RgbImage {
    let mut annotated = image.clone();
    for detection in detections {
      self.draw_bbox_with_label(&mut annotated, detection);
    }
    annotated
  }

  fn draw_bbox_with_label(&self, image: &mut RgbImage, detection: &Detection) {
    let [x_min, y_min, x_max, y_max] = detection.bbox;

    // 边框向内加粗
    for t in 0..self.outline_width {
      let (left, top, right, bottom) = (x_min + t, y_min + t, x_max - t, y_max - t);
      if left > right || top > bottom {
        break;
      }
      let rect = Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
      draw_hollow_rect_mut(image, rect, self.box_color);
    }

    let label = label_text(detection.confidence);
    let (text_width, text_height) = self.font.text_size(&label);
    let pad = self.label_padding;
    let background = Rect::at(x_min - pad, y_min - pad).of_size(
      (text_width as i32 + 2 * pad + 1) as u32,
      (text_height as i32 + 2 * pad + 1) as u32,
    );
    draw_filled_rect_mut(image, background, self.box_color);
    self
      .font
      .draw_text(image, self.text_color, x_min, y_min, &label);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::DEFAULT_FONT_SIZE;

  fn draw() -> Draw {
    Draw::new(LabelFont::builtin(DEFAULT_FONT_SIZE).unwrap())
  }

  fn detection(confidence: f32, bbox: [i32; 4]) -> Detection {
    Detection {
      id: 1,
      confidence,
      bbox,
    }
  }

  #[test]
  fn label_has_two_decimals() {
    assert_eq!(label_text(0.73), "Microplastic: 0.73");
    assert_eq!(label_text(0.5049), "Microplastic: 0.50");
    assert_eq!(label_text(1.0), "Microplastic: 1.00");
  }

  #[test]
  fn no_detections_leaves_copy_unchanged() {
    let image = RgbImage::from_pixel(40, 30, Rgb([12, 34, 56]));
    let annotated = draw().annotate(&image, &[]);
    assert_eq!(annotated, image);
  }

  #[test]
  fn box_is_three_pixels_wide_and_green() {
    let image = RgbImage::from_pixel(200, 300, Rgb([255, 255, 255]));
    let annotated = draw().annotate(&image, &[detection(0.73, [10, 20, 110, 220])]);

    let green = Rgb(BOX_COLOR);
    // 左边与下边远离标签的位置
    for x in 10..13 {
      assert_eq!(annotated.get_pixel(x, 150), &green);
    }
    assert_eq!(annotated.get_pixel(13, 150), &Rgb([255, 255, 255]));
    assert_eq!(annotated.get_pixel(110, 150), &green);
    assert_eq!(annotated.get_pixel(108, 150), &green);
    assert_eq!(annotated.get_pixel(107, 150), &Rgb([255, 255, 255]));
    assert_eq!(annotated.get_pixel(60, 220), &green);
    assert_eq!(annotated.get_pixel(60, 216), &Rgb([255, 255, 255]));
    assert_eq!(annotated.get_pixel(111, 150), &Rgb([255, 255, 255]));

    // 原图不变
    assert_eq!(image.get_pixel(10, 150), &Rgb([255, 255, 255]));
    assert_eq!(annotated.dimensions(), image.dimensions());
  }

  #[test]
  fn label_background_is_padded() {
    let image = RgbImage::from_pixel(300, 300, Rgb([255, 255, 255]));
    let draw = draw();
    let annotated = draw.annotate(&image, &[detection(0.73, [50, 60, 250, 250])]);

    let (w, h) = draw.font().text_size(&label_text(0.73));
    let green = Rgb(BOX_COLOR);
    // 背景左上角向外扩展 2 像素
    assert_eq!(annotated.get_pixel(48, 58), &green);
    assert_eq!(annotated.get_pixel(47, 58), &Rgb([255, 255, 255]));
    // 背景右下角
    let (right, bottom) = (50 + w + 2, 60 + h + 2);
    assert_eq!(annotated.get_pixel(right, bottom), &green);
    assert_eq!(annotated.get_pixel(right + 1, 58), &Rgb([255, 255, 255]));

    // 文本为深色
    let has_text = (50..50 + w).any(|x| (60..60 + h).any(|y| annotated.get_pixel(x, y)[1] < 128));
    assert!(has_text);
  }

  #[test]
  fn disk_font_text_stays_inside_background() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("label.ttf");
    std::fs::write(&path, crate::output::font::BUILTIN_FONT).unwrap();
    let font = LabelFont::resolve(Some(&path), DEFAULT_FONT_SIZE).unwrap();
    assert!(!font.is_builtin());

    let draw = Draw::new(font);
    let white = Rgb([255, 255, 255]);
    let green = Rgb(BOX_COLOR);
    let image = RgbImage::from_pixel(300, 300, white);
    let annotated = draw.annotate(&image, &[detection(0.73, [50, 60, 250, 250])]);

    let (w, h) = draw.font().text_size(&label_text(0.73));
    let (left, top, right, bottom) = (48, 58, 50 + w + 2, 60 + h + 2);
    let mut ink = 0;
    for (x, y, pixel) in annotated.enumerate_pixels() {
      if *pixel == white || *pixel == green {
        continue;
      }
      ink += 1;
      assert!(
        (left..=right).contains(&x) && (top..=bottom).contains(&y),
        "文本像素 ({}, {}) 超出背景",
        x,
        y
      );
    }
    assert!(ink > 0);
  }

  #[test]
  fn boxes_beyond_image_are_clipped() {
    let image = RgbImage::new(20, 20);
    let annotated = draw().annotate(&image, &[detection(0.9, [-5, -5, 50, 50])]);
    assert_eq!(annotated.dimensions(), (20, 20));
  }

  #[test]
  fn degenerate_boxes_do_not_panic() {
    let image = RgbImage::new(20, 20);
    let draw = draw();
    draw.annotate(&image, &[detection(0.9, [5, 5, 5, 5])]);
    draw.annotate(&image, &[detection(0.9, [10, 10, 2, 2])]);
  }
}
