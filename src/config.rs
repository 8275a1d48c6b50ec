// 该文件是 Weili （微粒） 项目的一部分。
// src/config.rs - 默认配置常量
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

/// 默认模型地址，路径相对于进程工作目录
pub const DEFAULT_MODEL_URL: &str = "onnx:fasterrcnn_microplastic_epoch48.onnx?device=auto";

/// 置信度阈值，严格大于该值的检测结果才会保留
pub const CONFIDENCE_THRESHOLD: f32 = 0.5;

/// 类别数量（背景 + 微塑料）
pub const NUM_CLASSES: usize = 2;

/// 类别编号到名称的映射
pub const CLASS_NAMES: [(i64, &str); 1] = [(1, "Microplastic")];

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 7860;

/// 标签字体
pub const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";
pub const DEFAULT_FONT_SIZE: f32 = 14.0;

/// 上传图像的大小上限
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// 根据类别编号查找类别名称
pub fn class_name(label: i64) -> Option<&'static str> {
  CLASS_NAMES
    .iter()
    .find(|(id, _)| *id == label)
    .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn foreground_class_has_a_name() {
    assert_eq!(class_name(1), Some("Microplastic"));
    assert_eq!(class_name(0), None);
    assert_eq!(CLASS_NAMES.len() + 1, NUM_CLASSES);
  }
}
