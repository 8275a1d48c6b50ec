// 该文件是 Weili （微粒） 项目的一部分。
// src/model.rs - 模型
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

use thiserror::Error;

/// 检测模型：对单张图像执行一次前向推理
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;

  /// 模型绑定的计算设备
  fn device(&self) -> Device;
}

/// 单次前向推理的原始输出，三个序列等长且按模型输出顺序排列
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDetections {
  pub boxes: Vec<[f32; 4]>, // [left, top, right, bottom]，像素坐标
  pub scores: Vec<f32>,
  pub labels: Vec<i64>,
}

impl RawDetections {
  /// 由展平的输出张量构建，长度不一致时返回错误
  pub fn from_flat(boxes: &[f32], scores: &[f32], labels: &[i64]) -> Result<Self, ModelError> {
    let n = scores.len();
    if labels.len() != n || boxes.len() != 4 * n {
      return Err(ModelError::InvalidOutput(format!(
        "输出长度不一致: boxes={}, scores={}, labels={}",
        boxes.len(),
        scores.len(),
        labels.len()
      )));
    }

    let boxes = boxes
      .chunks_exact(4)
      .map(|b| [b[0], b[1], b[2], b[3]])
      .collect();

    Ok(RawDetections {
      boxes,
      scores: scores.to_vec(),
      labels: labels.to_vec(),
    })
  }

  pub fn len(&self) -> usize {
    self.scores.len()
  }

  pub fn is_empty(&self) -> bool {
    self.scores.is_empty()
  }
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型输出无效: {0}")]
  InvalidOutput(String),
}

mod device;
mod faster_rcnn;
pub use self::device::Device;
pub use self::faster_rcnn::{FasterRcnn, FasterRcnnBuilder};
