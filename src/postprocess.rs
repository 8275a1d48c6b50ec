// 该文件是 Weili （微粒） 项目的一部分。
// src/postprocess.rs - 检测结果后处理
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

use serde::Serialize;

use crate::model::RawDetections;

pub const NO_IMAGE_PROVIDED: &str = "No image provided";

/// 一个保留下来的检测目标
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  /// 从 1 开始的连续编号
  pub id: usize,
  pub confidence: f32,
  /// [left, top, right, bottom]，向零截断后的像素坐标
  pub bbox: [i32; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSummary {
  pub total_detections: usize,
  pub confidence_threshold: f32,
  pub detections: Vec<Detection>,
}

/// 单次检测调用的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetectionOutcome {
  Summary(ResultSummary),
  Missing { error: String },
}

impl DetectionOutcome {
  pub fn missing() -> Self {
    DetectionOutcome::Missing {
      error: NO_IMAGE_PROVIDED.to_string(),
    }
  }

  pub fn summary(&self) -> Option<&ResultSummary> {
    match self {
      DetectionOutcome::Summary(summary) => Some(summary),
      DetectionOutcome::Missing { .. } => None,
    }
  }
}

/// 保留置信度严格大于阈值的检测，保持模型输出的相对顺序并重新编号
pub fn filter_detections(raw: &RawDetections, threshold: f32) -> ResultSummary {
  let detections: Vec<Detection> = raw
    .boxes
    .iter()
    .zip(raw.scores.iter())
    .filter(|(_, score)| **score > threshold)
    .enumerate()
    .map(|(i, (bbox, score))| Detection {
      id: i + 1,
      confidence: *score,
      bbox: bbox.map(|v| v as i32),
    })
    .collect();

  ResultSummary {
    total_detections: detections.len(),
    confidence_threshold: threshold,
    detections,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn raw(items: &[([f32; 4], f32)]) -> RawDetections {
    RawDetections {
      boxes: items.iter().map(|(b, _)| *b).collect(),
      scores: items.iter().map(|(_, s)| *s).collect(),
      labels: vec![1; items.len()],
    }
  }

  #[test]
  fn only_scores_above_threshold_survive() {
    let summary = filter_detections(
      &raw(&[([0.0, 0.0, 5.0, 5.0], 0.4), ([1.0, 2.0, 3.0, 4.0], 0.6)]),
      0.5,
    );
    assert_eq!(summary.total_detections, 1);
    assert_eq!(
      summary.detections,
      vec![Detection {
        id: 1,
        confidence: 0.6,
        bbox: [1, 2, 3, 4]
      }]
    );
  }

  #[test]
  fn threshold_is_strict() {
    let summary = filter_detections(&raw(&[([0.0; 4], 0.5), ([0.0; 4], 0.500001)]), 0.5);
    assert_eq!(summary.total_detections, 1);
    assert!(summary.detections.iter().all(|d| d.confidence > 0.5));
  }

  #[test]
  fn ids_are_contiguous_in_model_order() {
    let summary = filter_detections(
      &raw(&[
        ([0.0; 4], 0.7),
        ([0.0; 4], 0.1),
        ([0.0; 4], 0.9),
        ([0.0; 4], 0.3),
        ([0.0; 4], 0.55),
      ]),
      0.5,
    );
    assert_eq!(summary.total_detections, summary.detections.len());
    let scores: Vec<f32> = summary.detections.iter().map(|d| d.confidence).collect();
    assert_eq!(scores, vec![0.7, 0.9, 0.55]);
    for (i, d) in summary.detections.iter().enumerate() {
      assert_eq!(d.id, i + 1);
    }
  }

  #[test]
  fn boxes_are_truncated_toward_zero() {
    let summary = filter_detections(&raw(&[([10.9, 20.2, 110.99, -0.7], 0.8)]), 0.5);
    assert_eq!(summary.detections[0].bbox, [10, 20, 110, 0]);
  }

  #[test]
  fn empty_input_gives_empty_summary() {
    let summary = filter_detections(&RawDetections::default(), 0.5);
    assert_eq!(summary.total_detections, 0);
    assert!(summary.detections.is_empty());
  }

  #[test]
  fn serializes_to_response_schema() {
    let summary = filter_detections(&raw(&[([10.0, 20.0, 110.0, 220.0], 0.73)]), 0.5);
    let value = serde_json::to_value(DetectionOutcome::Summary(summary)).unwrap();
    assert_eq!(
      value,
      json!({
        "total_detections": 1,
        "confidence_threshold": 0.5,
        "detections": [{ "id": 1, "confidence": 0.73f32, "bbox": [10, 20, 110, 220] }]
      })
    );

    let value = serde_json::to_value(DetectionOutcome::missing()).unwrap();
    assert_eq!(value, json!({ "error": "No image provided" }));
  }
}
