// 该文件是 Weili （微粒） 项目的一部分。
// src/task.rs - 检测任务
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

use std::{sync::Arc, time::Instant};

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  config::CONFIDENCE_THRESHOLD,
  input::{ImageInput, InputError},
  model::{Model, RawDetections},
  output::{Draw, Render},
  postprocess::{DetectionOutcome, filter_detections},
};

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("输入错误: {0}")]
  InputError(#[from] InputError),
  #[error("推理错误: {0}")]
  InferenceError(Box<dyn std::error::Error + Send + Sync>),
}

/// 一次检测调用的两个输出：标注后的图像与结果摘要
pub type Detected = (Option<RgbImage>, DetectionOutcome);

/// 绑定了模型、绘制器和阈值的检测任务，构建后不可变
pub struct DetectTask<M> {
  model: Arc<M>,
  draw: Draw,
  threshold: f32,
}

impl<M> Clone for DetectTask<M> {
  fn clone(&self) -> Self {
    DetectTask {
      model: Arc::clone(&self.model),
      draw: self.draw.clone(),
      threshold: self.threshold,
    }
  }
}

impl<M> DetectTask<M>
where
  M: Model<Input = RgbImage, Output = RawDetections>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn new(model: Arc<M>, draw: Draw) -> Self {
    DetectTask {
      model,
      draw,
      threshold: CONFIDENCE_THRESHOLD,
    }
  }

  pub fn with_threshold(mut self, threshold: f32) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  pub fn model(&self) -> &M {
    &self.model
  }

  /// 检测图像中的微塑料；没有输入时不调用模型，直接返回错误载荷
  pub fn detect_microplastics(&self, input: Option<ImageInput>) -> Result<Detected, DetectError> {
    let Some(input) = input else {
      info!("未提供图像");
      return Ok((None, DetectionOutcome::missing()));
    };

    let image = input.into_rgb()?;
    debug!("输入图像尺寸: {}x{}", image.width(), image.height());

    let now = Instant::now();
    let raw = self
      .model
      .infer(&image)
      .map_err(|e| DetectError::InferenceError(Box::new(e)))?;
    let infer_elapsed = now.elapsed();

    let summary = filter_detections(&raw, self.threshold);
    let annotated = self.draw.annotate(&image, &summary.detections);
    info!(
      "检测完成: 候选 {} 个，保留 {} 个，推理耗时 {:.2?}，总耗时 {:.2?}",
      raw.len(),
      summary.total_detections,
      infer_elapsed,
      now.elapsed()
    );

    Ok((Some(annotated), DetectionOutcome::Summary(summary)))
  }

  /// 取输入的第一张图像执行检测并交给输出渲染
  pub fn run_oneshot<I, O>(&self, mut input: I, output: &O) -> anyhow::Result<DetectionOutcome>
  where
    I: Iterator<Item = ImageInput>,
    O: Render<RgbImage, DetectionOutcome>,
    O::Error: std::error::Error + Send + Sync + 'static,
  {
    info!("开始任务...");
    let (annotated, outcome) = self.detect_microplastics(input.next())?;
    match annotated {
      Some(image) => output.render_result(&image, &outcome)?,
      None => anyhow::bail!("没有输入帧"),
    }
    info!("任务完成");
    Ok(outcome)
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::{
    config::DEFAULT_FONT_SIZE,
    model::{Device, ModelError},
    output::LabelFont,
    postprocess::Detection,
  };
  use image::Rgb;
  use std::sync::atomic::{AtomicUsize, Ordering};

  /// 返回固定输出的模型，记录调用次数
  pub struct FixedModel {
    pub raw: RawDetections,
    pub calls: AtomicUsize,
  }

  impl FixedModel {
    pub fn new(items: &[([f32; 4], f32)]) -> Self {
      FixedModel {
        raw: RawDetections {
          boxes: items.iter().map(|(b, _)| *b).collect(),
          scores: items.iter().map(|(_, s)| *s).collect(),
          labels: vec![1; items.len()],
        },
        calls: AtomicUsize::new(0),
      }
    }
  }

  impl Model for FixedModel {
    type Input = RgbImage;
    type Output = RawDetections;
    type Error = ModelError;

    fn infer(&self, _input: &RgbImage) -> Result<RawDetections, ModelError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Ok(self.raw.clone())
    }

    fn device(&self) -> Device {
      Device::Cpu
    }
  }

  pub fn draw() -> Draw {
    Draw::new(LabelFont::builtin(DEFAULT_FONT_SIZE).unwrap())
  }

  struct FailingModel;

  impl Model for FailingModel {
    type Input = RgbImage;
    type Output = RawDetections;
    type Error = ModelError;

    fn infer(&self, _input: &RgbImage) -> Result<RawDetections, ModelError> {
      Err(ModelError::InvalidOutput("boom".to_string()))
    }

    fn device(&self) -> Device {
      Device::Cpu
    }
  }

  fn task(model: FixedModel) -> DetectTask<FixedModel> {
    DetectTask::new(Arc::new(model), draw())
  }

  fn white(width: u32, height: u32) -> ImageInput {
    RgbImage::from_pixel(width, height, Rgb([255, 255, 255])).into()
  }

  #[test]
  fn missing_input_skips_model() {
    let task = task(FixedModel::new(&[([0.0; 4], 0.9)]));
    let (image, outcome) = task.detect_microplastics(None).unwrap();
    assert!(image.is_none());
    assert_eq!(outcome, DetectionOutcome::missing());
    assert_eq!(task.model().calls.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn zero_detections_returns_unchanged_copy() {
    let task = task(FixedModel::new(&[([1.0, 1.0, 5.0, 5.0], 0.2)]));
    let (image, outcome) = task.detect_microplastics(Some(white(64, 48))).unwrap();
    let image = image.unwrap();
    assert_eq!(image.dimensions(), (64, 48));
    assert!(image.pixels().all(|p| p.0 == [255, 255, 255]));

    let summary = outcome.summary().unwrap();
    assert_eq!(summary.total_detections, 0);
    assert!(summary.detections.is_empty());
  }

  #[test]
  fn single_detection_scenario() {
    let task = task(FixedModel::new(&[([10.0, 20.0, 110.0, 220.0], 0.73)]));
    let (image, outcome) = task.detect_microplastics(Some(white(200, 300))).unwrap();
    let summary = outcome.summary().unwrap();
    assert_eq!(
      summary.detections,
      vec![Detection {
        id: 1,
        confidence: 0.73,
        bbox: [10, 20, 110, 220]
      }]
    );
    let image = image.unwrap();
    assert_eq!(image.get_pixel(10, 150), &Rgb([0, 255, 0]));
    assert_eq!(image.get_pixel(110, 150), &Rgb([0, 255, 0]));
  }

  #[test]
  fn threshold_scenario_and_idempotence() {
    let task = task(FixedModel::new(&[
      ([0.0, 0.0, 10.0, 10.0], 0.4),
      ([5.0, 5.0, 20.0, 20.0], 0.6),
    ]));
    let (_, first) = task.detect_microplastics(Some(white(32, 32))).unwrap();
    let (_, second) = task.detect_microplastics(Some(white(32, 32))).unwrap();
    assert_eq!(first, second);

    let summary = first.summary().unwrap();
    assert_eq!(summary.confidence_threshold, 0.5);
    assert_eq!(summary.total_detections, 1);
    assert_eq!(summary.detections[0].id, 1);
    assert_eq!(summary.detections[0].confidence, 0.6);
  }

  #[test]
  fn custom_threshold_is_reported() {
    let task = task(FixedModel::new(&[([0.0; 4], 0.4)])).with_threshold(0.3);
    let (_, outcome) = task.detect_microplastics(Some(white(8, 8))).unwrap();
    let summary = outcome.summary().unwrap();
    assert_eq!(summary.confidence_threshold, 0.3);
    assert_eq!(summary.total_detections, 1);
  }

  #[test]
  fn model_failure_propagates() {
    let task = DetectTask::new(Arc::new(FailingModel), draw());
    let result = task.detect_microplastics(Some(white(8, 8)));
    assert!(matches!(result, Err(DetectError::InferenceError(_))));
  }

  #[test]
  fn undecodable_input_is_an_input_error() {
    let task = task(FixedModel::new(&[]));
    let result = task.detect_microplastics(Some(ImageInput::Encoded(vec![0, 1, 2])));
    assert!(matches!(result, Err(DetectError::InputError(_))));
  }

  #[test]
  fn oneshot_writes_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("result.png");
    let output = crate::output::SaveImageFileOutput::new(&path);

    let task = task(FixedModel::new(&[([1.0, 1.0, 6.0, 6.0], 0.9)]));
    let outcome = task
      .run_oneshot(std::iter::once(white(16, 16)), &output)
      .unwrap();
    assert_eq!(outcome.summary().unwrap().total_detections, 1);
    assert!(path.exists());
    assert!(output.record_path().exists());

    assert!(task.run_oneshot(std::iter::empty(), &output).is_err());
  }
}
