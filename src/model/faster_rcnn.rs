// 该文件是 Weili （微粒） 项目的一部分。
// src/model/faster_rcnn.rs - Faster R-CNN 检测模型
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

use std::{
  path::PathBuf,
  sync::{Mutex, MutexGuard, PoisonError},
  time::Instant,
};

use image::RgbImage;
#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;
use ort::{
  execution_providers::CPUExecutionProvider,
  session::{Session, builder::GraphOptimizationLevel},
  value::Tensor,
};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::{NUM_CLASSES, class_name},
  frame::to_nchw_tensor,
  model::{Device, Model, ModelError, RawDetections},
};

const FASTER_RCNN_NUM_INPUTS: usize = 1;
const FASTER_RCNN_NUM_OUTPUTS: usize = 3;
const OUTPUT_BOXES: &str = "boxes";
const OUTPUT_LABELS: &str = "labels";
const OUTPUT_SCORES: &str = "scores";

/// 输出张量名称
#[derive(Debug, Clone, PartialEq, Eq)]
struct OutputNames {
  boxes: String,
  labels: String,
  scores: String,
}

impl OutputNames {
  /// 优先按名称匹配，否则按 torchvision 导出顺序 (boxes, labels, scores) 匹配
  fn resolve(names: &[String]) -> Result<Self, ModelError> {
    let has = |name: &str| names.iter().any(|n| n == name);
    if has(OUTPUT_BOXES) && has(OUTPUT_LABELS) && has(OUTPUT_SCORES) {
      return Ok(OutputNames {
        boxes: OUTPUT_BOXES.to_string(),
        labels: OUTPUT_LABELS.to_string(),
        scores: OUTPUT_SCORES.to_string(),
      });
    }

    if names.len() == FASTER_RCNN_NUM_OUTPUTS {
      warn!("输出名称不匹配 {:?}，按位置解析", names);
      return Ok(OutputNames {
        boxes: names[0].clone(),
        labels: names[1].clone(),
        scores: names[2].clone(),
      });
    }

    error!("预期模型输出数量为 {}, 实际为 {}", FASTER_RCNN_NUM_OUTPUTS, names.len());
    Err(ModelError::ModelInvalid(format!(
      "预期模型输出数量为 {}, 实际为 {}",
      FASTER_RCNN_NUM_OUTPUTS,
      names.len()
    )))
  }
}

/// Faster R-CNN (ResNet-50 FPN) 检测模型，加载后不可变
pub struct FasterRcnn {
  session: Mutex<Session>,
  input_name: String,
  outputs: OutputNames,
  device: Device,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FasterRcnnBuilder {
  model_path: PathBuf,
  device: Device,
  threads: Option<usize>,
  num_classes: usize,
}

impl FromUrlWithScheme for FasterRcnnBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for FasterRcnnBuilder {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案，实际为 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let path = urlencoding::decode(url.path())
      .map_err(|e| ModelError::ModelPathError(format!("模型路径解码失败: {}", e)))?;
    if path.is_empty() {
      return Err(ModelError::ModelPathError("模型路径为空".to_string()));
    }

    let mut builder = FasterRcnnBuilder::new(path.as_ref());
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "device" => builder.device = value.parse()?,
        "threads" => {
          let threads = value
            .parse::<usize>()
            .map_err(|e| ModelError::ModelPathError(format!("线程数无效 '{}': {}", value, e)))?;
          builder.threads = Some(threads);
        }
        other => warn!("忽略未知的模型参数: {}={}", other, value),
      }
    }

    Ok(builder)
  }
}

impl FasterRcnnBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    FasterRcnnBuilder {
      model_path: model_path.into(),
      device: Device::Auto,
      threads: None,
      num_classes: NUM_CLASSES,
    }
  }

  pub fn device(mut self, device: Device) -> Self {
    self.device = device;
    self
  }

  pub fn threads(mut self, threads: usize) -> Self {
    self.threads = Some(threads);
    self
  }

  pub fn build(self) -> Result<FasterRcnn, ModelError> {
    info!("加载模型文件: {}", self.model_path.display());
    let metadata = std::fs::metadata(&self.model_path)?;
    debug!("模型文件大小: {:.2} MB", metadata.len() as f64 / (1024.0 * 1024.0));

    let device = self.device.resolve();
    info!("创建 ONNX Runtime 推理会话，设备: {}，类别数: {}", device, self.num_classes);

    let mut builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
    if let Some(threads) = self.threads {
      builder = builder.with_intra_threads(threads)?;
    }
    let builder = match device {
      #[cfg(feature = "cuda")]
      Device::Cuda => builder.with_execution_providers([
        CUDAExecutionProvider::default().build(),
        CPUExecutionProvider::default().build(),
      ])?,
      _ => builder.with_execution_providers([CPUExecutionProvider::default().build()])?,
    };
    let session = builder.commit_from_file(&self.model_path)?;

    let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
    let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
    debug!("模型输入: {:?}", input_names);
    debug!("模型输出: {:?}", output_names);

    if input_names.len() != FASTER_RCNN_NUM_INPUTS {
      error!("预期模型输入数量为 {}, 实际为 {}", FASTER_RCNN_NUM_INPUTS, input_names.len());
      return Err(ModelError::ModelInvalid(format!(
        "预期模型输入数量为 {}, 实际为 {}",
        FASTER_RCNN_NUM_INPUTS,
        input_names.len()
      )));
    }

    let outputs = OutputNames::resolve(&output_names)?;
    info!("模型加载完成");

    Ok(FasterRcnn {
      session: Mutex::new(session),
      input_name: input_names[0].clone(),
      outputs,
      device,
    })
  }
}

/// 获取会话锁；锁中毒时仍返回会话，中断的推理不保留会话状态
fn lock_session<T>(session: &Mutex<T>) -> MutexGuard<'_, T> {
  session.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Model for FasterRcnn {
  type Input = RgbImage;
  type Output = RawDetections;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let tensor = to_nchw_tensor(input);
    debug!("输入张量形状: {:?}", tensor.shape());
    let value = Tensor::from_array(tensor)?;

    let mut session = lock_session(&self.session);

    let now = Instant::now();
    let outputs = session.run(ort::inputs![self.input_name.as_str() => value])?;
    debug!("前向推理耗时: {:.2?}", now.elapsed());

    let missing = |name: &str| ModelError::InvalidOutput(format!("缺少输出 {}", name));
    let boxes = outputs
      .get(self.outputs.boxes.as_str())
      .ok_or_else(|| missing(&self.outputs.boxes))?;
    let scores = outputs
      .get(self.outputs.scores.as_str())
      .ok_or_else(|| missing(&self.outputs.scores))?;
    let labels = outputs
      .get(self.outputs.labels.as_str())
      .ok_or_else(|| missing(&self.outputs.labels))?;

    let (_, boxes) = boxes.try_extract_tensor::<f32>()?;
    let (_, scores) = scores.try_extract_tensor::<f32>()?;
    let (_, labels) = labels.try_extract_tensor::<i64>()?;

    let raw = RawDetections::from_flat(boxes, scores, labels)?;
    debug!("候选检测数量: {}", raw.len());
    let unknown = raw.labels.iter().filter(|l| class_name(**l).is_none()).count();
    if unknown > 0 {
      debug!("{} 个候选的类别编号未知", unknown);
    }
    Ok(raw)
  }

  fn device(&self) -> Device {
    self.device
  }
}
