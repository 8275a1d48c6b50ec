// 该文件是 Weili （微粒） 项目的一部分。
// src/model/device.rs - 计算设备选择
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

use std::{fmt, str::FromStr};

use tracing::{info, warn};

use super::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
  /// 有加速器时使用加速器，否则使用 CPU
  #[default]
  Auto,
  Cpu,
  Cuda,
}

impl Device {
  /// 将 `Auto` 解析为具体设备；请求的加速器不可用时回退到 CPU
  pub fn resolve(self) -> Device {
    match self {
      Device::Cpu => Device::Cpu,
      Device::Auto => {
        if cuda_available() {
          Device::Cuda
        } else {
          info!("未检测到可用的 CUDA，使用 CPU");
          Device::Cpu
        }
      }
      Device::Cuda => {
        if cuda_available() {
          Device::Cuda
        } else {
          warn!("请求 CUDA 但不可用，回退到 CPU");
          Device::Cpu
        }
      }
    }
  }
}

#[cfg(feature = "cuda")]
fn cuda_available() -> bool {
  use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};

  match CUDAExecutionProvider::default().is_available() {
    Ok(available) => available,
    Err(e) => {
      warn!("查询 CUDA 可用性失败: {}", e);
      false
    }
  }
}

#[cfg(not(feature = "cuda"))]
fn cuda_available() -> bool {
  false
}

impl fmt::Display for Device {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Device::Auto => write!(f, "auto"),
      Device::Cpu => write!(f, "cpu"),
      Device::Cuda => write!(f, "cuda"),
    }
  }
}

impl FromStr for Device {
  type Err = ModelError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "auto" => Ok(Device::Auto),
      "cpu" => Ok(Device::Cpu),
      "cuda" | "gpu" => Ok(Device::Cuda),
      other => Err(ModelError::ModelPathError(format!(
        "未知设备 '{}'，可选: auto, cpu, cuda",
        other
      ))),
    }
  }
}
