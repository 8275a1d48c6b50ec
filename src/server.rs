// 该文件是 Weili （微粒） 项目的一部分。
// src/server.rs - HTTP 界面与 predict 接口
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

use std::{io::Cursor, net::SocketAddr};

use axum::{
  Json, Router,
  body::Bytes,
  extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
  http::{Method, StatusCode, header::CONTENT_TYPE},
  response::{Html, IntoResponse, Response},
  routing::{get, post},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};
use tracing::{error, info};

use crate::{
  config::{DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PORT},
  input::{ImageInput, ImagePayload, InputError},
  model::{Model, RawDetections},
  postprocess::DetectionOutcome,
  task::{DetectError, DetectTask},
};

const INDEX_HTML: &str = include_str!("server/index.html");
const IMAGE_FIELD: &str = "image";

#[derive(Error, Debug)]
pub enum ServerError {
  #[error("请求被拒绝 ({0}): {1}")]
  Rejected(StatusCode, String),
  #[error("检测失败: {0}")]
  DetectError(#[from] DetectError),
  #[error("图像编码失败: {0}")]
  EncodeError(#[from] image::ImageError),
  #[error("任务执行失败: {0}")]
  JoinError(#[from] tokio::task::JoinError),
}

impl From<InputError> for ServerError {
  fn from(err: InputError) -> Self {
    ServerError::DetectError(DetectError::InputError(err))
  }
}

impl IntoResponse for ServerError {
  fn into_response(self) -> Response {
    error!("请求处理失败: {}", self);
    let (status, message) = match &self {
      ServerError::Rejected(status, msg) => (*status, msg.clone()),
      _ => (StatusCode::INTERNAL_SERVER_ERROR, "Error processing the image".to_string()),
    };
    (status, Json(serde_json::json!({ "error": message }))).into_response()
  }
}

/// 服务配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
  pub addr: SocketAddr,
  pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    ServerConfig {
      addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
      max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    }
  }
}

struct AppState<M> {
  task: DetectTask<M>,
}

impl<M> Clone for AppState<M> {
  fn clone(&self) -> Self {
    AppState {
      task: self.task.clone(),
    }
  }
}

/// `predict` 接口的 JSON 请求，`data[0]` 为图像或 null
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
  #[serde(default)]
  pub data: Vec<Option<ImagePayload>>,
}

impl PredictRequest {
  fn into_input(self) -> Result<Option<ImageInput>, InputError> {
    self
      .data
      .into_iter()
      .next()
      .flatten()
      .map(ImageInput::try_from)
      .transpose()
  }
}

/// `predict` 接口的响应：`data` 依次为标注图像（PNG data URL）与检测结果
#[derive(Debug, Serialize)]
pub struct PredictResponse {
  pub data: (Option<String>, DetectionOutcome),
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
  pub status: &'static str,
  pub device: String,
  pub confidence_threshold: f32,
  pub version: &'static str,
}

pub fn router<M>(task: DetectTask<M>, config: &ServerConfig) -> Router
where
  M: Model<Input = RgbImage, Output = RawDetections> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    .route("/", get(index))
    .route("/health", get(health::<M>))
    .route("/api/predict", post(predict::<M>))
    .with_state(AppState { task })
    .layer(DefaultBodyLimit::max(config.max_upload_bytes))
    .layer(TraceLayer::new_for_http())
    .layer(
      CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any),
    )
}

/// 绑定地址并运行服务，直到收到中断信号
pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
  let listener = tokio::net::TcpListener::bind(addr).await?;
  info!("服务已启动: http://{}", listener.local_addr()?);
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!("服务已停止");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!("无法监听中断信号: {}", e);
    std::future::pending::<()>().await;
  }
  info!("收到中断信号，准备退出...");
}

async fn index() -> Html<&'static str> {
  Html(INDEX_HTML)
}

async fn health<M>(State(state): State<AppState<M>>) -> Json<HealthResponse>
where
  M: Model<Input = RgbImage, Output = RawDetections> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  Json(HealthResponse {
    status: "ok",
    device: state.task.model().device().to_string(),
    confidence_threshold: state.task.threshold(),
    version: env!("CARGO_PKG_VERSION"),
  })
}

async fn predict<M>(
  State(state): State<AppState<M>>,
  request: Request,
) -> Result<Json<PredictResponse>, ServerError>
where
  M: Model<Input = RgbImage, Output = RawDetections> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let input = read_input(request).await?;

  let task = state.task.clone();
  let response = tokio::task::spawn_blocking(move || -> Result<PredictResponse, ServerError> {
    let (annotated, outcome) = task.detect_microplastics(input)?;
    let image = annotated.as_ref().map(png_data_url).transpose()?;
    Ok(PredictResponse {
      data: (image, outcome),
    })
  })
  .await??;

  Ok(Json(response))
}

/// 根据 Content-Type 读取上传的图像：multipart 表单、JSON 或原始字节
async fn read_input(request: Request) -> Result<Option<ImageInput>, ServerError> {
  let content_type = request
    .headers()
    .get(CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .unwrap_or_default()
    .to_ascii_lowercase();

  if content_type.starts_with("multipart/form-data") {
    let multipart = Multipart::from_request(request, &())
      .await
      .map_err(|e| ServerError::Rejected(e.status(), e.body_text()))?;
    read_multipart(multipart).await
  } else if content_type.starts_with("application/json") {
    let Json(body) = Json::<PredictRequest>::from_request(request, &())
      .await
      .map_err(|e| ServerError::Rejected(e.status(), e.body_text()))?;
    Ok(body.into_input()?)
  } else {
    let bytes = Bytes::from_request(request, &())
      .await
      .map_err(|e| ServerError::Rejected(e.status(), e.body_text()))?;
    Ok((!bytes.is_empty()).then(|| ImageInput::Encoded(bytes.to_vec())))
  }
}

async fn read_multipart(mut multipart: Multipart) -> Result<Option<ImageInput>, ServerError> {
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| ServerError::Rejected(e.status(), e.body_text()))?
  {
    if field.name() != Some(IMAGE_FIELD) {
      continue;
    }
    let data = field
      .bytes()
      .await
      .map_err(|e| ServerError::Rejected(e.status(), e.body_text()))?;
    return Ok((!data.is_empty()).then(|| ImageInput::Encoded(data.to_vec())));
  }
  Ok(None)
}

fn png_data_url(image: &RgbImage) -> Result<String, image::ImageError> {
  let mut png = Vec::new();
  image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
  Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}
