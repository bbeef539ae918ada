// 该文件是 Dubiao （读表） 项目的一部分。
// src/model/replay.rs - 回放预先导出的模型输出
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
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::ModelInput,
  model::{InferenceError, Model, RawTensorOutput, ShapeMismatchError},
};

const REPLAY_DEFAULT_ROWS: usize = 16;
const REPLAY_DEFAULT_ANCHORS: usize = 8400;

#[derive(Error, Debug)]
pub enum ReplayModelError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("参数 {0} 无效: {1}")]
  InvalidParam(String, String),
  #[error("文件长度 {0} 不是 4 字节的整数倍")]
  TruncatedFile(usize),
  #[error("张量形状错误: {0}")]
  Shape(#[from] ShapeMismatchError),
}

/// 从文件读取小端 f32 的 `[rows, anchors]` 原始输出，每次推理都返回同一张量。
///
/// URL 形如 `tensor:///path/to/output.bin?rows=16&anchors=8400`。
#[derive(Debug, Clone)]
pub struct ReplayModel {
  output: RawTensorOutput,
}

impl FromUrlWithScheme for ReplayModel {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for ReplayModel {
  type Error = ReplayModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ReplayModelError::SchemeMismatch(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut rows = REPLAY_DEFAULT_ROWS;
    let mut anchors = REPLAY_DEFAULT_ANCHORS;
    for (k, v) in url.query_pairs() {
      let slot = match k.as_ref() {
        "rows" => &mut rows,
        "anchors" => &mut anchors,
        _ => continue,
      };
      *slot = v
        .parse()
        .map_err(|_| ReplayModelError::InvalidParam(k.to_string(), v.to_string()))?;
    }

    info!("加载输出张量文件: {}", url.path());
    let bytes = std::fs::read(url.path())?;
    debug!(
      "张量文件大小: {:.2} MB",
      bytes.len() as f64 / (1024.0 * 1024.0)
    );

    let output = Self::parse(&bytes, rows, anchors)?;
    Ok(ReplayModel { output })
  }
}

impl ReplayModel {
  pub fn new(output: RawTensorOutput) -> Self {
    Self { output }
  }

  /// 解析小端 f32 字节流
  pub fn parse(bytes: &[u8], rows: usize, anchors: usize) -> Result<RawTensorOutput, ReplayModelError> {
    if bytes.len() % 4 != 0 {
      return Err(ReplayModelError::TruncatedFile(bytes.len()));
    }
    let data = bytes
      .chunks_exact(4)
      .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
      .collect();
    Ok(RawTensorOutput::new(rows, anchors, data)?)
  }
}

impl Model for ReplayModel {
  fn infer(&self, input: &ModelInput) -> Result<RawTensorOutput, InferenceError> {
    debug!("回放模型输出, 输入形状 {:?}", input.shape());
    Ok(self.output.clone())
  }
}
