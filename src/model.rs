// 该文件是 Dubiao （读表） 项目的一部分。
// src/model.rs - 模型接口、类别与检测结果
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

use crate::{
  frame::ModelInput,
  geometry::{BoundingBox, CoordSpace},
};

mod catalog;
mod config;
mod decode;
mod nms;
mod reading;
mod replay;
mod tensor;

pub use self::catalog::{ModelCatalog, ModelCatalogError, ModelInfo};
pub use self::config::{ConfigError, DetectionConfig, DetectionConfigBuilder};
pub use self::decode::{decode, decode_scaled};
pub use self::nms::suppress;
pub use self::reading::assemble_reading;
pub use self::replay::{ReplayModel, ReplayModelError};
pub use self::tensor::{RawTensorOutput, ShapeMismatchError};

/// 推理运行时错误
#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("推理不可用: {0}")]
  Unavailable(String),
  #[error("推理失败: {0}")]
  Runtime(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl InferenceError {
  pub fn runtime<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    InferenceError::Runtime(Box::new(err))
  }
}

/// 外部推理运行时。输入 `[1, 3, S, S]`，输出 `[4 + C, A]`
pub trait Model {
  fn infer(&self, input: &ModelInput) -> Result<RawTensorOutput, InferenceError>;
}

/// 以闭包形式注入的推理函数
pub struct FnModel<F>(pub F);

impl<F> FnModel<F>
where
  F: Fn(&ModelInput) -> Result<RawTensorOutput, InferenceError>,
{
  pub fn new(f: F) -> Self {
    FnModel(f)
  }
}

impl<F> Model for FnModel<F>
where
  F: Fn(&ModelInput) -> Result<RawTensorOutput, InferenceError>,
{
  fn infer(&self, input: &ModelInput) -> Result<RawTensorOutput, InferenceError> {
    (self.0)(input)
  }
}

/// `None` 表示尚未加载模型
impl<M: Model> Model for Option<M> {
  fn infer(&self, input: &ModelInput) -> Result<RawTensorOutput, InferenceError> {
    match self {
      Some(model) => model.infer(input),
      None => Err(InferenceError::Unavailable("未加载模型".to_string())),
    }
  }
}

impl<M: Model + ?Sized> Model for Box<M> {
  fn infer(&self, input: &ModelInput) -> Result<RawTensorOutput, InferenceError> {
    (**self).infer(input)
  }
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> &'static str;
  fn to_label_id(&self) -> usize;
  fn from_label_id(id: usize) -> Option<Self>;
}

/// 读表模型的 12 个类别，顺序与模型输出一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeterLabel {
  Dot,
  Digit(u8),
  Kwh,
}

impl MeterLabel {
  pub const COUNT: usize = 12;

  pub fn all() -> impl Iterator<Item = MeterLabel> {
    (0..Self::COUNT).filter_map(MeterLabel::from_label_id)
  }

  /// 是否参与读数拼接
  pub fn is_reading(&self) -> bool {
    !matches!(self, MeterLabel::Kwh)
  }
}

const DIGIT_LABELS: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];

impl WithLabel for MeterLabel {
  fn to_label_str(&self) -> &'static str {
    match self {
      MeterLabel::Dot => ".",
      MeterLabel::Digit(d) => DIGIT_LABELS[*d as usize % 10],
      MeterLabel::Kwh => "kwh",
    }
  }

  fn to_label_id(&self) -> usize {
    match self {
      MeterLabel::Dot => 0,
      MeterLabel::Digit(d) => 1 + *d as usize,
      MeterLabel::Kwh => 11,
    }
  }

  fn from_label_id(id: usize) -> Option<Self> {
    match id {
      0 => Some(MeterLabel::Dot),
      1..=10 => Some(MeterLabel::Digit((id - 1) as u8)),
      11 => Some(MeterLabel::Kwh),
      _ => None,
    }
  }
}

/// 单个检测结果，创建后不再修改
#[derive(Debug, Clone, PartialEq)]
pub struct Detection<S> {
  pub class_id: usize,
  pub confidence: f32,
  pub bbox: BoundingBox<S>,
}

impl<S: CoordSpace> Detection<S> {
  pub fn new(class_id: usize, confidence: f32, bbox: BoundingBox<S>) -> Self {
    Self {
      class_id,
      confidence,
      bbox,
    }
  }

  /// 同一检测换到另一个坐标空间
  pub fn with_bbox<T: CoordSpace>(&self, bbox: BoundingBox<T>) -> Detection<T> {
    Detection {
      class_id: self.class_id,
      confidence: self.confidence,
      bbox,
    }
  }
}

/// 一次流水线调用的结果
#[derive(Debug, Clone, PartialEq)]
pub struct DetectResult<S> {
  pub items: Box<[Detection<S>]>,
  pub reading: String,
}

impl<S> DetectResult<S> {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}
