// 该文件是 Dubiao （读表） 项目的一部分。
// src/model/config.rs - 检测配置
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

use std::{ops::RangeInclusive, path::Path};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::model::{MeterLabel, WithLabel};

const METER_INPUT_SIZE: u32 = 640;
const METER_NUM_ANCHORS: usize = 8400;
const METER_SCORE_THRESH: f32 = 0.5;
const METER_IOU_THRESH: f32 = 0.45;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("类别名数量 {names} 与类别数 {num_classes} 不一致")]
  ClassNamesMismatch { names: usize, num_classes: usize },
  #[error("读数类别范围 {start}..={end} 超出类别数 {num_classes}")]
  ReadingRangeOutOfBounds {
    start: usize,
    end: usize,
    num_classes: usize,
  },
  #[error("{name} 必须在 [0, 1] 之内, 实际为 {value}")]
  ThresholdOutOfRange { name: &'static str, value: f32 },
  #[error("{0} 不能为 0")]
  Zero(&'static str),
  #[error("配置文件读取错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("配置文件解析错误: {0}")]
  Parse(#[from] serde_json::Error),
}

/// 检测配置，构造后只读
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
  input_size: u32,
  num_classes: usize,
  num_anchors: usize,
  score_threshold: f32,
  iou_threshold: f32,
  class_names: Box<[String]>,
  reading_class_range: RangeInclusive<usize>,
}

impl DetectionConfig {
  pub fn builder() -> DetectionConfigBuilder {
    DetectionConfigBuilder::default()
  }

  /// 12 类读表模型的默认配置
  pub fn meter_default() -> Self {
    Self {
      input_size: METER_INPUT_SIZE,
      num_classes: MeterLabel::COUNT,
      num_anchors: METER_NUM_ANCHORS,
      score_threshold: METER_SCORE_THRESH,
      iou_threshold: METER_IOU_THRESH,
      class_names: MeterLabel::all()
        .map(|l| l.to_label_str().to_string())
        .collect(),
      reading_class_range: MeterLabel::Dot.to_label_id()..=MeterLabel::Digit(9).to_label_id(),
    }
  }

  /// 从 JSON 文本读取，缺省字段取读表模型默认值
  pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
    let file: ConfigFile = serde_json::from_str(text)?;
    file.into_builder().build()
  }

  pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    debug!("读取检测配置: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Self::from_json_str(&text)
  }

  pub fn input_size(&self) -> u32 {
    self.input_size
  }

  pub fn num_classes(&self) -> usize {
    self.num_classes
  }

  pub fn num_anchors(&self) -> usize {
    self.num_anchors
  }

  pub fn score_threshold(&self) -> f32 {
    self.score_threshold
  }

  pub fn iou_threshold(&self) -> f32 {
    self.iou_threshold
  }

  pub fn class_names(&self) -> &[String] {
    &self.class_names
  }

  pub fn reading_class_range(&self) -> &RangeInclusive<usize> {
    &self.reading_class_range
  }

  /// 原始输出张量期望的形状 `(4 + C, A)`
  pub fn output_shape(&self) -> (usize, usize) {
    (4 + self.num_classes, self.num_anchors)
  }

  pub fn class_name(&self, class_id: usize) -> Option<&str> {
    self.class_names.get(class_id).map(String::as_str)
  }

  /// 在当前配置基础上修改后重新校验
  pub fn to_builder(&self) -> DetectionConfigBuilder {
    DetectionConfigBuilder {
      input_size: self.input_size,
      num_classes: None,
      num_anchors: self.num_anchors,
      score_threshold: self.score_threshold,
      iou_threshold: self.iou_threshold,
      class_names: self.class_names.to_vec(),
      reading_class_range: self.reading_class_range.clone(),
    }
  }
}

impl Default for DetectionConfig {
  fn default() -> Self {
    Self::meter_default()
  }
}

pub struct DetectionConfigBuilder {
  input_size: u32,
  /// `None` 时取类别名数量
  num_classes: Option<usize>,
  num_anchors: usize,
  score_threshold: f32,
  iou_threshold: f32,
  class_names: Vec<String>,
  reading_class_range: RangeInclusive<usize>,
}

impl Default for DetectionConfigBuilder {
  fn default() -> Self {
    DetectionConfig::meter_default().to_builder()
  }
}

impl DetectionConfigBuilder {
  pub fn input_size(mut self, input_size: u32) -> Self {
    self.input_size = input_size;
    self
  }

  pub fn num_anchors(mut self, num_anchors: usize) -> Self {
    self.num_anchors = num_anchors;
    self
  }

  pub fn score_threshold(mut self, score_threshold: f32) -> Self {
    self.score_threshold = score_threshold;
    self
  }

  pub fn iou_threshold(mut self, iou_threshold: f32) -> Self {
    self.iou_threshold = iou_threshold;
    self
  }

  /// 未显式设置类别数时，类别数取类别名数量
  pub fn class_names<I, T>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    self.class_names = names.into_iter().map(Into::into).collect();
    self
  }

  /// 显式设置类别数，与类别名不一致时 `build` 报错
  pub fn num_classes(mut self, num_classes: usize) -> Self {
    self.num_classes = Some(num_classes);
    self
  }

  pub fn reading_class_range(mut self, range: RangeInclusive<usize>) -> Self {
    self.reading_class_range = range;
    self
  }

  pub fn build(self) -> Result<DetectionConfig, ConfigError> {
    let num_classes = self.num_classes.unwrap_or(self.class_names.len());
    if self.input_size == 0 {
      return Err(ConfigError::Zero("input_size"));
    }
    if self.num_anchors == 0 {
      return Err(ConfigError::Zero("num_anchors"));
    }
    if num_classes == 0 {
      return Err(ConfigError::Zero("num_classes"));
    }
    if self.class_names.len() != num_classes {
      error!(
        "类别名数量 {} 与类别数 {} 不一致",
        self.class_names.len(),
        num_classes
      );
      return Err(ConfigError::ClassNamesMismatch {
        names: self.class_names.len(),
        num_classes,
      });
    }

    for (name, value) in [
      ("score_threshold", self.score_threshold),
      ("iou_threshold", self.iou_threshold),
    ] {
      if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ThresholdOutOfRange { name, value });
      }
    }

    let (start, end) = (
      *self.reading_class_range.start(),
      *self.reading_class_range.end(),
    );
    if start > end || end >= num_classes {
      return Err(ConfigError::ReadingRangeOutOfBounds {
        start,
        end,
        num_classes,
      });
    }

    Ok(DetectionConfig {
      input_size: self.input_size,
      num_classes,
      num_anchors: self.num_anchors,
      score_threshold: self.score_threshold,
      iou_threshold: self.iou_threshold,
      class_names: self.class_names.into_boxed_slice(),
      reading_class_range: self.reading_class_range,
    })
  }
}

/// 配置文件格式
#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
  input_size: Option<u32>,
  num_classes: Option<usize>,
  num_anchors: Option<usize>,
  score_threshold: Option<f32>,
  iou_threshold: Option<f32>,
  class_names: Option<Vec<String>>,
  reading_class_range: Option<[usize; 2]>,
}

impl ConfigFile {
  fn into_builder(self) -> DetectionConfigBuilder {
    let mut builder = DetectionConfig::builder();
    if let Some(v) = self.input_size {
      builder = builder.input_size(v);
    }
    if let Some(v) = self.num_anchors {
      builder = builder.num_anchors(v);
    }
    if let Some(v) = self.num_classes {
      builder = builder.num_classes(v);
    }
    if let Some(v) = self.score_threshold {
      builder = builder.score_threshold(v);
    }
    if let Some(v) = self.iou_threshold {
      builder = builder.iou_threshold(v);
    }
    if let Some(v) = self.class_names {
      builder = builder.class_names(v);
    }
    if let Some([start, end]) = self.reading_class_range {
      builder = builder.reading_class_range(start..=end);
    }
    builder
  }
}
