// 该文件是 Dubiao （读表） 项目的一部分。
// src/output.rs - 结果输出
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
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  geometry::ImageSpace,
  input::SourceFrame,
  model::{DetectResult, MeterLabel, WithLabel},
};

#[cfg(feature = "save_image_file")]
mod draw;
mod log_output;
mod record;
#[cfg(feature = "save_image_file")]
mod save_image_file;

pub use self::log_output::LogOutput;
pub use self::record::RecordOutput;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::SaveImageFileOutput;

pub trait Render<F, D> {
  type Error;
  fn render_result(&self, frame: &F, result: &D) -> Result<(), Self::Error>;
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[cfg(feature = "save_image_file")]
  #[error("字体加载错误: {0}")]
  FontError(#[from] ab_glyph::InvalidFont),
}

pub(crate) fn check_scheme<T: FromUrlWithScheme>(url: &Url) -> Result<(), OutputError> {
  if url.scheme() != T::SCHEME {
    return Err(OutputError::SchemeMismatch(format!(
      "期望输出方式 '{}', 实际输出方式 '{}'",
      T::SCHEME,
      url.scheme()
    )));
  }
  Ok(())
}

pub(crate) fn default_class_names() -> Vec<String> {
  MeterLabel::all()
    .map(|l| l.to_label_str().to_string())
    .collect()
}

pub(crate) fn class_name(names: &[String], class_id: usize) -> String {
  names
    .get(class_id)
    .cloned()
    .unwrap_or_else(|| format!("class_{class_id}"))
}

pub enum OutputWrapper {
  Log(LogOutput),
  Record(RecordOutput),
  #[cfg(feature = "save_image_file")]
  SaveImageFile(SaveImageFileOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() == LogOutput::SCHEME {
      return Ok(OutputWrapper::Log(LogOutput::from_url(url)?));
    }
    if url.scheme() == RecordOutput::SCHEME {
      return Ok(OutputWrapper::Record(RecordOutput::from_url(url)?));
    }
    #[cfg(feature = "save_image_file")]
    {
      if url.scheme() == SaveImageFileOutput::SCHEME {
        return Ok(OutputWrapper::SaveImageFile(
          SaveImageFileOutput::from_url(url)?,
        ));
      }
    }
    Err(OutputError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl OutputWrapper {
  /// 使用配置中的类别名输出标签
  pub fn with_class_names(self, names: &[String]) -> Self {
    match self {
      OutputWrapper::Log(o) => OutputWrapper::Log(o.with_class_names(names)),
      OutputWrapper::Record(o) => OutputWrapper::Record(o.with_class_names(names)),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFile(o) => OutputWrapper::SaveImageFile(o.with_class_names(names)),
    }
  }
}

impl Render<SourceFrame, DetectResult<ImageSpace>> for OutputWrapper {
  type Error = OutputError;

  fn render_result(
    &self,
    frame: &SourceFrame,
    result: &DetectResult<ImageSpace>,
  ) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Log(o) => o.render_result(frame, result),
      OutputWrapper::Record(o) => o.render_result(frame, result),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFile(o) => o.render_result(frame, result),
    }
  }
}
