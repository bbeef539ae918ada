// 该文件是 Dubiao （读表） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  geometry::ImageSpace,
  input::SourceFrame,
  model::DetectResult,
  output::{OutputError, Render, check_scheme, class_name, default_class_names},
};

/// 仅把读数写入日志，`log:`
pub struct LogOutput {
  class_names: Vec<String>,
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    check_scheme::<Self>(url)?;
    Ok(LogOutput::default())
  }
}

impl Default for LogOutput {
  fn default() -> Self {
    LogOutput {
      class_names: default_class_names(),
    }
  }
}

impl LogOutput {
  pub fn with_class_names(mut self, names: &[String]) -> Self {
    self.class_names = names.to_vec();
    self
  }
}

impl Render<SourceFrame, DetectResult<ImageSpace>> for LogOutput {
  type Error = OutputError;

  fn render_result(
    &self,
    frame: &SourceFrame,
    result: &DetectResult<ImageSpace>,
  ) -> Result<(), Self::Error> {
    if result.reading.is_empty() {
      warn!("{}: 未读出数字", frame.name);
    } else {
      info!("{}: 读数 {}", frame.name, result.reading);
    }
    for det in result.items.iter() {
      info!(
        "  - {}: {:.2}% at ({:.0}, {:.0}, {:.0}, {:.0})",
        class_name(&self.class_names, det.class_id),
        det.confidence * 100.0,
        det.bbox.left,
        det.bbox.top,
        det.bbox.right,
        det.bbox.bottom
      );
    }
    Ok(())
  }
}
