// 该文件是 Dubiao （读表） 项目的一部分。
// src/output/save_image_file.rs - 保存标注后的图像文件
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

use std::path::{Path, PathBuf};

use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  geometry::ImageSpace,
  input::SourceFrame,
  model::DetectResult,
  output::{OutputError, Render, check_scheme, default_class_names, draw::Draw},
};

/// `image:///path/to/out.png[?per_frame]`；`per_frame` 时文件名追加帧名
pub struct SaveImageFileOutput {
  path: PathBuf,
  per_frame: bool,
  draw: Draw,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    check_scheme::<Self>(url)?;
    Ok(SaveImageFileOutput {
      path: PathBuf::from(url.path()),
      per_frame: url.query_pairs().any(|(k, _)| k == "per_frame"),
      draw: Draw::new(&default_class_names())?,
    })
  }
}

impl SaveImageFileOutput {
  pub fn with_class_names(mut self, names: &[String]) -> Self {
    self.draw = self.draw.with_class_names(names);
    self
  }

  fn frame_path(&self, frame: &SourceFrame) -> PathBuf {
    if !self.per_frame {
      return self.path.clone();
    }
    let stem = self
      .path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_default();
    let ext = self
      .path
      .extension()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "png".to_string());
    self
      .path
      .with_file_name(format!("{}-{}.{}", stem, frame.name, ext))
  }

  fn save_image(&self, path: &Path, image: &image::RgbImage) -> Result<(), OutputError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    image.save(path)?;
    info!("保存图像到文件: {}", path.display());
    Ok(())
  }
}

impl Render<SourceFrame, DetectResult<ImageSpace>> for SaveImageFileOutput {
  type Error = OutputError;

  fn render_result(
    &self,
    frame: &SourceFrame,
    result: &DetectResult<ImageSpace>,
  ) -> Result<(), Self::Error> {
    let mut image = frame.image.clone();
    self.draw.draw_detections(&mut image, result);
    self.save_image(&self.frame_path(frame), &image)
  }
}
