// 该文件是 Dubiao （读表） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::Path;

use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{InputError, Roi, SourceFrame, load_frame},
};

/// 单张图像输入，`image:///path/to/meter.jpg[?roi=x,y,w,h]`
pub struct ImageFileInput {
  frame: Option<SourceFrame>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(InputError::SchemeMismatch(url.scheme().to_string()));
    }

    let roi = Roi::from_query(url)?;
    let frame = load_frame(Path::new(url.path()), roi.as_ref())?;
    info!(
      "读取图像 {}: {}x{}",
      url.path(),
      frame.image.width(),
      frame.image.height()
    );

    Ok(ImageFileInput { frame: Some(frame) })
  }
}

impl From<SourceFrame> for ImageFileInput {
  fn from(frame: SourceFrame) -> Self {
    ImageFileInput { frame: Some(frame) }
  }
}

impl Iterator for ImageFileInput {
  type Item = Result<SourceFrame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take().map(Ok)
  }
}
