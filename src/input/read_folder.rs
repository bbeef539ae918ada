// 该文件是 Dubiao （读表） 项目的一部分。
// src/input/read_folder.rs - 目录批量输入
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

use std::{collections::VecDeque, path::PathBuf};

use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{InputError, Roi, SourceFrame, load_frame},
};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// 目录中全部图像，按文件名排序逐张读取，`folder:///path/to/dir[?roi=x,y,w,h]`
pub struct FolderInput {
  paths: VecDeque<PathBuf>,
  roi: Option<Roi>,
}

impl FromUrlWithScheme for FolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for FolderInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(InputError::SchemeMismatch(url.scheme().to_string()));
    }

    let roi = Roi::from_query(url)?;
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(url.path())? {
      let path = entry?.path();
      let is_image = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));
      if path.is_file() && is_image {
        paths.push(path);
      } else {
        debug!("跳过非图像文件: {}", path.display());
      }
    }
    paths.sort();

    if paths.is_empty() {
      warn!("目录 {} 中没有图像文件", url.path());
    } else {
      info!("目录 {} 中共有 {} 张图像", url.path(), paths.len());
    }

    Ok(FolderInput {
      paths: paths.into(),
      roi,
    })
  }
}

impl Iterator for FolderInput {
  type Item = Result<SourceFrame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.paths.pop_front()?;
    debug!("读取图像: {}", path.display());
    Some(load_frame(&path, self.roi.as_ref()))
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.paths.len(), Some(self.paths.len()))
  }
}
