// 该文件是 Dubiao （读表） 项目的一部分。
// src/input.rs - 图像输入
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

use std::{path::Path, str::FromStr};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

mod read_folder;
mod read_image_file;

pub use self::read_folder::FolderInput;
pub use self::read_image_file::ImageFileInput;

#[derive(Error, Debug)]
pub enum InputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("ROI 参数无效: {0}")]
  InvalidRoi(String),
  #[error("ROI 与图像 {width}x{height} 无交集")]
  EmptyRoi { width: u32, height: u32 },
}

/// 送入流水线的一帧源图像
#[derive(Debug, Clone)]
pub struct SourceFrame {
  pub name: String,
  pub image: RgbImage,
}

/// 源图像自身坐标下的感兴趣区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

impl FromStr for Roi {
  type Err = InputError;

  /// 格式 `x,y,w,h`
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let values: Vec<u32> = s
      .split(',')
      .map(|v| v.trim().parse::<u32>())
      .collect::<Result<_, _>>()
      .map_err(|_| InputError::InvalidRoi(s.to_string()))?;
    match values[..] {
      [x, y, width, height] => Ok(Roi {
        x,
        y,
        width,
        height,
      }),
      _ => Err(InputError::InvalidRoi(s.to_string())),
    }
  }
}

impl Roi {
  /// 从 URL 的 `roi` 查询参数读取
  pub fn from_query(url: &Url) -> Result<Option<Self>, InputError> {
    url
      .query_pairs()
      .find(|(k, _)| k == "roi")
      .map(|(_, v)| v.parse())
      .transpose()
  }

  /// 裁剪到图像范围内后截取，无交集时报错
  pub fn crop(&self, image: &RgbImage) -> Result<RgbImage, InputError> {
    let (w, h) = image.dimensions();
    let x = self.x.min(w);
    let y = self.y.min(h);
    let width = self.width.min(w - x);
    let height = self.height.min(h - y);
    if width == 0 || height == 0 {
      return Err(InputError::EmptyRoi {
        width: w,
        height: h,
      });
    }
    Ok(image::imageops::crop_imm(image, x, y, width, height).to_image())
  }
}

pub(crate) fn load_frame(path: &Path, roi: Option<&Roi>) -> Result<SourceFrame, InputError> {
  let image = ImageReader::open(path)?.with_guessed_format()?.decode()?.to_rgb8();
  let image = match roi {
    Some(roi) => roi.crop(&image)?,
    None => image,
  };
  let name = path
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default();
  Ok(SourceFrame { name, image })
}

pub enum InputWrapper {
  ReadImageFile(ImageFileInput),
  ReadFolder(FolderInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() == ImageFileInput::SCHEME {
      return Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?));
    }
    if url.scheme() == FolderInput::SCHEME {
      return Ok(InputWrapper::ReadFolder(FolderInput::from_url(url)?));
    }
    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl Iterator for InputWrapper {
  type Item = Result<SourceFrame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ReadImageFile(input) => input.next(),
      InputWrapper::ReadFolder(input) => input.next(),
    }
  }
}
