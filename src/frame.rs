// 该文件是 Dubiao （读表） 项目的一部分。
// src/frame.rs - 模型输入张量
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

use image::{RgbImage, imageops::FilterType};

use crate::geometry::Letterbox;

const RGB_CHANNELS: usize = 3;
// 填充区域灰度 114/255
const LETTERBOX_PAD: f32 = 114.0 / 255.0;

/// `[1, 3, S, S]` 的 NCHW 浮点输入，RGB 归一化到 [0, 1]。
/// 每次流水线调用独占一份，调用结束即释放。
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
  size: usize,
  data: Box<[f32]>,
}

impl ModelInput {
  pub fn zeros(size: usize) -> Self {
    Self {
      size,
      data: vec![0.0; RGB_CHANNELS * size * size].into_boxed_slice(),
    }
  }

  /// 按 letterbox 缩放并居中填充源图像
  pub fn from_letterbox(image: &RgbImage, letterbox: &Letterbox) -> Self {
    let size = letterbox.target_size as usize;
    let mut data = vec![LETTERBOX_PAD; RGB_CHANNELS * size * size].into_boxed_slice();

    let resized = image::imageops::resize(
      image,
      letterbox.scaled_width,
      letterbox.scaled_height,
      FilterType::Triangle,
    );

    let plane = size * size;
    let (ox, oy) = (letterbox.offset_x as usize, letterbox.offset_y as usize);
    for (x, y, pixel) in resized.enumerate_pixels() {
      let idx = (y as usize + oy) * size + (x as usize + ox);
      for c in 0..RGB_CHANNELS {
        data[c * plane + idx] = pixel[c] as f32 / 255.0;
      }
    }

    Self { size, data }
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// 运行时需要的完整形状
  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, self.size, self.size]
  }

  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }

  pub fn get(&self, c: usize, y: usize, x: usize) -> f32 {
    self.data[c * self.size * self.size + y * self.size + x]
  }
}
