// 该文件是 Dubiao （读表） 项目的一部分。
// src/geometry.rs - 坐标空间、边界框与 letterbox 变换
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

use std::marker::PhantomData;

use thiserror::Error;

/// 坐标空间标记
pub trait CoordSpace: Copy + std::fmt::Debug + Default + Send + Sync + 'static {
  const NAME: &'static str;
}

/// 归一化到 [0, 1] 的坐标
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Normalized;

/// 模型输入画布（letterbox 之后）的像素坐标
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelSpace;

/// 源图像像素坐标
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageSpace;

impl CoordSpace for Normalized {
  const NAME: &'static str = "normalized";
}

impl CoordSpace for ModelSpace {
  const NAME: &'static str = "model";
}

impl CoordSpace for ImageSpace {
  const NAME: &'static str = "image";
}

/// 边界框，坐标空间由类型参数 `S` 标记，不同空间的框不能混用
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox<S> {
  pub left: f32,
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
  _space: PhantomData<S>,
}

impl<S: CoordSpace> BoundingBox<S> {
  pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
    Self {
      left,
      top,
      right,
      bottom,
      _space: PhantomData,
    }
  }

  /// 由中心点与宽高构造
  pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
    Self::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
  }

  pub fn width(&self) -> f32 {
    self.right - self.left
  }

  pub fn height(&self) -> f32 {
    self.bottom - self.top
  }

  /// 零面积、反向或含 NaN 的框
  pub fn is_degenerate(&self) -> bool {
    !(self.right > self.left && self.bottom > self.top)
  }

  pub fn area(&self) -> f32 {
    if self.is_degenerate() {
      0.0
    } else {
      self.width() * self.height()
    }
  }

  /// 交并比。不相交或任一框退化时严格返回 0，不做除法
  pub fn iou(&self, other: &Self) -> f32 {
    if self.is_degenerate() || other.is_degenerate() {
      return 0.0;
    }

    let left = self.left.max(other.left);
    let top = self.top.max(other.top);
    let right = self.right.min(other.right);
    let bottom = self.bottom.min(other.bottom);

    if left >= right || top >= bottom {
      return 0.0;
    }

    let intersection = (right - left) * (bottom - top);
    let union = self.area() + other.area() - intersection;
    if union <= 0.0 {
      return 0.0;
    }
    (intersection / union).clamp(0.0, 1.0)
  }

  /// 裁剪到 [0, width] x [0, height]
  pub fn clip(&self, width: f32, height: f32) -> Self {
    Self::new(
      self.left.clamp(0.0, width),
      self.top.clamp(0.0, height),
      self.right.clamp(0.0, width),
      self.bottom.clamp(0.0, height),
    )
  }

  /// 以 `[left, top, right, bottom]` 返回
  pub fn to_array(&self) -> [f32; 4] {
    [self.left, self.top, self.right, self.bottom]
  }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
  #[error("源图像尺寸无效: {width}x{height}")]
  EmptySource { width: u32, height: u32 },
  #[error("目标尺寸不能为 0")]
  ZeroTarget,
}

/// 保持宽高比的缩放加填充变换
///
/// `scale` 为名义缩放比；`scale_x` / `scale_y` 是取整后各轴的实际缩放比，
/// 与输入张量中图像实际占据的像素一致，坐标映射只用这两个值。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub scale: f32,
  pub scale_x: f32,
  pub scale_y: f32,
  pub offset_x: f32,
  pub offset_y: f32,
  pub scaled_width: u32,
  pub scaled_height: u32,
  pub source_width: u32,
  pub source_height: u32,
  pub target_size: u32,
}

/// 计算把 `source_width x source_height` 的图像放入 `target_size` 正方形画布的变换。
///
/// 缩放后的尺寸四舍五入到整数，填充边距取整数像素，图像居中。
/// 较长的一边恰好铺满画布，因此至少有一个边距为 0。
pub fn compute_letterbox(
  source_width: u32,
  source_height: u32,
  target_size: u32,
) -> Result<Letterbox, GeometryError> {
  if source_width == 0 || source_height == 0 {
    return Err(GeometryError::EmptySource {
      width: source_width,
      height: source_height,
    });
  }
  if target_size == 0 {
    return Err(GeometryError::ZeroTarget);
  }

  let scale = target_size as f32 / source_width.max(source_height) as f32;
  let scaled_width = ((source_width as f32 * scale).round() as u32).clamp(1, target_size);
  let scaled_height = ((source_height as f32 * scale).round() as u32).clamp(1, target_size);

  let offset_x = ((target_size - scaled_width) / 2) as f32;
  let offset_y = ((target_size - scaled_height) / 2) as f32;

  Ok(Letterbox {
    scale,
    scale_x: scaled_width as f32 / source_width as f32,
    scale_y: scaled_height as f32 / source_height as f32,
    offset_x,
    offset_y,
    scaled_width,
    scaled_height,
    source_width,
    source_height,
    target_size,
  })
}

/// 模型空间 -> 源图像空间。结果裁剪到源图像范围内，不外推；
/// 完全落在填充区的框会退化，由调用方丢弃。
pub fn map_box_to_source(
  bbox: &BoundingBox<ModelSpace>,
  letterbox: &Letterbox,
) -> BoundingBox<ImageSpace> {
  let Letterbox {
    scale_x,
    scale_y,
    offset_x,
    offset_y,
    ..
  } = *letterbox;

  BoundingBox::<ImageSpace>::new(
    (bbox.left - offset_x) / scale_x,
    (bbox.top - offset_y) / scale_y,
    (bbox.right - offset_x) / scale_x,
    (bbox.bottom - offset_y) / scale_y,
  )
  .clip(
    letterbox.source_width as f32,
    letterbox.source_height as f32,
  )
}

/// 源图像空间 -> 模型空间，`map_box_to_source` 的正向变换
pub fn map_box_to_model(
  bbox: &BoundingBox<ImageSpace>,
  letterbox: &Letterbox,
) -> BoundingBox<ModelSpace> {
  let Letterbox {
    scale_x,
    scale_y,
    offset_x,
    offset_y,
    ..
  } = *letterbox;

  BoundingBox::<ModelSpace>::new(
    bbox.left * scale_x + offset_x,
    bbox.top * scale_y + offset_y,
    bbox.right * scale_x + offset_x,
    bbox.bottom * scale_y + offset_y,
  )
}
