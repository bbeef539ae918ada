// 该文件是 Dubiao （读表） 项目的一部分。
// src/model/reading.rs - 读数拼接
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

use std::ops::RangeInclusive;

use crate::{geometry::CoordSpace, model::Detection};

/// 按从左到右的顺序拼接读数类别的标签。没有读数类别时返回空串
pub fn assemble_reading<S: CoordSpace>(
  detections: &[Detection<S>],
  class_names: &[String],
  reading_class_range: &RangeInclusive<usize>,
) -> String {
  let mut digits: Vec<&Detection<S>> = detections
    .iter()
    .filter(|d| reading_class_range.contains(&d.class_id))
    .collect();
  digits.sort_by(|a, b| a.bbox.left.total_cmp(&b.bbox.left));

  digits
    .iter()
    .filter_map(|d| class_names.get(d.class_id))
    .map(String::as_str)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    geometry::{BoundingBox, ImageSpace},
    model::DetectionConfig,
  };

  fn digit(class_id: usize, left: f32) -> Detection<ImageSpace> {
    Detection::new(
      class_id,
      0.9,
      BoundingBox::new(left, 10.0, left + 30.0, 60.0),
    )
  }

  fn read(detections: &[Detection<ImageSpace>]) -> String {
    let config = DetectionConfig::meter_default();
    assemble_reading(
      detections,
      config.class_names(),
      config.reading_class_range(),
    )
  }

  #[test]
  fn orders_left_to_right() {
    // "7", "1", "4"
    let detections = [digit(8, 300.0), digit(2, 50.0), digit(5, 180.0)];
    assert_eq!(read(&detections), "147");
  }

  #[test]
  fn includes_decimal_point_and_skips_unit() {
    let detections = [
      digit(4, 10.0),
      digit(0, 75.0),
      digit(11, 5.0),
      digit(6, 90.0),
      digit(1, 40.0),
    ];
    assert_eq!(read(&detections), "30.5");
  }

  #[test]
  fn nothing_in_range_is_empty() {
    assert_eq!(read(&[]), "");
    assert_eq!(read(&[digit(11, 10.0)]), "");
  }

  #[test]
  fn equal_lefts_keep_input_order() {
    let detections = [digit(3, 20.0), digit(9, 20.0)];
    assert_eq!(read(&detections), "28");
  }
}
