// 该文件是 Dubiao （读表） 项目的一部分。
// src/model/nms.rs - 按类别的非极大值抑制
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

use tracing::debug;

use crate::{geometry::CoordSpace, model::Detection};

/// 贪心 NMS。
///
/// 按置信度降序（稳定排序，同分保持输入顺序）依次接受候选框，
/// 并抑制其后与之 IoU 大于 `iou_threshold` 的同类候选。不同类别互不抑制。
/// 返回输入的子集，按置信度降序排列，各字段保持不变。
pub fn suppress<S: CoordSpace>(detections: &[Detection<S>], iou_threshold: f32) -> Vec<Detection<S>> {
  let mut order: Vec<usize> = (0..detections.len()).collect();
  order.sort_by(|&a, &b| {
    detections[b]
      .confidence
      .total_cmp(&detections[a].confidence)
  });

  let mut suppressed = vec![false; order.len()];
  let mut kept = Vec::new();

  for (i, &current) in order.iter().enumerate() {
    if suppressed[i] {
      continue;
    }
    let best = &detections[current];
    kept.push(best.clone());

    for (j, &other) in order.iter().enumerate().skip(i + 1) {
      if suppressed[j] {
        continue;
      }
      let candidate = &detections[other];
      if candidate.class_id != best.class_id {
        continue;
      }
      if best.bbox.iou(&candidate.bbox) > iou_threshold {
        suppressed[j] = true;
      }
    }
  }

  debug!("NMS: {} -> {} 个检测", detections.len(), kept.len());
  kept
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::{BoundingBox, ModelSpace};

  fn det(class_id: usize, confidence: f32, l: f32, t: f32, r: f32, b: f32) -> Detection<ModelSpace> {
    Detection::new(class_id, confidence, BoundingBox::new(l, t, r, b))
  }

  fn sample() -> Vec<Detection<ModelSpace>> {
    vec![
      det(1, 0.70, 10.0, 10.0, 50.0, 90.0),
      det(1, 0.90, 12.0, 11.0, 52.0, 92.0),
      det(2, 0.85, 60.0, 10.0, 100.0, 90.0),
      det(2, 0.60, 61.0, 12.0, 99.0, 91.0),
      det(11, 0.80, 10.0, 10.0, 50.0, 90.0),
      det(1, 0.65, 200.0, 10.0, 240.0, 90.0),
      det(3, 0.55, 5.0, 5.0, 5.0, 40.0),
    ]
  }

  #[test]
  fn keeps_best_of_each_overlapping_group() {
    let kept = suppress(&sample(), 0.45);
    let summary: Vec<(usize, f32)> = kept.iter().map(|d| (d.class_id, d.confidence)).collect();
    assert_eq!(
      summary,
      [(1, 0.90), (2, 0.85), (11, 0.80), (1, 0.65), (3, 0.55)]
    );
  }

  #[test]
  fn different_classes_never_suppress() {
    let input = vec![
      det(4, 0.9, 0.0, 0.0, 10.0, 10.0),
      det(11, 0.8, 0.0, 0.0, 10.0, 10.0),
    ];
    assert_eq!(input[0].bbox.iou(&input[1].bbox), 1.0);
    let kept = suppress(&input, 0.45);
    assert_eq!(kept.len(), 2);
  }

  #[test]
  fn is_idempotent() {
    let once = suppress(&sample(), 0.45);
    let twice = suppress(&once, 0.45);
    assert_eq!(once, twice);
  }

  #[test]
  fn output_is_unmodified_subset() {
    let input = sample();
    let kept = suppress(&input, 0.45);
    assert!(kept.len() <= input.len());
    for item in &kept {
      assert!(input.contains(item));
    }
  }

  #[test]
  fn ties_keep_input_order() {
    let input = vec![
      det(5, 0.8, 0.0, 0.0, 10.0, 10.0),
      det(5, 0.8, 1.0, 0.0, 11.0, 10.0),
      det(6, 0.8, 100.0, 0.0, 110.0, 10.0),
    ];
    let kept = suppress(&input, 0.45);
    assert_eq!(kept, vec![input[0].clone(), input[2].clone()]);
  }

  #[test]
  fn iou_equal_to_threshold_is_kept() {
    // IoU = 50 / 150
    let input = vec![
      det(5, 0.9, 0.0, 0.0, 10.0, 10.0),
      det(5, 0.8, 5.0, 0.0, 15.0, 10.0),
    ];
    let iou = input[0].bbox.iou(&input[1].bbox);
    assert_eq!(suppress(&input, iou).len(), 2);
    assert_eq!(suppress(&input, iou - 0.01).len(), 1);
  }

  #[test]
  fn empty_input() {
    assert!(suppress::<ModelSpace>(&[], 0.45).is_empty());
  }
}
