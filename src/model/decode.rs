// 该文件是 Dubiao （读表） 项目的一部分。
// src/model/decode.rs - 原始输出张量解码
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

use crate::{
  geometry::{BoundingBox, CoordSpace, ModelSpace},
  model::{Detection, DetectionConfig, RawTensorOutput, ShapeMismatchError},
};

/// 解码到模型输入像素空间
pub fn decode(
  output: &RawTensorOutput,
  config: &DetectionConfig,
) -> Result<Vec<Detection<ModelSpace>>, ShapeMismatchError> {
  let size = config.input_size() as f32;
  decode_scaled(output, config, size, size)
}

/// 解码原始输出，坐标乘以 `width` / `height` 表达在空间 `S` 中。
///
/// 每个锚点只取得分最高的一个类别（线性扫描，严格大于，先出现者胜出），
/// 得分严格大于阈值才保留。结果按锚点顺序排列，尚未去重。
pub fn decode_scaled<S: CoordSpace>(
  output: &RawTensorOutput,
  config: &DetectionConfig,
  width: f32,
  height: f32,
) -> Result<Vec<Detection<S>>, ShapeMismatchError> {
  output.check_shape(config)?;

  let (_, num_anchors) = output.shape();
  let num_classes = config.num_classes();
  let threshold = config.score_threshold();

  let cx = output.row(0);
  let cy = output.row(1);
  let cw = output.row(2);
  let ch = output.row(3);
  let scores = &output.as_slice()[4 * num_anchors..];

  let mut items = Vec::new();
  for anchor in 0..num_anchors {
    let (score, class_id) = {
      let mut max_score = f32::MIN;
      let mut cls_idx = 0usize;
      for c in 0..num_classes {
        let s = scores[c * num_anchors + anchor];
        if s > max_score {
          max_score = s;
          cls_idx = c;
        }
      }
      (max_score, cls_idx)
    };

    // NaN 同样被丢弃
    if !(score > threshold) {
      continue;
    }

    let (x, y, w, h) = (cx[anchor], cy[anchor], cw[anchor], ch[anchor]);
    let bbox = BoundingBox::<S>::new(
      (x - w / 2.0) * width,
      (y - h / 2.0) * height,
      (x + w / 2.0) * width,
      (y + h / 2.0) * height,
    );
    items.push(Detection::new(class_id, score, bbox));
  }

  debug!(
    "解码 {} 个锚点, {} 个超过阈值 {} ({} 空间)",
    num_anchors,
    items.len(),
    threshold,
    S::NAME
  );

  Ok(items)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::Normalized;
  use approx::assert_relative_eq;

  fn small_config(num_anchors: usize) -> DetectionConfig {
    DetectionConfig::builder()
      .num_anchors(num_anchors)
      .build()
      .unwrap()
  }

  fn one_hot(class_id: usize, score: f32) -> [f32; 12] {
    let mut scores = [0.0; 12];
    scores[class_id] = score;
    scores
  }

  #[test]
  fn all_zero_scores_yield_nothing() {
    let config = DetectionConfig::meter_default();
    let output = RawTensorOutput::zeros(16, 8400);
    assert!(decode(&output, &config).unwrap().is_empty());
  }

  #[test]
  fn threshold_is_strict() {
    let config = small_config(2);
    let mut output = RawTensorOutput::zeros(16, 2);
    output.set_anchor(0, [0.5, 0.5, 0.1, 0.1], &one_hot(3, 0.5));
    output.set_anchor(1, [0.5, 0.5, 0.1, 0.1], &one_hot(3, 0.5 + f32::EPSILON));

    let items = decode(&output, &config).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].class_id, 3);
    assert!(items[0].confidence > 0.5);
  }

  #[test]
  fn converts_center_form_to_corners() {
    let config = small_config(1);
    let mut output = RawTensorOutput::zeros(16, 1);
    output.set_anchor(0, [0.5, 0.25, 0.2, 0.1], &one_hot(5, 0.9));

    let items = decode(&output, &config).unwrap();
    let bbox = items[0].bbox;
    assert_relative_eq!(bbox.left, 256.0);
    assert_relative_eq!(bbox.top, 128.0);
    assert_relative_eq!(bbox.right, 384.0);
    assert_relative_eq!(bbox.bottom, 192.0);

    let normalized = decode_scaled::<Normalized>(&output, &config, 1.0, 1.0).unwrap();
    assert_relative_eq!(normalized[0].bbox.left, 0.4);
    assert_relative_eq!(normalized[0].bbox.bottom, 0.3);
  }

  #[test]
  fn first_class_wins_ties() {
    let config = small_config(1);
    let mut output = RawTensorOutput::zeros(16, 1);
    let mut scores = [0.0; 12];
    scores[4] = 0.8;
    scores[7] = 0.8;
    scores[2] = 0.3;
    output.set_anchor(0, [0.5, 0.5, 0.1, 0.1], &scores);

    let items = decode(&output, &config).unwrap();
    assert_eq!(items[0].class_id, 4);
    assert_eq!(items[0].confidence, 0.8);
  }

  #[test]
  fn keeps_anchor_order() {
    let config = small_config(4);
    let mut output = RawTensorOutput::zeros(16, 4);
    output.set_anchor(0, [0.1, 0.5, 0.05, 0.1], &one_hot(1, 0.6));
    output.set_anchor(2, [0.3, 0.5, 0.05, 0.1], &one_hot(2, 0.95));
    output.set_anchor(3, [0.5, 0.5, 0.05, 0.1], &one_hot(11, 0.7));

    let classes: Vec<usize> = decode(&output, &config)
      .unwrap()
      .iter()
      .map(|d| d.class_id)
      .collect();
    assert_eq!(classes, [1, 2, 11]);
  }

  #[test]
  fn rejects_shape_mismatch_before_indexing() {
    let config = DetectionConfig::meter_default();
    let output = RawTensorOutput::zeros(16, 100);
    assert!(matches!(
      decode(&output, &config),
      Err(ShapeMismatchError::Shape { cols: 100, .. })
    ));
  }

  #[test]
  fn nan_scores_are_discarded() {
    let config = small_config(1);
    let mut output = RawTensorOutput::zeros(16, 1);
    output.set_anchor(0, [0.5, 0.5, 0.1, 0.1], &[f32::NAN; 12]);
    assert!(decode(&output, &config).unwrap().is_empty());
  }
}
