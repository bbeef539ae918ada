// 该文件是 Dubiao （读表） 项目的一部分。
// src/pipeline.rs - 检测流水线
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error};

use crate::{
  frame::ModelInput,
  geometry::{GeometryError, ImageSpace, Letterbox, compute_letterbox, map_box_to_source},
  model::{
    DetectResult, DetectionConfig, InferenceError, Model, RawTensorOutput, ShapeMismatchError,
    assemble_reading, decode, suppress,
  },
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("源图像错误: {0}")]
  Geometry(#[from] GeometryError),
  #[error("输出形状错误: {0}")]
  Shape(#[from] ShapeMismatchError),
  #[error("推理错误: {0}")]
  Inference(#[from] InferenceError),
}

/// 对一张源图像完成 letterbox、推理、解码、NMS、坐标还原与读数拼接。
///
/// 模型与配置都由调用方传入，流水线本身不持有任何状态，
/// 不同图像可以在不同线程上并发调用。
pub fn run_detection<M: Model + ?Sized>(
  image: &RgbImage,
  model: &M,
  config: &DetectionConfig,
) -> Result<DetectResult<ImageSpace>, PipelineError> {
  let (width, height) = image.dimensions();
  let letterbox = compute_letterbox(width, height, config.input_size())?;
  debug!(
    "letterbox: {}x{} -> {}x{}, scale={:.4}, offset=({}, {})",
    width,
    height,
    letterbox.scaled_width,
    letterbox.scaled_height,
    letterbox.scale,
    letterbox.offset_x,
    letterbox.offset_y
  );

  let output = {
    let input = ModelInput::from_letterbox(image, &letterbox);
    let now = std::time::Instant::now();
    let output = model.infer(&input).map_err(|e| {
      error!("推理失败: {}", e);
      e
    })?;
    debug!("推理耗时: {:.2?}", now.elapsed());
    output
  };

  postprocess(&output, &letterbox, config)
}

/// 原始输出 -> 源图像空间的检测结果与读数。
///
/// 解码和 NMS 在模型空间完成，之后映射回源图像，映射后退化的框被丢弃。
pub fn postprocess(
  output: &RawTensorOutput,
  letterbox: &Letterbox,
  config: &DetectionConfig,
) -> Result<DetectResult<ImageSpace>, PipelineError> {
  let candidates = decode(output, config)?;
  let kept = suppress(&candidates, config.iou_threshold());

  let items: Box<[_]> = kept
    .iter()
    .filter_map(|det| {
      let bbox = map_box_to_source(&det.bbox, letterbox);
      if bbox.is_degenerate() {
        debug!("丢弃落在填充区的检测: {:?}", det);
        None
      } else {
        Some(det.with_bbox(bbox))
      }
    })
    .collect();

  let reading = assemble_reading(&items, config.class_names(), config.reading_class_range());
  debug!("检测到 {} 个物体, 读数: {:?}", items.len(), reading);

  Ok(DetectResult { items, reading })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{FnModel, MeterLabel, WithLabel};
  use image::Rgb;

  fn blank(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([200, 200, 200]))
  }

  #[test]
  fn empty_output_reads_nothing() {
    let config = DetectionConfig::meter_default();
    let model = FnModel::new(|_| Ok(RawTensorOutput::zeros(16, 8400)));
    let result = run_detection(&blank(800, 600), &model, &config).unwrap();
    assert!(result.is_empty());
    assert_eq!(result.reading, "");
  }

  #[test]
  fn missing_model_is_reported() {
    let config = DetectionConfig::meter_default();
    let model: Option<FnModel<fn(&ModelInput) -> Result<RawTensorOutput, InferenceError>>> =
      None;
    assert!(matches!(
      run_detection(&blank(64, 64), &model, &config),
      Err(PipelineError::Inference(InferenceError::Unavailable(_)))
    ));
  }

  #[test]
  fn wrong_output_shape_is_reported() {
    let config = DetectionConfig::meter_default();
    let model = FnModel::new(|_| Ok(RawTensorOutput::zeros(84, 8400)));
    assert!(matches!(
      run_detection(&blank(64, 64), &model, &config),
      Err(PipelineError::Shape(_))
    ));
  }

  #[test]
  fn empty_image_is_reported() {
    let config = DetectionConfig::meter_default();
    let model = FnModel::new(|_| Ok(RawTensorOutput::zeros(16, 8400)));
    assert!(matches!(
      run_detection(&RgbImage::new(0, 0), &model, &config),
      Err(PipelineError::Geometry(_))
    ));
  }

  #[test]
  fn model_receives_letterboxed_input() {
    let config = DetectionConfig::builder()
      .input_size(32)
      .num_anchors(4)
      .build()
      .unwrap();
    let model = FnModel::new(|input| {
      assert_eq!(input.shape(), [1, 3, 32, 32]);
      Ok(RawTensorOutput::zeros(16, 4))
    });
    run_detection(&blank(40, 20), &model, &config).unwrap();
  }

  #[test]
  fn drops_detections_inside_padding() {
    let config = DetectionConfig::builder().num_anchors(2).build().unwrap();
    let letterbox = compute_letterbox(800, 600, 640).unwrap();
    let mut output = RawTensorOutput::zeros(16, 2);
    let mut scores = [0.0; 12];
    scores[MeterLabel::Digit(1).to_label_id()] = 0.9;
    // 图像区域
    output.set_anchor(0, [0.5, 0.5, 0.05, 0.1], &scores);
    // 完全在上方填充区 (y < 80px)
    output.set_anchor(1, [0.5, 0.05, 0.05, 0.05], &scores);

    let result = postprocess(&output, &letterbox, &config).unwrap();
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.reading, "1");
  }
}
