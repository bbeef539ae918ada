// 该文件是 Dubiao （读表） 项目的一部分。
// src/output/draw.rs - 检测框可视化
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

use ab_glyph::{FontArc, InvalidFont, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};

use crate::{
  geometry::{BoundingBox, ImageSpace},
  model::DetectResult,
  output::class_name,
};

const BOX_THICKNESS: i32 = 2;
const LABEL_FONT_SIZE: f32 = 16.0;
// 标签文字底边与框上沿的距离
const LABEL_OFFSET: i32 = 18;

pub struct Draw {
  colors: Vec<Rgb<u8>>,
  class_names: Vec<String>,
  font: FontArc,
  font_scale: PxScale,
  thickness: i32,
}

impl Draw {
  pub fn new(class_names: &[String]) -> Result<Self, InvalidFont> {
    let font_data: &'static [u8] = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data)?;
    Ok(Self {
      colors: palette(class_names.len()),
      class_names: class_names.to_vec(),
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      thickness: BOX_THICKNESS,
    })
  }

  /// 换一组类别名，颜色随类别数重新生成
  pub fn with_class_names(mut self, class_names: &[String]) -> Self {
    self.colors = palette(class_names.len());
    self.class_names = class_names.to_vec();
    self
  }

  pub fn color(&self, class_id: usize) -> Rgb<u8> {
    self.colors[class_id % self.colors.len()]
  }

  /// 画框并在框上方标注 `类别 置信度`
  pub fn draw_detections(&self, image: &mut RgbImage, result: &DetectResult<ImageSpace>) {
    for det in result.items.iter() {
      let color = self.color(det.class_id);
      if let Some((x, y)) = self.draw_bbox(image, &det.bbox, color) {
        let label = format!(
          "{} {:.2}",
          class_name(&self.class_names, det.class_id),
          det.confidence
        );
        let text_y = (y - LABEL_OFFSET).max(0);
        draw_text_mut(image, color, x, text_y, self.font_scale, &self.font, &label);
      }
    }
  }

  /// 返回框的左上角，框完全不可见时返回 `None`
  fn draw_bbox(
    &self,
    image: &mut RgbImage,
    bbox: &BoundingBox<ImageSpace>,
    color: Rgb<u8>,
  ) -> Option<(i32, i32)> {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return None;
    }

    let x_min = (bbox.left.floor() as i32).clamp(0, w - 1);
    let y_min = (bbox.top.floor() as i32).clamp(0, h - 1);
    let x_max = (bbox.right.ceil() as i32).clamp(0, w - 1);
    let y_max = (bbox.bottom.ceil() as i32).clamp(0, h - 1);

    // 逐层向内绘制以加粗边框
    for t in 0..self.thickness {
      let width = x_max - x_min - 2 * t;
      let height = y_max - y_min - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32 + 1, height as u32 + 1);
      draw_hollow_rect_mut(image, rect, color);
    }
    Some((x_min, y_min))
  }
}

fn palette(num_classes: usize) -> Vec<Rgb<u8>> {
  let n = num_classes.max(1);
  (0..n)
    .map(|i| {
      let hue = (i as f32 / n as f32) * 360.0;
      hsv_to_rgb(hue, 0.8, 0.9)
    })
    .collect()
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{model::Detection, output::default_class_names};

  fn single(class_id: usize, bbox: BoundingBox<ImageSpace>) -> DetectResult<ImageSpace> {
    DetectResult {
      items: vec![Detection::new(class_id, 0.9, bbox)].into_boxed_slice(),
      reading: String::new(),
    }
  }

  #[test]
  fn draws_box_outline_only() {
    let draw = Draw::new(&default_class_names()).unwrap();
    let mut image = RgbImage::new(40, 60);
    let result = single(3, BoundingBox::new(4.0, 30.0, 14.0, 40.0));
    draw.draw_detections(&mut image, &result);

    let color = draw.color(3);
    assert_eq!(image.get_pixel(4, 30), &color);
    assert_eq!(image.get_pixel(14, 35), &color);
    assert_eq!(image.get_pixel(5, 31), &color);
    assert_eq!(image.get_pixel(9, 35), &Rgb([0, 0, 0]));
  }

  #[test]
  fn labels_box_above_its_top_edge() {
    let draw = Draw::new(&default_class_names()).unwrap();
    let mut image = RgbImage::new(120, 80);
    let result = single(5, BoundingBox::new(10.0, 40.0, 60.0, 70.0));
    draw.draw_detections(&mut image, &result);

    let black = Rgb([0, 0, 0]);
    let labelled = (10..110)
      .flat_map(|x| (22..40).map(move |y| (x, y)))
      .any(|(x, y)| image.get_pixel(x, y) != &black);
    assert!(labelled);
    // 框的左侧和上方远处保持空白
    assert_eq!(image.get_pixel(2, 2), &black);
  }

  #[test]
  fn colors_differ_between_classes() {
    let draw = Draw::new(&default_class_names()).unwrap();
    assert_ne!(draw.color(0), draw.color(6));
    assert_eq!(draw.color(1), draw.color(13));

    let small = draw.with_class_names(&["a".to_string(), "b".to_string()]);
    assert_eq!(small.color(0), small.color(2));
  }
}
