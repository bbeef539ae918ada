// 该文件是 Dubiao （读表） 项目的一部分。
// src/output/record.rs - JSON Lines 结果记录
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

use std::{
  fs::OpenOptions,
  io::Write,
  path::{Path, PathBuf},
};

use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  geometry::ImageSpace,
  input::SourceFrame,
  model::DetectResult,
  output::{OutputError, Render, check_scheme, class_name, default_class_names},
};

/// 每帧追加一行带 UTC 时间戳的 JSON，`record:///path/to/readings.jsonl`
pub struct RecordOutput {
  path: PathBuf,
  class_names: Vec<String>,
}

impl FromUrlWithScheme for RecordOutput {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    check_scheme::<Self>(url)?;
    let path = PathBuf::from(url.path());
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    Ok(RecordOutput {
      path,
      class_names: default_class_names(),
    })
  }
}

impl RecordOutput {
  pub fn with_class_names(mut self, names: &[String]) -> Self {
    self.class_names = names.to_vec();
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn to_json(&self, frame: &SourceFrame, result: &DetectResult<ImageSpace>) -> Value {
    let detections: Vec<Value> = result
      .items
      .iter()
      .map(|det| {
        json!({
          "label": class_name(&self.class_names, det.class_id),
          "class_id": det.class_id,
          "confidence": det.confidence,
          "bbox": det.bbox.to_array(),
        })
      })
      .collect();

    json!({
      "time": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
      "frame": frame.name,
      "width": frame.image.width(),
      "height": frame.image.height(),
      "reading": result.reading,
      "detections": detections,
    })
  }
}

impl Render<SourceFrame, DetectResult<ImageSpace>> for RecordOutput {
  type Error = OutputError;

  fn render_result(
    &self,
    frame: &SourceFrame,
    result: &DetectResult<ImageSpace>,
  ) -> Result<(), Self::Error> {
    let mut line = serde_json::to_string(&self.to_json(frame, result))?;
    line.push('\n');

    let mut file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)?;
    file.write_all(line.as_bytes())?;
    debug!("记录结果到文件: {}", self.path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    geometry::BoundingBox,
    model::Detection,
  };
  use image::RgbImage;

  fn result() -> DetectResult<ImageSpace> {
    DetectResult {
      items: vec![
        Detection::new(2, 0.75, BoundingBox::new(1.0, 2.0, 3.0, 4.0)),
        Detection::new(11, 0.5, BoundingBox::new(5.0, 2.0, 9.0, 4.0)),
      ]
      .into_boxed_slice(),
      reading: "1".to_string(),
    }
  }

  #[test]
  fn appends_one_line_per_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("out.jsonl");
    let url = Url::parse(&format!("record://{}", path.display())).unwrap();
    let output = RecordOutput::from_url(&url).unwrap();
    let frame = SourceFrame {
      name: "m1".to_string(),
      image: RgbImage::new(10, 6),
    };

    output.render_result(&frame, &result()).unwrap();
    output.render_result(&frame, &result()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);

    let value: Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(value["frame"], "m1");
    assert!(value["time"].as_str().is_some_and(|t| t.ends_with('Z')));
    assert_eq!(value["reading"], "1");
    assert_eq!(value["width"], 10);
    assert_eq!(value["detections"][0]["label"], "1");
    assert_eq!(value["detections"][1]["label"], "kwh");
    assert_eq!(value["detections"][0]["bbox"][2], 3.0);
  }

  #[test]
  fn uses_custom_class_names() {
    let output = RecordOutput {
      path: PathBuf::from("unused"),
      class_names: default_class_names(),
    }
    .with_class_names(&["a".to_string(), "b".to_string(), "c".to_string()]);
    let frame = SourceFrame {
      name: "x".to_string(),
      image: RgbImage::new(1, 1),
    };
    let value = output.to_json(&frame, &result());
    assert_eq!(value["detections"][0]["label"], "c");
    assert_eq!(value["detections"][1]["label"], "class_11");
  }
}
