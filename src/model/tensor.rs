// 该文件是 Dubiao （读表） 项目的一部分。
// src/model/tensor.rs - 模型原始输出张量
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

use thiserror::Error;

use crate::model::DetectionConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeMismatchError {
  #[error("数据长度 {len} 与形状 [{rows}, {cols}] 不符")]
  DataLength { rows: usize, cols: usize, len: usize },
  #[error("输出形状 [{rows}, {cols}] 与配置期望 [{expected_rows}, {expected_cols}] 不符")]
  Shape {
    rows: usize,
    cols: usize,
    expected_rows: usize,
    expected_cols: usize,
  },
}

/// 行优先的 `[4 + C, A]` 输出：第 0..4 行为 cx, cy, w, h，其余行为各类别得分
#[derive(Debug, Clone, PartialEq)]
pub struct RawTensorOutput {
  rows: usize,
  cols: usize,
  data: Box<[f32]>,
}

impl RawTensorOutput {
  pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, ShapeMismatchError> {
    if rows.checked_mul(cols) != Some(data.len()) {
      return Err(ShapeMismatchError::DataLength {
        rows,
        cols,
        len: data.len(),
      });
    }
    Ok(Self {
      rows,
      cols,
      data: data.into_boxed_slice(),
    })
  }

  pub fn zeros(rows: usize, cols: usize) -> Self {
    Self {
      rows,
      cols,
      data: vec![0.0; rows * cols].into_boxed_slice(),
    }
  }

  /// 运行时给出的 `[1, rows, cols]` 批量输出，去掉批维度
  pub fn from_batched(shape: &[usize], data: Vec<f32>) -> Result<Self, ShapeMismatchError> {
    match *shape {
      [1, rows, cols] | [rows, cols] => Self::new(rows, cols, data),
      _ => Err(ShapeMismatchError::DataLength {
        rows: shape.iter().rev().nth(1).copied().unwrap_or(0),
        cols: shape.last().copied().unwrap_or(0),
        len: data.len(),
      }),
    }
  }

  pub fn shape(&self) -> (usize, usize) {
    (self.rows, self.cols)
  }

  pub fn row(&self, row: usize) -> &[f32] {
    &self.data[row * self.cols..(row + 1) * self.cols]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn as_mut_slice(&mut self) -> &mut [f32] {
    &mut self.data
  }

  /// 校验形状与配置一致，解码前必须调用
  pub fn check_shape(&self, config: &DetectionConfig) -> Result<(), ShapeMismatchError> {
    let (expected_rows, expected_cols) = config.output_shape();
    if self.rows != expected_rows || self.cols != expected_cols {
      return Err(ShapeMismatchError::Shape {
        rows: self.rows,
        cols: self.cols,
        expected_rows,
        expected_cols,
      });
    }
    Ok(())
  }

  /// 写入单个锚点，测试与回放用
  pub fn set_anchor(&mut self, anchor: usize, bbox: [f32; 4], scores: &[f32]) {
    for (row, value) in bbox.iter().chain(scores).enumerate() {
      self.data[row * self.cols + anchor] = *value;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_checks_data_length() {
    assert!(RawTensorOutput::new(2, 3, vec![0.0; 6]).is_ok());
    assert_eq!(
      RawTensorOutput::new(2, 3, vec![0.0; 5]),
      Err(ShapeMismatchError::DataLength {
        rows: 2,
        cols: 3,
        len: 5
      })
    );
  }

  #[test]
  fn drops_batch_dimension() {
    let tensor = RawTensorOutput::from_batched(&[1, 16, 4], vec![0.0; 64]).unwrap();
    assert_eq!(tensor.shape(), (16, 4));
    assert!(RawTensorOutput::from_batched(&[2, 16, 4], vec![0.0; 128]).is_err());
  }

  #[test]
  fn shape_must_match_config() {
    let config = DetectionConfig::meter_default();
    assert!(RawTensorOutput::zeros(16, 8400).check_shape(&config).is_ok());
    assert_eq!(
      RawTensorOutput::zeros(84, 8400).check_shape(&config),
      Err(ShapeMismatchError::Shape {
        rows: 84,
        cols: 8400,
        expected_rows: 16,
        expected_cols: 8400
      })
    );
    assert!(RawTensorOutput::zeros(16, 2100).check_shape(&config).is_err());
  }

  #[test]
  fn set_anchor_writes_column() {
    let mut tensor = RawTensorOutput::zeros(6, 3);
    tensor.set_anchor(1, [0.1, 0.2, 0.3, 0.4], &[0.5, 0.6]);
    assert_eq!(tensor.row(0), &[0.0, 0.1, 0.0]);
    assert_eq!(tensor.row(5), &[0.0, 0.6, 0.0]);
  }
}
