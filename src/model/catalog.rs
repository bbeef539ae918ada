// 该文件是 Dubiao （读表） 项目的一部分。
// src/model/catalog.rs - 模型目录元数据
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

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelCatalogError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("目录解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("模型文件名重复: {0}")]
  Duplicate(String),
}

/// 由外部提供的模型描述，不从文件名推断
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
  pub file_name: String,
  pub display_name: String,
  #[serde(default)]
  pub description: String,
  pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
  models: Vec<ModelInfo>,
}

impl ModelCatalog {
  pub fn new(models: Vec<ModelInfo>) -> Result<Self, ModelCatalogError> {
    for (i, model) in models.iter().enumerate() {
      if models[..i].iter().any(|m| m.file_name == model.file_name) {
        return Err(ModelCatalogError::Duplicate(model.file_name.clone()));
      }
    }
    Ok(Self { models })
  }

  pub fn from_json_str(text: &str) -> Result<Self, ModelCatalogError> {
    let catalog: ModelCatalog = serde_json::from_str(text)?;
    Self::new(catalog.models)
  }

  pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ModelCatalogError> {
    let text = std::fs::read_to_string(path)?;
    Self::from_json_str(&text)
  }

  pub fn find(&self, file_name: &str) -> Option<&ModelInfo> {
    self.models.iter().find(|m| m.file_name == file_name)
  }

  /// 按路径中的文件名查找，目录部分不参与匹配
  pub fn find_by_path<P: AsRef<Path>>(&self, path: P) -> Option<&ModelInfo> {
    let file_name = path.as_ref().file_name()?.to_str()?;
    self.find(file_name)
  }

  pub fn models(&self) -> &[ModelInfo] {
    &self.models
  }
}
