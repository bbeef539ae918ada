// 该文件是 Dubiao （读表） 项目的一部分。
// src/bin/read.rs - 读表命令行入口
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
  path::{Path, PathBuf},
  sync::mpsc,
  thread,
  time::Duration,
};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use dubiao::{
  FromUrl,
  input::InputWrapper,
  model::{DetectionConfig, ModelCatalog, ReplayModel},
  output::OutputWrapper,
  task::{BatchTask, OneShotTask, Task},
};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
  /// 只处理第一帧
  Oneshot,
  /// 处理全部帧
  Batch,
}

/// Dubiao 读表参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型输出来源，如 `tensor:///path/out.bin?rows=16&anchors=8400`；省略时无可用模型
  #[arg(long, value_name = "MODEL")]
  pub model: Option<Url>,
  /// 输入来源，`image:` 或 `folder:`
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出方式，`log:`、`record:` 或 `image:`
  #[arg(long, value_name = "OUTPUT", default_value = "log:")]
  pub output: Url,
  /// JSON 配置文件
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,
  /// JSON 模型目录，按模型文件名查找模型描述
  #[arg(long, value_name = "FILE")]
  pub catalog: Option<PathBuf>,
  /// 覆盖置信度阈值
  #[arg(long)]
  pub confidence: Option<f32>,
  /// 覆盖 NMS IoU 阈值
  #[arg(long)]
  pub nms_threshold: Option<f32>,
  /// 最多处理的帧数
  #[arg(long)]
  pub max_frames: Option<usize>,
  #[arg(long, value_enum, default_value_t = Mode::Batch)]
  pub mode: Mode,
}

fn load_config(
  path: Option<&PathBuf>,
  confidence: Option<f32>,
  nms_threshold: Option<f32>,
) -> Result<DetectionConfig> {
  let config = match path {
    Some(path) => DetectionConfig::from_json_file(path)
      .with_context(|| format!("读取配置文件 {} 失败", path.display()))?,
    None => DetectionConfig::meter_default(),
  };
  if confidence.is_none() && nms_threshold.is_none() {
    return Ok(config);
  }
  let mut builder = config.to_builder();
  if let Some(confidence) = confidence {
    builder = builder.score_threshold(confidence);
  }
  if let Some(nms_threshold) = nms_threshold {
    builder = builder.iou_threshold(nms_threshold);
  }
  Ok(builder.build()?)
}

fn describe_model(catalog: &Path, model: &Url) -> Result<()> {
  let catalog = ModelCatalog::from_json_file(catalog)
    .with_context(|| format!("读取模型目录 {} 失败", catalog.display()))?;
  match catalog.find_by_path(model.path()) {
    Some(info) => info!(
      "模型: {} (版本 {}) {}",
      info.display_name, info.version, info.description
    ),
    None => warn!("模型目录中没有 {} 的描述", model.path()),
  }
  Ok(())
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  info!("模型来源: {:?}", args.model.as_ref().map(Url::as_str));
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let config = load_config(args.config.as_ref(), args.confidence, args.nms_threshold)?;
  info!(
    "输入尺寸 {}, 类别数 {}, 置信度阈值 {}, IoU 阈值 {}",
    config.input_size(),
    config.num_classes(),
    config.score_threshold(),
    config.iou_threshold()
  );

  if let (Some(catalog), Some(model)) = (&args.catalog, &args.model) {
    describe_model(catalog, model)?;
  }

  let input = InputWrapper::from_url(&args.input)?;
  let model = args.model.as_ref().map(ReplayModel::from_url).transpose()?;
  let output = OutputWrapper::from_url(&args.output)?.with_class_names(config.class_names());

  let summary = match args.mode {
    Mode::Oneshot => OneShotTask::new(config).run_task(input, model, output)?,
    Mode::Batch => {
      let (tx, rx) = mpsc::channel();
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        let _ = tx.send(());
        thread::spawn(|| {
          thread::sleep(Duration::from_secs(30));
          warn!("强制退出程序");
          std::process::exit(1);
        });
      })
      .context("设置 Ctrl-C 处理函数失败")?;

      BatchTask::new(config)
        .with_frame_number(args.max_frames)
        .with_interrupt(rx)
        .run_task(input, model, output)?
    }
  };

  for (name, reading) in &summary.readings {
    println!("{name}\t{reading}");
  }
  info!("共 {} 帧, 失败 {} 帧", summary.frames, summary.failures);

  Ok(())
}
