// 该文件是 Dubiao （读表） 项目的一部分。
// src/task.rs - 任务调度
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
  sync::mpsc::Receiver,
  time::{Duration, Instant},
};

use anyhow::Context;
use tracing::{error, info, warn};

use crate::{
  geometry::ImageSpace,
  input::SourceFrame,
  model::{DetectResult, DetectionConfig, Model},
  output::Render,
  pipeline::run_detection,
};

/// 一次任务的统计
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TaskSummary {
  pub frames: usize,
  pub failures: usize,
  /// `(帧名, 读数)`
  pub readings: Vec<(String, String)>,
}

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<TaskSummary, Self::Error>;
}

/// 只处理第一帧
pub struct OneShotTask {
  config: DetectionConfig,
}

impl OneShotTask {
  pub fn new(config: DetectionConfig) -> Self {
    Self { config }
  }
}

impl<IE, RE, I, M, O> Task<I, M, O> for OneShotTask
where
  IE: std::error::Error + Send + Sync + 'static,
  RE: std::error::Error + Send + Sync + 'static,
  I: Iterator<Item = Result<SourceFrame, IE>>,
  M: Model,
  O: Render<SourceFrame, DetectResult<ImageSpace>, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let frame = input
      .next()
      .ok_or_else(|| anyhow::anyhow!("没有输入帧"))?
      .context("读取输入帧失败")?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let result = run_detection(&frame.image, &model, &self.config)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;

    Ok(TaskSummary {
      frames: 1,
      failures: 0,
      readings: vec![(frame.name, result.reading)],
    })
  }
}

/// 依次处理所有帧；单帧失败记录后继续
pub struct BatchTask {
  config: DetectionConfig,
  frame_number: Option<usize>,
  interrupt: Option<Receiver<()>>,
}

impl BatchTask {
  pub fn new(config: DetectionConfig) -> Self {
    Self {
      config,
      frame_number: None,
      interrupt: None,
    }
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 收到消息后在当前帧处理完毕时退出
  pub fn with_interrupt(mut self, interrupt: Receiver<()>) -> Self {
    self.interrupt = Some(interrupt);
    self
  }
}

impl<IE, RE, I, M, O> Task<I, M, O> for BatchTask
where
  IE: std::error::Error + Send + Sync + 'static,
  RE: std::error::Error + Send + Sync + 'static,
  I: Iterator<Item = Result<SourceFrame, IE>>,
  M: Model,
  O: Render<SourceFrame, DetectResult<ImageSpace>, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let mut summary = TaskSummary::default();

    loop {
      if let Some(rx) = &self.interrupt
        && rx.try_recv().is_ok()
      {
        warn!("中断信号接收，退出任务循环");
        break;
      }
      // 先检查帧数再读取，达到上限后不再解码下一帧
      if self.frame_number.is_some_and(|n| summary.frames >= n) {
        info!("达到指定帧数 {}, 退出任务循环", summary.frames);
        break;
      }
      let Some(frame) = input.next() else {
        break;
      };
      summary.frames += 1;

      let frame = match frame {
        Ok(frame) => frame,
        Err(e) => {
          error!("读取第 {} 帧失败: {}", summary.frames, e);
          summary.failures += 1;
          continue;
        }
      };

      let now = Instant::now();
      let result = match run_detection(&frame.image, &model, &self.config) {
        Ok(result) => result,
        Err(e) => {
          error!("{}: 检测失败: {}", frame.name, e);
          summary.failures += 1;
          continue;
        }
      };
      info!("{}: 推理完成，耗时: {:.2?}", frame.name, now.elapsed());

      output
        .render_result(&frame, &result)
        .with_context(|| format!("输出 {} 的结果失败", frame.name))?;
      summary.readings.push((frame.name, result.reading));
    }

    if summary.failures > 0 {
      warn!("共 {} 帧, 失败 {} 帧", summary.frames, summary.failures);
    }
    info!("任务完成，退出");
    Ok(summary)
  }
}

/// 重复处理同一帧，统计平均耗时
pub struct RepeatShotTask {
  config: DetectionConfig,
  repeat_times: usize,
}

const REPEAT_TIMES: usize = 1000;
const REPEAT_WARMUP: usize = 2;

impl RepeatShotTask {
  pub fn new(config: DetectionConfig) -> Self {
    Self {
      config,
      repeat_times: REPEAT_TIMES,
    }
  }

  pub fn with_repeat_times(mut self, repeat_times: usize) -> Self {
    self.repeat_times = repeat_times.max(1);
    self
  }
}

impl<IE, RE, I, M, O> Task<I, M, O> for RepeatShotTask
where
  IE: std::error::Error + Send + Sync + 'static,
  RE: std::error::Error + Send + Sync + 'static,
  I: Iterator<Item = Result<SourceFrame, IE>>,
  M: Model,
  O: Render<SourceFrame, DetectResult<ImageSpace>, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let frame = input
      .next()
      .ok_or_else(|| anyhow::anyhow!("没有输入帧"))?
      .context("读取输入帧失败")?;
    info!("输入帧获取成功，开始推理...");

    let mut times = Vec::with_capacity(self.repeat_times);
    let mut last = None;
    for i in 0..self.repeat_times {
      let now = Instant::now();
      let result = run_detection(&frame.image, &model, &self.config)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);
      last = Some(result);
    }

    let measured = if times.len() > REPEAT_WARMUP {
      &times[REPEAT_WARMUP..]
    } else {
      &times[..]
    };
    warn!(
      "平均推理时间: {:.2?}",
      measured.iter().sum::<Duration>() / measured.len() as u32
    );

    let mut summary = TaskSummary {
      frames: 1,
      ..Default::default()
    };
    if let Some(result) = last {
      output.render_result(&frame, &result)?;
      summary.readings.push((frame.name, result.reading));
    }
    Ok(summary)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::ModelInput,
    input::InputError,
    model::{FnModel, InferenceError, RawTensorOutput},
  };
  use image::RgbImage;
  use std::{
    cell::{Cell, RefCell},
    convert::Infallible,
  };

  #[derive(Default)]
  struct Collect(RefCell<Vec<String>>);

  impl Render<SourceFrame, DetectResult<ImageSpace>> for &Collect {
    type Error = std::io::Error;

    fn render_result(
      &self,
      frame: &SourceFrame,
      result: &DetectResult<ImageSpace>,
    ) -> Result<(), Self::Error> {
      self
        .0
        .borrow_mut()
        .push(format!("{}={}", frame.name, result.reading));
      Ok(())
    }
  }

  fn frame(name: &str) -> SourceFrame {
    SourceFrame {
      name: name.to_string(),
      image: RgbImage::new(16, 8),
    }
  }

  fn config() -> DetectionConfig {
    DetectionConfig::builder()
      .input_size(16)
      .num_anchors(1)
      .build()
      .unwrap()
  }

  fn one_digit_model() -> FnModel<impl Fn(&ModelInput) -> Result<RawTensorOutput, InferenceError>> {
    FnModel::new(|_| {
      let mut output = RawTensorOutput::zeros(16, 1);
      let mut scores = [0.0; 12];
      scores[8] = 0.9;
      output.set_anchor(0, [0.5, 0.5, 0.2, 0.2], &scores);
      Ok(output)
    })
  }

  #[test]
  fn oneshot_reads_first_frame() {
    let sink = Collect::default();
    let input = vec![Ok::<_, Infallible>(frame("a")), Ok(frame("b"))].into_iter();
    let summary = OneShotTask::new(config())
      .run_task(input, one_digit_model(), &sink)
      .unwrap();
    assert_eq!(summary.readings, [("a".to_string(), "7".to_string())]);
    assert_eq!(sink.0.borrow().as_slice(), ["a=7"]);
  }

  #[test]
  fn oneshot_without_frames_fails() {
    let sink = Collect::default();
    let input = std::iter::empty::<Result<SourceFrame, Infallible>>();
    assert!(
      OneShotTask::new(config())
        .run_task(input, one_digit_model(), &sink)
        .is_err()
    );
  }

  #[test]
  fn batch_continues_after_failures() {
    let sink = Collect::default();
    let input = vec![
      Ok(frame("a")),
      Err(InputError::InvalidRoi("bad".to_string())),
      Ok(SourceFrame {
        name: "empty".to_string(),
        image: RgbImage::new(0, 0),
      }),
      Ok(frame("d")),
    ]
    .into_iter();
    let summary = BatchTask::new(config())
      .run_task(input, one_digit_model(), &sink)
      .unwrap();
    assert_eq!(summary.frames, 4);
    assert_eq!(summary.failures, 2);
    assert_eq!(sink.0.borrow().as_slice(), ["a=7", "d=7"]);
  }

  #[test]
  fn batch_respects_frame_limit() {
    let sink = Collect::default();
    let pulled = Cell::new(0);
    let input = (0..10).map(|i| {
      pulled.set(pulled.get() + 1);
      Ok::<_, Infallible>(frame(&i.to_string()))
    });
    let summary = BatchTask::new(config())
      .with_frame_number(Some(3))
      .run_task(input, one_digit_model(), &sink)
      .unwrap();
    assert_eq!(summary.frames, 3);
    assert_eq!(sink.0.borrow().len(), 3);
    assert_eq!(pulled.get(), 3);
  }

  #[test]
  fn batch_stops_on_interrupt() {
    let sink = Collect::default();
    let (tx, rx) = std::sync::mpsc::channel();
    let input = (0..10).map(|i| {
      if i == 2 {
        tx.send(()).unwrap();
      }
      Ok::<_, Infallible>(frame(&i.to_string()))
    });
    let summary = BatchTask::new(config())
      .with_interrupt(rx)
      .run_task(input, one_digit_model(), &sink)
      .unwrap();
    // 收到信号的那一帧处理完毕后退出
    assert_eq!(summary.frames, 3);
    assert_eq!(sink.0.borrow().as_slice(), ["0=7", "1=7", "2=7"]);
  }

  #[test]
  fn repeatshot_renders_once() {
    let sink = Collect::default();
    let input = vec![Ok::<_, Infallible>(frame("r"))].into_iter();
    let summary = RepeatShotTask::new(config())
      .with_repeat_times(5)
      .run_task(input, one_digit_model(), &sink)
      .unwrap();
    assert_eq!(summary.readings.len(), 1);
    assert_eq!(sink.0.borrow().len(), 1);
  }
}
