//! In-process capability stubs shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use quill::adapters::{ImageGenerator, TextGenerator};
use quill::core::{BatchSettings, ImageClient, ProgressEmitter, Sleeper};
use quill::domain::{ImageGenerationResult, ImageSize, ProgressEvent};
use tokio::sync::mpsc;

/// Text generator answering from a fixed script, one response per call
pub struct ScriptedText {
    responses: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
}

impl ScriptedText {
    pub fn new(responses: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedText {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _model: &str, _system: &str, _user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(anyhow::anyhow!(e)),
            None => anyhow::bail!("no scripted response left"),
        }
    }
}

/// Text generator that never answers
pub struct StalledText;

#[async_trait]
impl TextGenerator for StalledText {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn generate(&self, _model: &str, _system: &str, _user: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        anyhow::bail!("unreachable in tests")
    }
}

/// Image generator that fails a configurable number of times per prompt
/// marker, then succeeds with a URL derived from the call number.
pub struct StubImages {
    fail_marker: Option<String>,
    failures_before_success: usize,
    calls: AtomicUsize,
    marker_calls: AtomicUsize,
}

impl StubImages {
    /// Always succeeds
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self {
            fail_marker: None,
            failures_before_success: 0,
            calls: AtomicUsize::new(0),
            marker_calls: AtomicUsize::new(0),
        })
    }

    /// Prompts containing `marker` fail `failures` times before succeeding
    pub fn failing_on(marker: &str, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_marker: Some(marker.to_string()),
            failures_before_success: failures,
            calls: AtomicUsize::new(0),
            marker_calls: AtomicUsize::new(0),
        })
    }

    /// Prompts containing `marker` never succeed
    pub fn broken_on(marker: &str) -> Arc<Self> {
        Self::failing_on(marker, usize::MAX)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for StubImages {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, prompt: &str, _size: ImageSize, _n: u32) -> Result<ImageGenerationResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(marker) = &self.fail_marker {
            if prompt.contains(marker.as_str()) {
                let seen = self.marker_calls.fetch_add(1, Ordering::SeqCst);
                if seen < self.failures_before_success {
                    anyhow::bail!("provider rejected request {}", seen + 1);
                }
            }
        }

        Ok(ImageGenerationResult::ok(format!("https://img.test/{}.png", call)))
    }
}

/// Image generator that never answers
#[derive(Default)]
pub struct StalledImages {
    calls: AtomicUsize,
}

impl StalledImages {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for StalledImages {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn generate(&self, _prompt: &str, _size: ImageSize, _n: u32) -> Result<ImageGenerationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        anyhow::bail!("unreachable in tests")
    }
}

/// Sleeper that records requested waits and returns immediately
#[derive(Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

/// Image client over a stub generator with instant sleeps
pub fn image_client(generator: Arc<StubImages>, sleeper: Arc<RecordingSleeper>) -> ImageClient {
    ImageClient::new(generator)
        .with_sleeper(sleeper)
        .with_batch(BatchSettings {
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        })
}

/// Everything the emitter delivered so far
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn kinds(events: &[ProgressEvent]) -> Vec<&'static str> {
    events.iter().map(ProgressEvent::kind).collect()
}

pub fn emitter() -> (ProgressEmitter, mpsc::UnboundedReceiver<ProgressEvent>) {
    ProgressEmitter::channel(tokio_util::sync::CancellationToken::new())
}

/// Article response in the shape the text model is asked for
pub fn article_json(title: &str, summary: &str, paragraphs: &[&str]) -> String {
    serde_json::json!({
        "title": title,
        "summary": summary,
        "content": paragraphs.join("\n\n"),
    })
    .to_string()
}

/// Six distinct body paragraphs
pub fn six_paragraphs() -> Vec<&'static str> {
    vec![
        "远程办公已经从疫情期间的权宜之计，演变成许多公司长期采用的工作方式。",
        "数据显示，超过六成的知识工作者希望每周至少有两天可以在家办公。",
        "然而，团队协作的隐性成本往往被低估，沟通延迟和信息孤岛逐渐显现。",
        "一些公司开始尝试混合办公模式，在固定的协作日集中安排会议和讨论。",
        "管理者需要从监督过程转向衡量结果，用清晰的目标替代工位上的在场。",
        "未来的办公室更像是一个社交与协作的枢纽，而不是每天必须打卡的地方。",
    ]
}
