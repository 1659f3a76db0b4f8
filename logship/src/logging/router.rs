//! 출력 라우터
//!
//! 활성화된 출력 대상 조합으로 텍스트/JSON 두 채널의 팬아웃 출력 대상을 구성하고,
//! 회전 시 채널 뒤의 출력 대상을 잠금 아래에서 교체합니다.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::logging::config::FormatMode;
use crate::logging::sink::{DiscardSink, FanOutSink, LogSink};

/// 라우팅 입력: 켜진 출력 대상만 `Some`
#[derive(Clone)]
pub struct RouteInputs {
    pub console: Option<Arc<dyn LogSink>>,
    pub file: Option<Arc<dyn LogSink>>,
    pub queue: Option<Arc<dyn LogSink>>,
    pub format: FormatMode,
}

/// 채널별로 구성된 출력 대상
#[derive(Clone)]
pub struct Routes {
    pub text: Arc<dyn LogSink>,
    pub json: Arc<dyn LogSink>,
}

fn fan_out(members: Vec<Arc<dyn LogSink>>) -> Arc<dyn LogSink> {
    match members.len() {
        0 => Arc::new(DiscardSink),
        1 => members.into_iter().next().unwrap_or_else(|| Arc::new(DiscardSink)),
        _ => Arc::new(FanOutSink::new(members)),
    }
}

/// 두 채널의 출력 대상 구성
///
/// 로컬 출력(콘솔/파일)은 선택된 형식의 채널 하나에만 연결되고, 다른 채널은 버림 대상입니다.
/// 원격 큐는 항상 JSON 채널의 첫 번째 구성원입니다.
pub fn compose(inputs: &RouteInputs) -> Routes {
    let local: Vec<Arc<dyn LogSink>> = inputs
        .console
        .iter()
        .chain(inputs.file.iter())
        .cloned()
        .collect();

    match inputs.format {
        FormatMode::Json => {
            let mut members: Vec<Arc<dyn LogSink>> = inputs.queue.iter().cloned().collect();
            members.extend(local);
            Routes {
                text: Arc::new(DiscardSink),
                json: fan_out(members),
            }
        }
        FormatMode::Text => Routes {
            text: fan_out(local),
            json: fan_out(inputs.queue.iter().cloned().collect()),
        },
    }
}

/// 교체 가능한 채널
///
/// 기록하는 동안 읽기 잠금을 유지하므로, 교체(쓰기 잠금)는 진행 중인 기록이 끝난 뒤에 일어납니다.
pub struct Channel {
    active: RwLock<Arc<dyn LogSink>>,
}

impl Channel {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            active: RwLock::new(sink),
        }
    }

    pub async fn write_line(&self, line: &str) -> io::Result<()> {
        let active = self.active.read().await;
        active.write_line(line).await
    }

    pub async fn flush(&self) -> io::Result<()> {
        let active = self.active.read().await;
        active.flush().await
    }
}

/// 텍스트/JSON 채널 묶음
pub struct Channels {
    pub text: Channel,
    pub json: Channel,
    generation: AtomicU64,
}

impl Channels {
    /// 두 채널 모두 버림 대상으로 시작
    pub fn new() -> Self {
        Self {
            text: Channel::new(Arc::new(DiscardSink)),
            json: Channel::new(Arc::new(DiscardSink)),
            generation: AtomicU64::new(0),
        }
    }

    /// 구성이 설치된 횟수
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// 두 채널의 쓰기 잠금 획득. 가드가 살아 있는 동안 모든 기록이 대기합니다.
    pub async fn lock_for_swap(&self) -> SwapGuard<'_> {
        let text = self.text.active.write().await;
        let json = self.json.active.write().await;
        SwapGuard {
            text,
            json,
            generation: &self.generation,
        }
    }
}

impl Default for Channels {
    fn default() -> Self {
        Self::new()
    }
}

/// 채널 교체 중임을 나타내는 가드
pub struct SwapGuard<'a> {
    text: RwLockWriteGuard<'a, Arc<dyn LogSink>>,
    json: RwLockWriteGuard<'a, Arc<dyn LogSink>>,
    generation: &'a AtomicU64,
}

impl SwapGuard<'_> {
    /// 이전 출력 대상의 남은 데이터 기록
    pub async fn flush_current(&self) -> io::Result<()> {
        self.text.flush().await?;
        self.json.flush().await
    }

    /// 새 구성 설치
    pub fn install(&mut self, routes: Routes) {
        *self.text = routes.text;
        *self.json = routes.json;
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}
