//! 로깅 파이프라인
//!
//! 설정, 전송 큐, 두 출력 채널, 회전 상태를 한 곳에서 소유합니다.
//! 초기화와 회전은 같은 절차를 따릅니다.
//!
//! 1. 채널 쓰기 잠금 획득 (진행 중인 기록이 끝날 때까지 대기)
//! 2. 이전 날짜 파일 닫기
//! 3. 오늘 날짜 파일 열기, 라우터 재구성, 채널 교체
//! 4. 잠금 해제 후 보관기 실행

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::logging::archiver::{ensure_dir, ArchiveReport, Archiver};
use crate::logging::clock::{date_string, Clock};
use crate::logging::config::{FormatMode, LoggingConfig};
use crate::logging::error::FatalHook;
use crate::logging::formatter::{LogEntry, LogFormatter, LogLevel};
use crate::logging::queue::DeliveryQueue;
use crate::logging::rotation::RotationTarget;
use crate::logging::router::{compose, Channels, RouteInputs};
use crate::logging::sink::{FileSink, LogSink, QueueSink};

/// 회전 상태
#[derive(Default)]
pub struct RotationState {
    /// 현재 로그 파일의 날짜
    pub current_date: Option<NaiveDate>,
    /// 다음 회전 예정 시각
    pub next_rotation: Option<DateTime<Local>>,
    /// 현재 열려 있는 로그 파일
    pub active_file: Option<Arc<FileSink>>,
}

/// 로깅 파이프라인
pub struct Pipeline {
    config: LoggingConfig,
    clock: Arc<dyn Clock>,
    channels: Channels,
    queue: Option<DeliveryQueue>,
    console: Option<Arc<dyn LogSink>>,
    archiver: Option<Arc<Archiver>>,
    text_formatter: LogFormatter,
    json_formatter: LogFormatter,
    state: Mutex<RotationState>,
    fatal_hook: FatalHook,
}

impl Pipeline {
    /// 새 파이프라인 생성. 채널은 `initialize` 전까지 모든 입력을 버립니다.
    pub fn new(
        config: LoggingConfig,
        clock: Arc<dyn Clock>,
        console: Option<Arc<dyn LogSink>>,
        queue: Option<DeliveryQueue>,
        fatal_hook: FatalHook,
    ) -> Result<Self> {
        let archiver = if config.store_local_file {
            Some(Arc::new(
                Archiver::new(&config.log_dir, &config.archive_targets)
                    .context("보관 파일 이름 패턴 생성 실패")?,
            ))
        } else {
            None
        };

        Ok(Self {
            config,
            clock,
            channels: Channels::new(),
            queue,
            console,
            archiver,
            text_formatter: LogFormatter::new(FormatMode::Text),
            json_formatter: LogFormatter::new(FormatMode::Json),
            state: Mutex::new(RotationState::default()),
            fatal_hook,
        })
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    pub fn queue(&self) -> Option<&DeliveryQueue> {
        self.queue.as_ref()
    }

    /// 오늘 날짜 로그 파일 경로: `<log_dir>/<YYYY-MM-DD>.log`
    pub fn log_file_path(&self, date: NaiveDate) -> PathBuf {
        self.config
            .log_dir
            .join(format!("{}.log", date_string(date)))
    }

    pub async fn current_date(&self) -> Option<NaiveDate> {
        self.state.lock().await.current_date
    }

    /// 스케줄러가 확정한 다음 회전 시각
    pub async fn next_rotation(&self) -> Option<DateTime<Local>> {
        self.state.lock().await.next_rotation
    }

    pub async fn active_file_path(&self) -> Option<PathBuf> {
        self.state
            .lock()
            .await
            .active_file
            .as_ref()
            .map(|file| file.path().to_path_buf())
    }

    /// 오늘 날짜 기준으로 출력 대상을 다시 구성하고 보관기를 실행
    pub async fn initialize(&self) -> Result<Option<ArchiveReport>> {
        let mut state = self.state.lock().await;
        let today = self.clock.today();

        {
            let mut guard = self.channels.lock_for_swap().await;
            if let Err(e) = guard.flush_current().await {
                warn!(error = %e, "이전 출력 대상 플러시 실패");
            }

            if let Some(old) = state.active_file.take() {
                old.close()
                    .await
                    .with_context(|| format!("로그 파일 닫기 실패: {}", old.path().display()))?;
                debug!(path = %old.path().display(), "이전 로그 파일 닫힘");
            }

            let file = if self.config.store_local_file {
                Some(Arc::new(self.open_log_file(today).await?))
            } else {
                None
            };

            guard.install(compose(&RouteInputs {
                console: self.console.clone(),
                file: file.clone().map(|f| f as Arc<dyn LogSink>),
                queue: self
                    .queue
                    .clone()
                    .map(|q| Arc::new(QueueSink::new(q)) as Arc<dyn LogSink>),
                format: self.config.format,
            }));

            state.current_date = Some(today);
            state.active_file = file;
        }

        info!(
            date = %date_string(today),
            generation = self.channels.generation(),
            "로깅 파이프라인 초기화 완료"
        );

        self.archive(today).await
    }

    async fn open_log_file(&self, today: NaiveDate) -> Result<FileSink> {
        let log_dir = self.config.log_dir.clone();
        tokio::task::spawn_blocking(move || ensure_dir(&log_dir))
            .await
            .context("로그 디렉토리 생성 작업 실패")?
            .with_context(|| {
                format!("로그 디렉토리 생성 실패: {}", self.config.log_dir.display())
            })?;

        let path = self.log_file_path(today);
        FileSink::open(&path)
            .await
            .with_context(|| format!("로그 파일 열기 실패: {}", path.display()))
    }

    async fn archive(&self, today: NaiveDate) -> Result<Option<ArchiveReport>> {
        let Some(archiver) = &self.archiver else {
            return Ok(None);
        };

        // 블로킹 I/O 는 전용 스레드에서 수행
        let archiver = archiver.clone();
        let report = tokio::task::spawn_blocking(move || archiver.run(today))
            .await
            .context("보관 작업 실패")?
            .context("지난 로그 보관 실패")?;
        Ok(Some(report))
    }

    /// 한 항목을 두 형식으로 포매팅해 두 채널에 기록
    ///
    /// 기록 실패는 호출자에게 전달되지 않고 표준 에러에 남습니다.
    pub async fn emit(&self, entry: LogEntry) {
        if entry.level < self.config.min_level {
            return;
        }

        for (channel, formatter) in [
            (&self.channels.text, &self.text_formatter),
            (&self.channels.json, &self.json_formatter),
        ] {
            let line = match formatter.format(&entry) {
                Ok(line) => line,
                Err(e) => {
                    eprintln!("로그 포매팅 실패: {}", e);
                    continue;
                }
            };
            if let Err(e) = channel.write_line(&line).await {
                eprintln!("로그 작성 실패: {}", e);
            }
        }
    }

    /// 두 채널의 버퍼 기록
    pub async fn flush(&self) -> Result<()> {
        self.channels.text.flush().await.context("텍스트 채널 플러시 실패")?;
        self.channels.json.flush().await.context("JSON 채널 플러시 실패")?;
        Ok(())
    }

    /// 치명적 수준 처리: 채널을 비운 뒤 훅 호출
    pub async fn terminate(&self, level: LogLevel, message: &str) {
        if let Err(e) = self.flush().await {
            eprintln!("로그 플러시 실패: {:#}", e);
        }
        (self.fatal_hook)(&format!("{} 수준 로그: {}", level.as_str(), message));
    }

    /// 파일을 닫고 채널을 버림 대상으로 되돌림
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut guard = self.channels.lock_for_swap().await;
        if let Err(e) = guard.flush_current().await {
            warn!(error = %e, "출력 대상 플러시 실패");
        }
        guard.install(compose(&RouteInputs {
            console: None,
            file: None,
            queue: None,
            format: self.config.format,
        }));

        if let Some(file) = state.active_file.take() {
            file.close()
                .await
                .with_context(|| format!("로그 파일 닫기 실패: {}", file.path().display()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl RotationTarget for Pipeline {
    fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    async fn armed(&self, next: DateTime<Local>) {
        self.state.lock().await.next_rotation = Some(next);
    }

    async fn rotate(&self) -> Result<()> {
        info!("로그 파일 회전 시작");
        self.initialize().await.map(|_| ())
    }
}
