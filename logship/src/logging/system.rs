//! 통합 로깅 시스템
//!
//! 파이프라인, 원격 리포터 풀, 회전 스케줄러를 묶어 관리하는 메인 시스템입니다.

use anyhow::{Context, Result};
use std::fmt::Display;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::logging::clock::{Clock, SystemClock};
use crate::logging::config::LoggingConfig;
use crate::logging::error::{exit_process_hook, FatalHook};
use crate::logging::formatter::{LogEntry, LogLevel};
use crate::logging::handle::{LevelHandles, LogHandle};
use crate::logging::pipeline::Pipeline;
use crate::logging::queue::DeliveryQueue;
use crate::logging::reporter::{HttpTransport, ReportTransport, ReporterPool};
use crate::logging::rotation::RotationScheduler;
use crate::logging::sink::{ConsoleSink, LogSink};

/// 로깅 시스템 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingState {
    /// 실행 중
    Running,
    /// 종료됨
    Shutdown,
}

/// 로깅 시스템 구성기
///
/// 시계, 콘솔 출력 대상, 원격 전송 계층, 치명적 훅을 바꿔 끼울 수 있습니다.
pub struct LoggingSystemBuilder {
    config: LoggingConfig,
    clock: Arc<dyn Clock>,
    console: Option<Arc<dyn LogSink>>,
    transport: Option<Arc<dyn ReportTransport>>,
    fatal_hook: FatalHook,
}

impl LoggingSystemBuilder {
    pub fn new(config: LoggingConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            console: None,
            transport: None,
            fatal_hook: exit_process_hook(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 콘솔 출력이 켜져 있을 때 표준 출력 대신 쓸 출력 대상
    pub fn with_console_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.console = Some(sink);
        self
    }

    /// 원격 전송이 켜져 있을 때 HTTP 대신 쓸 전송 계층
    pub fn with_transport(mut self, transport: Arc<dyn ReportTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_fatal_hook(mut self, hook: FatalHook) -> Self {
        self.fatal_hook = hook;
        self
    }

    /// 설정 검증, 최초 초기화, 백그라운드 태스크 시작
    pub async fn start(self) -> Result<LoggingSystem> {
        let config = self.config;
        config.validate().context("로깅 설정 유효성 검증 실패")?;

        let queue = config
            .store_remote
            .then(|| DeliveryQueue::new(config.remote.queue_capacity));

        let console = if config.std_output {
            Some(
                self.console
                    .unwrap_or_else(|| Arc::new(ConsoleSink::new()) as Arc<dyn LogSink>),
            )
        } else {
            None
        };

        let transport = match (&queue, self.transport) {
            (Some(_), Some(transport)) => Some(transport),
            (Some(_), None) => Some(Arc::new(
                HttpTransport::from_config(&config.remote).context("HTTP 클라이언트 생성 실패")?,
            ) as Arc<dyn ReportTransport>),
            (None, _) => None,
        };

        let pipeline = Arc::new(Pipeline::new(
            config.clone(),
            self.clock,
            console,
            queue.clone(),
            self.fatal_hook.clone(),
        )?);
        pipeline
            .initialize()
            .await
            .context("로깅 시스템 초기화 실패")?;

        let reporter = match (queue, transport) {
            (Some(queue), Some(transport)) => Some(ReporterPool::spawn(
                config.remote.effective_reporter_num(),
                queue,
                transport,
                config.remote.retry.clone(),
                self.fatal_hook.clone(),
            )),
            _ => None,
        };

        let cancel = CancellationToken::new();
        let scheduler = config.store_local_file.then(|| {
            RotationScheduler::spawn(pipeline.clone(), cancel.child_token(), self.fatal_hook.clone())
        });

        info!(
            std_output = config.std_output,
            store_local_file = config.store_local_file,
            store_remote = config.store_remote,
            format = config.format.as_str(),
            log_dir = %config.log_dir.display(),
            "로깅 시스템 시작됨"
        );

        Ok(LoggingSystem {
            handles: LevelHandles::new(&pipeline),
            pipeline,
            reporter: Mutex::new(reporter),
            scheduler: Mutex::new(scheduler),
            cancel,
            state: RwLock::new(LoggingState::Running),
        })
    }
}

/// 통합 로깅 시스템
pub struct LoggingSystem {
    pipeline: Arc<Pipeline>,
    handles: LevelHandles,
    reporter: Mutex<Option<ReporterPool>>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    state: RwLock<LoggingState>,
}

impl LoggingSystem {
    /// 기본 구성으로 시작
    pub async fn start(config: LoggingConfig) -> Result<Self> {
        LoggingSystemBuilder::new(config).start().await
    }

    pub fn builder(config: LoggingConfig) -> LoggingSystemBuilder {
        LoggingSystemBuilder::new(config)
    }

    pub fn debug(&self) -> &LogHandle {
        &self.handles.debug
    }

    pub fn info(&self) -> &LogHandle {
        &self.handles.info
    }

    pub fn warn(&self) -> &LogHandle {
        &self.handles.warn
    }

    pub fn error(&self) -> &LogHandle {
        &self.handles.error
    }

    pub fn fatal(&self) -> &LogHandle {
        &self.handles.fatal
    }

    /// 다섯 레벨 핸들 복제본
    pub fn handles(&self) -> LevelHandles {
        self.handles.clone()
    }

    /// 임의 레벨 핸들
    pub fn handle(&self, level: LogLevel) -> LogHandle {
        LogHandle::new(level, self.pipeline.clone())
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// 원격 전송 큐 (원격 전송이 꺼져 있으면 `None`)
    pub fn queue(&self) -> Option<&DeliveryQueue> {
        self.pipeline.queue()
    }

    /// 즉시 플러시
    pub async fn flush(&self) -> Result<()> {
        self.pipeline.flush().await
    }

    /// 시스템 상태 반환
    pub async fn state(&self) -> LoggingState {
        *self.state.read().await
    }

    /// 로깅 시스템 종료
    ///
    /// 회전 스케줄러와 리포터 워커를 멈추고 로그 파일을 닫습니다.
    /// 큐에 남은 라인은 전송되지 않습니다.
    pub async fn shutdown(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state == LoggingState::Shutdown {
            return Ok(());
        }

        self.cancel.cancel();
        if let Some(scheduler) = self.scheduler.lock().await.take() {
            if let Err(e) = scheduler.await {
                error!(error = %e, "회전 스케줄러 종료 실패");
            }
        }

        if let Some(reporter) = self.reporter.lock().await.take() {
            debug!(workers = reporter.worker_count(), "원격 리포터 종료 중");
            reporter.shutdown().await;
        }

        self.pipeline.close().await.context("로그 파일 닫기 실패")?;

        *state = LoggingState::Shutdown;
        info!("로깅 시스템 종료됨");

        Ok(())
    }
}

/// 전역 로깅 시스템 인스턴스 (싱글톤)
static GLOBAL_LOGGER: tokio::sync::OnceCell<Arc<LoggingSystem>> = tokio::sync::OnceCell::const_new();

/// 전역 로깅 시스템 초기화
///
/// 동시에 호출되어도 시스템은 하나만 시작되고, 나머지 호출은 오류를 돌려받습니다.
pub async fn init_global_logging(config: LoggingConfig) -> Result<()> {
    let mut started = false;
    let started_here = &mut started;

    GLOBAL_LOGGER
        .get_or_try_init(|| async move {
            *started_here = true;
            LoggingSystem::start(config).await.map(Arc::new)
        })
        .await?;

    if !started {
        return Err(anyhow::anyhow!("전역 로깅 시스템이 이미 초기화됨"));
    }
    Ok(())
}

/// 전역 로깅 시스템 가져오기
pub fn global_logger() -> Option<Arc<LoggingSystem>> {
    GLOBAL_LOGGER.get().cloned()
}

async fn log_global(level: LogLevel, location: &'static Location<'static>, message: String) {
    if let Some(logger) = global_logger() {
        logger.pipeline.emit(LogEntry::at(level, location, message)).await;
    }
}

/// 편의 함수들 (전역 인스턴스가 없으면 아무것도 하지 않음)
#[track_caller]
pub fn log_debug<M: Display>(message: M) -> impl Future<Output = ()> {
    log_global(LogLevel::Debug, Location::caller(), message.to_string())
}

#[track_caller]
pub fn log_info<M: Display>(message: M) -> impl Future<Output = ()> {
    log_global(LogLevel::Info, Location::caller(), message.to_string())
}

#[track_caller]
pub fn log_warn<M: Display>(message: M) -> impl Future<Output = ()> {
    log_global(LogLevel::Warn, Location::caller(), message.to_string())
}

#[track_caller]
pub fn log_error<M: Display>(message: M) -> impl Future<Output = ()> {
    log_global(LogLevel::Error, Location::caller(), message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::config::FormatMode;
    use crate::logging::sink::MemorySink;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = LoggingConfig {
            store_remote: true,
            ..Default::default()
        };
        let result = LoggingSystem::start(config).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_start_and_shutdown_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let console = Arc::new(MemorySink::new());
        let config = LoggingConfig {
            store_local_file: true,
            format: FormatMode::Text,
            log_dir: temp_dir.path().to_path_buf(),
            ..Default::default()
        };

        let system = LoggingSystem::builder(config)
            .with_console_sink(console.clone())
            .with_fatal_hook(Arc::new(|_: &str| {}))
            .start()
            .await
            .unwrap();
        assert_eq!(system.state().await, LoggingState::Running);
        assert!(system.queue().is_none());

        system.info().println("hello").await;
        system.handle(LogLevel::Trace).println("below minimum").await;
        system.flush().await.unwrap();
        assert_eq!(console.len().await, 1);

        system.shutdown().await.unwrap();
        assert_eq!(system.state().await, LoggingState::Shutdown);
        assert!(system.pipeline().active_file_path().await.is_none());

        // 두 번째 종료는 아무것도 하지 않음
        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_log_functions_without_global_are_noop() {
        log_info("nobody listening").await;
        log_error(42).await;
    }
}
