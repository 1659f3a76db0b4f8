//! 로그 전송 서브시스템
//!
//! 한 번의 로그 호출을 텍스트/JSON 두 형식으로 포매팅해 켜진 출력 대상으로 분배합니다.
//!
//! # 주요 기능
//! - **출력 라우팅**: 콘솔, 날짜별 로컬 파일, 원격 수집 서버 조합
//! - **원격 전송**: 고정 용량 큐와 재시도하는 HTTP 리포터 워커
//! - **자정 회전**: 매일 00:00:05 에 새 날짜 파일로 교체
//! - **보관**: 보조 로그 분할, 지난 날짜 파일 `.tar.gz` 압축
//!
//! # 사용 예시
//! ```no_run
//! use logship::logging::{init_logging, LoggingConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let logger = init_logging(LoggingConfig::from_env()).await?;
//!
//!     logger.info().println("서버 시작").await;
//!     logger.error().println(format!("연결 실패: {}", "timeout")).await;
//!
//!     logger.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod archiver;
pub mod clock;
pub mod config;
pub mod error;
pub mod formatter;
pub mod handle;
pub mod pipeline;
pub mod queue;
pub mod reporter;
pub mod rotation;
pub mod router;
pub mod sink;
pub mod system;

pub use archiver::{ArchiveReport, Archiver};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ArchiveTarget, Backoff, FormatMode, LoggingConfig, RemoteConfig, RetryPolicy};
pub use error::{exit_process_hook, ArchiveError, ConfigError, DeliveryError, FatalHook};
pub use formatter::{LogEntry, LogFormatter, LogLevel};
pub use handle::{LevelHandles, LogHandle};
pub use pipeline::Pipeline;
pub use queue::{DeliveryQueue, QueuedLine};
pub use reporter::{HttpTransport, RemoteAck, RemoteEnvelope, ReportTransport, ReporterPool};
pub use rotation::{next_rotation, RotationScheduler};
pub use sink::{ConsoleSink, FileSink, LogSink, MemorySink};
pub use system::{
    global_logger, init_global_logging, log_debug, log_error, log_info, log_warn, LoggingState,
    LoggingSystem, LoggingSystemBuilder,
};

use anyhow::Result;

/// 로깅 시스템 초기화 함수
///
/// 설정을 검증하고 최초 초기화(파일 열기, 라우터 구성, 보관)를 마친 뒤
/// 원격 리포터와 회전 스케줄러를 띄웁니다.
///
/// # Examples
/// ```no_run
/// use logship::logging::{init_logging, LoggingConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let logger = init_logging(LoggingConfig::default()).await?;
///     logger.info().println("gRPC 서버 시작됨").await;
///     Ok(())
/// }
/// ```
pub async fn init_logging(config: LoggingConfig) -> Result<LoggingSystem> {
    LoggingSystem::start(config).await
}
