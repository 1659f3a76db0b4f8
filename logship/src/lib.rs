//! logship - 내장형 로그 전송 서브시스템
//!
//! 애플리케이션 호출 지점에서 만들어진 로그 라인을 콘솔, 날짜별 로컬 파일,
//! 원격 수집 서버로 분배하고, 지난 로그 파일을 압축 보관합니다.

pub mod logging;

pub use logging::{
    global_logger, init_global_logging, init_logging, log_debug, log_error, log_info, log_warn,
    ArchiveTarget, FormatMode, LogHandle, LogLevel, LoggingConfig, LoggingSystem, RemoteConfig,
    RetryPolicy,
};
