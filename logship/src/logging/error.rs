//! 로깅 서브시스템 에러 정의
//!
//! 복구 가능한 전송 실패, 치명적 인증 실패, 로컬 I/O 실패를 구분합니다.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// 설정 검증 에러
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("원격 전송이 켜져 있지만 수집 서버 URL이 비어 있습니다")]
    MissingRemoteUrl,

    #[error("잘못된 수집 서버 URL: {url} ({reason})")]
    InvalidRemoteUrl { url: String, reason: String },

    #[error("전송 큐 용량은 0보다 커야 합니다")]
    ZeroQueueCapacity,

    #[error("HTTP 타임아웃은 0보다 커야 합니다")]
    ZeroTimeout,

    #[error("보관 대상 이름이 잘못되었습니다: {0:?}")]
    InvalidTargetName(String),

    #[error("보관 대상 이름 중복: {0}")]
    DuplicateTarget(String),
}

/// 원격 전송 한 번의 실패 원인
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// DNS, 연결, 타임아웃 등 전송 계층 오류
    #[error("전송 계층 오류: {0}")]
    Transport(String),

    /// 200 이외의 HTTP 상태 코드
    #[error("HTTP 상태 오류: {status}")]
    HttpStatus { status: u16 },

    /// 응답 본문을 해석할 수 없음
    #[error("응답 본문 파싱 실패: {0}")]
    MalformedAck(String),

    /// 수집 서버가 0이 아닌 상태 값을 반환
    #[error("수집 서버 오류 (status={status}): {msg}")]
    Rejected { status: i64, msg: String },

    /// 수집 서버 인증 실패. 재시도 의미 없음
    #[error("수집 서버 인증 실패: {0}")]
    NotAuthorized(String),

    /// 요청 본문 직렬화 실패
    #[error("요청 직렬화 실패: {0}")]
    Encode(#[from] serde_json::Error),
}

/// 보관(분할/압축) 처리 에러
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("{action} 실패: {path}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ArchiveError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        ArchiveError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// 치명적 상황에서 프로세스를 어떻게 끝낼지 결정하는 훅
///
/// 기본 구현은 에러를 기록한 뒤 종료 코드 1로 프로세스를 끝냅니다.
pub type FatalHook = Arc<dyn Fn(&str) + Send + Sync>;

/// 기본 치명적 훅
pub fn exit_process_hook() -> FatalHook {
    Arc::new(|reason: &str| {
        tracing::error!(reason = %reason, "치명적 오류로 프로세스 종료");
        eprintln!("[logship] fatal: {}", reason);
        std::process::exit(1);
    })
}
