//! 로깅 설정 관리
//!
//! 출력 대상(콘솔/로컬 파일/원격) 선택, 원격 수집 서버 설정, 재시도 정책,
//! 보관 대상 파일 목록을 담당합니다.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::logging::error::ConfigError;
use crate::logging::formatter::LogLevel;

/// 기본 원격 리포터 워커 수
pub const DEFAULT_REPORTER_NUM: usize = 3;

/// 기본 전송 큐 용량
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;

/// 로그 출력 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatMode {
    /// 구조화된 JSON 한 줄
    Json,
    /// 사람이 읽는 텍스트 한 줄
    Text,
}

impl FormatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatMode::Json => "json",
            FormatMode::Text => "text",
        }
    }
}

/// 재시도 간격 증가 방식
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Backoff {
    /// 매번 같은 간격
    Fixed,
    /// 시도마다 `factor` 배씩 증가, `max` 에서 멈춤
    Exponential { factor: f64, max: Duration },
}

/// 원격 전송 재시도 정책
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 기본 재시도 간격 (기본값: 5초)
    pub delay: Duration,

    /// 최대 시도 횟수. `None` 이면 무제한 (기본값)
    pub max_attempts: Option<u32>,

    /// 간격 증가 방식 (기본값: Fixed)
    pub backoff: Backoff,

    /// 간격에 더해지는 최대 지터 (기본값: 0)
    pub jitter: Duration,

    /// 전송 계층 오류(DNS, 연결 실패, 타임아웃)도 재시도할지 여부 (기본값: true)
    pub retry_transport_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: None,
            backoff: Backoff::Fixed,
            jitter: Duration::ZERO,
            retry_transport_errors: true,
        }
    }
}

impl RetryPolicy {
    /// `attempts` 번 실패한 항목을 다시 시도해도 되는지 확인
    pub fn allows_retry(&self, attempts: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts < max,
            None => true,
        }
    }

    /// `attempts` 번째 실패 후 대기할 시간
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let base = match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { factor, max } => {
                let exponent = attempts.saturating_sub(1).min(32) as i32;
                let scaled = self.delay.as_secs_f64() * factor.max(1.0).powi(exponent);
                Duration::try_from_secs_f64(scaled.min(max.as_secs_f64())).unwrap_or(max)
            }
        };

        if self.jitter.is_zero() {
            return base;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
        base.saturating_add(Duration::from_millis(jitter_ms))
    }
}

/// 원격 수집 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// 수집 서버 URL
    pub request_url: String,

    /// URL 뒤에 그대로 붙는 인증 쿼리 (예: `?key=...`)
    pub query_key: String,

    /// 리포터 워커 수. 0 이면 기본값 3 사용
    pub reporter_num: usize,

    /// 전송 큐 용량 (기본값: 20)
    pub queue_capacity: usize,

    /// HTTP 요청 타임아웃 (기본값: 3초)
    pub timeout: Duration,

    /// 재시도 정책
    pub retry: RetryPolicy,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            request_url: String::new(),
            query_key: String::new(),
            reporter_num: 0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            timeout: Duration::from_secs(3),
            retry: RetryPolicy::default(),
        }
    }
}

impl RemoteConfig {
    /// 실제로 띄울 워커 수
    pub fn effective_reporter_num(&self) -> usize {
        if self.reporter_num == 0 {
            DEFAULT_REPORTER_NUM
        } else {
            self.reporter_num
        }
    }

    /// 요청 대상 전체 URL
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.request_url, self.query_key)
    }
}

/// 외부 컴포넌트가 기록하는 보조 로그 파일 (예: 접근 로그)
///
/// 이 시스템은 해당 파일에 직접 쓰지 않고, 날짜별 분할과 압축만 대신 수행합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveTarget {
    /// 디렉토리 접미사와 파일 이름에 쓰이는 고유 이름
    pub name: String,
    /// 원본 파일 경로
    pub file_path: PathBuf,
}

impl ArchiveTarget {
    pub fn new<N: Into<String>, P: Into<PathBuf>>(name: N, file_path: P) -> Self {
        Self {
            name: name.into(),
            file_path: file_path.into(),
        }
    }
}

/// 로깅 시스템 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 콘솔 출력 여부 (기본값: true)
    pub std_output: bool,

    /// 로컬 파일 저장 여부 (기본값: false)
    pub store_local_file: bool,

    /// 원격 전송 여부 (기본값: false)
    pub store_remote: bool,

    /// 출력 형식 (기본값: Json)
    pub format: FormatMode,

    /// 로그 디렉토리 (기본값: "./log")
    pub log_dir: PathBuf,

    /// 기록할 최소 레벨 (기본값: Debug)
    pub min_level: LogLevel,

    /// 원격 수집 서버 설정
    pub remote: RemoteConfig,

    /// 날짜별 분할/압축 대상 보조 로그 파일
    pub archive_targets: Vec<ArchiveTarget>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            std_output: true,
            store_local_file: false,
            store_remote: false,
            format: FormatMode::Json,
            log_dir: PathBuf::from("./log"),
            min_level: LogLevel::Debug,
            remote: RemoteConfig::default(),
            archive_targets: Vec::new(),
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|val| matches!(val.to_lowercase().as_str(), "true" | "1" | "yes"))
}

impl LoggingConfig {
    /// 환경변수에서 설정 로드
    ///
    /// `.env` 파일이 있으면 먼저 읽습니다.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let mut config = Self::default();

        if let Some(flag) = env_flag("LOG_STD_OUTPUT") {
            config.std_output = flag;
        }
        if let Some(flag) = env_flag("LOG_STORE_LOCAL_FILE") {
            config.store_local_file = flag;
        }
        if let Some(flag) = env_flag("LOG_STORE_REMOTE") {
            config.store_remote = flag;
        }

        if let Ok(val) = std::env::var("LOG_FORMAT") {
            if val.eq_ignore_ascii_case("text") {
                config.format = FormatMode::Text;
            } else if val.eq_ignore_ascii_case("json") {
                config.format = FormatMode::Json;
            }
        }

        if let Ok(val) = std::env::var("LOG_DIR") {
            config.log_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("LOG_MIN_LEVEL") {
            if let Ok(level) = val.parse() {
                config.min_level = level;
            }
        }

        if let Ok(val) = std::env::var("LOG_REMOTE_URL") {
            config.remote.request_url = val;
        }
        if let Ok(val) = std::env::var("LOG_REMOTE_QUERY_KEY") {
            config.remote.query_key = val;
        }
        if let Ok(val) = std::env::var("LOG_REMOTE_REPORTER_NUM") {
            if let Ok(num) = val.parse() {
                config.remote.reporter_num = num;
            }
        }
        if let Ok(val) = std::env::var("LOG_QUEUE_CAPACITY") {
            if let Ok(size) = val.parse() {
                config.remote.queue_capacity = size;
            }
        }
        if let Ok(val) = std::env::var("LOG_REMOTE_TIMEOUT") {
            if let Ok(secs) = val.parse::<u64>() {
                config.remote.timeout = Duration::from_secs(secs);
            }
        }
        if let Ok(val) = std::env::var("LOG_RETRY_DELAY") {
            if let Ok(secs) = val.parse::<u64>() {
                config.remote.retry.delay = Duration::from_secs(secs);
            }
        }
        if let Ok(val) = std::env::var("LOG_RETRY_MAX_ATTEMPTS") {
            if let Ok(max) = val.parse::<u32>() {
                config.remote.retry.max_attempts = if max == 0 { None } else { Some(max) };
            }
        }
        if let Some(flag) = env_flag("LOG_RETRY_TRANSPORT_ERRORS") {
            config.remote.retry.retry_transport_errors = flag;
        }

        // 형식: name=path,name=path
        if let Ok(val) = std::env::var("LOG_ARCHIVE_TARGETS") {
            config.archive_targets = val
                .split(',')
                .filter_map(|pair| {
                    let (name, path) = pair.split_once('=')?;
                    Some(ArchiveTarget::new(name.trim(), path.trim()))
                })
                .collect();
        }

        config
    }

    /// 설정 유효성 검증
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_remote {
            if self.remote.request_url.is_empty() {
                return Err(ConfigError::MissingRemoteUrl);
            }
            url::Url::parse(&self.remote.endpoint()).map_err(|e| ConfigError::InvalidRemoteUrl {
                url: self.remote.endpoint(),
                reason: e.to_string(),
            })?;

            if self.remote.queue_capacity == 0 {
                return Err(ConfigError::ZeroQueueCapacity);
            }
            if self.remote.timeout.is_zero() {
                return Err(ConfigError::ZeroTimeout);
            }
        }

        let mut seen = HashSet::new();
        for target in &self.archive_targets {
            let valid_name = !target.name.is_empty()
                && target
                    .name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !valid_name {
                return Err(ConfigError::InvalidTargetName(target.name.clone()));
            }
            if !seen.insert(target.name.as_str()) {
                return Err(ConfigError::DuplicateTarget(target.name.clone()));
            }
        }

        Ok(())
    }
}
