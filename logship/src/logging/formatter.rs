//! 로그 포매터
//!
//! 로그 항목을 텍스트 또는 JSON 한 줄로 변환합니다. 결과는 항상 개행으로 끝납니다.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::panic::Location;
use std::str::FromStr;

use crate::logging::config::FormatMode;

/// 로그 레벨 열거형
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    /// 상세한 추적 정보
    Trace = 0,
    /// 디버깅 정보
    Debug = 1,
    /// 일반 정보
    Info = 2,
    /// 경고 상황
    Warn = 3,
    /// 오류 상황
    Error = 4,
    /// 기록 후 프로세스를 종료하는 수준
    Fatal = 5,
}

impl LogLevel {
    /// 로그 레벨을 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// JSON 출력용 소문자 이름
    pub fn as_lower_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warning",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            _ => Err(()),
        }
    }
}

/// 포매팅 전의 로그 항목
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// 기록 시각 (로컬 시간)
    pub time: DateTime<Local>,
    /// 로그 레벨
    pub level: LogLevel,
    /// 호출 위치 (`file:line`)
    pub caller: String,
    /// 로그 메시지
    pub message: String,
}

impl LogEntry {
    /// 새 로그 항목 생성
    pub fn new<S: Into<String>>(level: LogLevel, caller: S, message: S) -> Self {
        Self {
            time: Local::now(),
            level,
            caller: caller.into(),
            message: message.into(),
        }
    }

    /// 호출 위치 정보로 로그 항목 생성
    pub fn at(level: LogLevel, location: &Location<'_>, message: String) -> Self {
        Self {
            time: Local::now(),
            level,
            caller: format!("{}:{}", location.file(), location.line()),
            message,
        }
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    level: &'a str,
    time: String,
    caller: &'a str,
    msg: &'a str,
}

/// 로그 포매터
#[derive(Debug, Clone, Copy)]
pub struct LogFormatter {
    mode: FormatMode,
}

impl LogFormatter {
    /// 새 포매터 생성
    pub fn new(mode: FormatMode) -> Self {
        Self { mode }
    }

    /// 로그 항목을 개행으로 끝나는 한 줄로 포매팅
    pub fn format(&self, entry: &LogEntry) -> anyhow::Result<String> {
        match self.mode {
            FormatMode::Json => self.format_json(entry),
            FormatMode::Text => Ok(self.format_text(entry)),
        }
    }

    fn format_json(&self, entry: &LogEntry) -> anyhow::Result<String> {
        let line = JsonLine {
            level: entry.level.as_lower_str(),
            time: entry.time.to_rfc3339(),
            caller: &entry.caller,
            msg: &entry.message,
        };
        let mut json_str = serde_json::to_string(&line)?;
        json_str.push('\n');
        Ok(json_str)
    }

    // LEVEL YYYY-MM-DD HH:MM:SS [caller] message
    fn format_text(&self, entry: &LogEntry) -> String {
        format!(
            "{} {} [{}] {}\n",
            entry.level.as_str(),
            entry.time.format("%Y-%m-%d %H:%M:%S"),
            entry.caller,
            entry.message
        )
    }
}
