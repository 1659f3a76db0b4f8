//! 레벨별 로그 핸들
//!
//! 호출 지점이 들고 다니는 고정 레벨 핸들입니다. 회전으로 출력 대상이 바뀌어도
//! 핸들은 그대로 유효합니다.

use std::fmt::Display;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;

use crate::logging::formatter::{LogEntry, LogLevel};
use crate::logging::pipeline::Pipeline;

/// 고정 레벨 로그 핸들
#[derive(Clone)]
pub struct LogHandle {
    level: LogLevel,
    pipeline: Arc<Pipeline>,
}

impl LogHandle {
    pub fn new(level: LogLevel, pipeline: Arc<Pipeline>) -> Self {
        Self { level, pipeline }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// 메시지를 기록. Fatal 핸들이면 기록 후 치명적 훅을 호출합니다.
    ///
    /// 호출 위치는 이 메서드를 부른 곳으로 기록됩니다.
    #[track_caller]
    pub fn println<M: Display>(&self, message: M) -> impl Future<Output = ()> + '_ {
        let location = Location::caller();
        let message = message.to_string();
        let terminate = self.level == LogLevel::Fatal;
        self.write(location, message, terminate)
    }

    /// 메시지를 기록한 뒤 레벨과 무관하게 치명적 훅을 호출
    #[track_caller]
    pub fn fatalln<M: Display>(&self, message: M) -> impl Future<Output = ()> + '_ {
        let location = Location::caller();
        self.write(location, message.to_string(), true)
    }

    async fn write(&self, location: &'static Location<'static>, message: String, terminate: bool) {
        let entry = LogEntry::at(self.level, location, message);
        if terminate {
            let message = entry.message.clone();
            self.pipeline.emit(entry).await;
            self.pipeline.terminate(self.level, &message).await;
        } else {
            self.pipeline.emit(entry).await;
        }
    }
}

/// 다섯 레벨의 핸들 묶음
#[derive(Clone)]
pub struct LevelHandles {
    pub debug: LogHandle,
    pub info: LogHandle,
    pub warn: LogHandle,
    pub error: LogHandle,
    pub fatal: LogHandle,
}

impl LevelHandles {
    pub fn new(pipeline: &Arc<Pipeline>) -> Self {
        Self {
            debug: LogHandle::new(LogLevel::Debug, pipeline.clone()),
            info: LogHandle::new(LogLevel::Info, pipeline.clone()),
            warn: LogHandle::new(LogLevel::Warn, pipeline.clone()),
            error: LogHandle::new(LogLevel::Error, pipeline.clone()),
            fatal: LogHandle::new(LogLevel::Fatal, pipeline.clone()),
        }
    }
}
