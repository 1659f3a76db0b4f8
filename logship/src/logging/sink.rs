//! 로그 출력 대상
//!
//! 콘솔, 날짜별 파일, 전송 큐, 버림, 메모리, 그리고 이들을 묶는 팬아웃 출력 대상을 제공합니다.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

use crate::logging::queue::DeliveryQueue;

/// 포매팅이 끝난 한 줄을 받는 출력 대상
#[async_trait]
pub trait LogSink: Send + Sync {
    /// 개행으로 끝나는 한 줄 기록
    async fn write_line(&self, line: &str) -> io::Result<()>;

    /// 버퍼에 남은 데이터 기록
    async fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// 표준 출력
pub struct ConsoleSink {
    stdout: Mutex<Stdout>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogSink for ConsoleSink {
    async fn write_line(&self, line: &str) -> io::Result<()> {
        let mut stdout = self.stdout.lock().await;
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await
    }

    async fn flush(&self) -> io::Result<()> {
        self.stdout.lock().await.flush().await
    }
}

/// 오늘 날짜 로그 파일
///
/// `close` 이후의 기록은 에러를 반환합니다. 회전 중에는 채널 잠금 때문에
/// 닫힌 파일에 기록이 도달하지 않습니다.
pub struct FileSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileSink {
    /// 파일을 추가 모드로 열거나 생성
    pub async fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 남은 데이터를 기록하고 파일을 닫음. 두 번 호출해도 안전합니다.
    pub async fn close(&self) -> io::Result<()> {
        let mut guard = self.file.lock().await;
        if let Some(mut file) = guard.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        self.file.lock().await.is_none()
    }
}

#[async_trait]
impl LogSink for FileSink {
    async fn write_line(&self, line: &str) -> io::Result<()> {
        let mut guard = self.file.lock().await;
        match guard.as_mut() {
            Some(file) => {
                file.write_all(line.as_bytes()).await?;
                file.flush().await
            }
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("로그 파일이 이미 닫힘: {}", self.path.display()),
            )),
        }
    }

    async fn flush(&self) -> io::Result<()> {
        let mut guard = self.file.lock().await;
        if let Some(file) = guard.as_mut() {
            file.flush().await?;
        }
        Ok(())
    }
}

/// 원격 전송 큐로 보내는 출력 대상
pub struct QueueSink {
    queue: DeliveryQueue,
}

impl QueueSink {
    pub fn new(queue: DeliveryQueue) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl LogSink for QueueSink {
    async fn write_line(&self, line: &str) -> io::Result<()> {
        self.queue.write(line).await;
        Ok(())
    }
}

/// 모든 입력을 버림
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

#[async_trait]
impl LogSink for DiscardSink {
    async fn write_line(&self, _line: &str) -> io::Result<()> {
        Ok(())
    }
}

/// 한 번의 기록을 모든 구성원에게 복제
///
/// 한 구성원이 실패해도 나머지에는 기록하고, 첫 번째 에러를 반환합니다.
pub struct FanOutSink {
    members: Vec<Arc<dyn LogSink>>,
}

impl FanOutSink {
    pub fn new(members: Vec<Arc<dyn LogSink>>) -> Self {
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[async_trait]
impl LogSink for FanOutSink {
    async fn write_line(&self, line: &str) -> io::Result<()> {
        let mut first_error = None;
        for member in &self.members {
            if let Err(e) = member.write_line(line).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn flush(&self) -> io::Result<()> {
        let mut first_error = None;
        for member in &self.members {
            if let Err(e) = member.flush().await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// 메모리 내 출력 대상 (테스트 및 임베딩 확인용)
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 기록된 모든 줄
    pub async fn lines(&self) -> Vec<String> {
        self.lines.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.lines.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.lines.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.lines.lock().await.clear();
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn write_line(&self, line: &str) -> io::Result<()> {
        self.lines.lock().await.push(line.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FailingSink;

    #[async_trait]
    impl LogSink for FailingSink {
        async fn write_line(&self, _line: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "boom"))
        }
    }

    #[tokio::test]
    async fn test_file_sink_appends_and_rejects_after_close() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("2020-01-01.log");
        std::fs::write(&path, "existing\n").unwrap();

        let sink = FileSink::open(&path).await.unwrap();
        sink.write_line("first\n").await.unwrap();
        sink.write_line("second\n").await.unwrap();
        sink.close().await.unwrap();
        sink.close().await.unwrap();

        assert!(sink.is_closed().await);
        assert!(sink.write_line("late\n").await.is_err());

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "existing\nfirst\nsecond\n");
    }

    #[tokio::test]
    async fn test_fan_out_writes_every_member_despite_failure() {
        let a = Arc::new(MemorySink::new());
        let b = Arc::new(MemorySink::new());
        let fan_out = FanOutSink::new(vec![
            a.clone() as Arc<dyn LogSink>,
            Arc::new(FailingSink),
            b.clone(),
        ]);

        assert!(fan_out.write_line("x\n").await.is_err());
        assert_eq!(a.lines().await, vec!["x\n"]);
        assert_eq!(b.lines().await, vec!["x\n"]);
    }

    #[tokio::test]
    async fn test_queue_sink_strips_newline() {
        let queue = DeliveryQueue::new(2);
        let sink = QueueSink::new(queue.clone());
        sink.write_line("{\"msg\":\"hi\"}\n").await.unwrap();
        assert_eq!(queue.take_one().await.line, "{\"msg\":\"hi\"}");
    }

    #[tokio::test]
    async fn test_memory_sink() {
        let sink = MemorySink::new();
        assert!(sink.is_empty().await);
        sink.write_line("one\n").await.unwrap();
        assert_eq!(sink.len().await, 1);
        sink.clear().await;
        assert!(sink.is_empty().await);
    }
}
