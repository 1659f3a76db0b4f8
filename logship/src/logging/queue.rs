//! 원격 전송 대기 큐
//!
//! 고정 용량의 다중 생산자/다중 소비자 FIFO입니다. 가득 차면 쓰는 쪽이
//! 대기하며, 이것이 로그 호출 지점에 대한 유일한 배압 수단입니다.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// 큐에 들어 있는 한 줄과 지금까지의 전송 시도 횟수
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedLine {
    /// 끝의 개행 하나가 제거된 로그 라인
    pub line: String,
    /// 실패한 전송 시도 횟수
    pub attempts: u32,
}

impl QueuedLine {
    pub fn new<S: Into<String>>(line: S) -> Self {
        Self {
            line: line.into(),
            attempts: 0,
        }
    }
}

/// 원격 전송 대기 큐
///
/// 복제본은 모두 같은 큐를 가리킵니다.
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    sender: mpsc::Sender<QueuedLine>,
    // 수신자는 하나뿐이므로 여러 소비자가 순서대로 꺼내도록 잠금을 둠
    receiver: Arc<Mutex<mpsc::Receiver<QueuedLine>>>,
    capacity: usize,
}

impl DeliveryQueue {
    /// 고정 용량 큐 생성. 용량은 이후 바뀌지 않습니다.
    ///
    /// # Panics
    /// `capacity` 가 0이면 패닉합니다. 설정 검증 단계에서 걸러집니다.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            capacity,
        }
    }

    /// 한 줄 추가. 끝의 `\n` 하나를 제거하며, 큐가 가득 차 있으면 자리가 날 때까지 대기합니다.
    pub async fn write(&self, line: &str) {
        let line = line.strip_suffix('\n').unwrap_or(line);
        self.push(QueuedLine::new(line)).await;
    }

    /// 시도 횟수를 유지한 채 항목을 다시 넣음 (대기)
    pub async fn push(&self, item: QueuedLine) {
        // 수신자를 self 가 들고 있으므로 채널이 닫히지 않음
        let _ = self.sender.send(item).await;
    }

    /// 대기 없이 다시 넣기. 큐가 가득 차 있으면 항목을 그대로 돌려줍니다.
    pub fn try_requeue(&self, item: QueuedLine) -> Result<(), QueuedLine> {
        match self.sender.try_send(item) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(item)) => Err(item),
            Err(mpsc::error::TrySendError::Closed(item)) => Err(item),
        }
    }

    /// 항목 하나를 꺼냄. 비어 있으면 들어올 때까지 대기합니다.
    ///
    /// 동시에 호출한 소비자들은 서로 다른 항목을 받습니다.
    pub async fn take_one(&self) -> QueuedLine {
        let mut receiver = self.receiver.lock().await;
        match receiver.recv().await {
            Some(item) => item,
            // 송신자를 self 가 들고 있으므로 도달하지 않음
            None => std::future::pending().await,
        }
    }

    /// 현재 대기 중인 항목 수
    pub fn len(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
