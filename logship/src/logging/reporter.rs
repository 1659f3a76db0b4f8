//! 원격 리포터 풀
//!
//! N개의 워커가 전송 큐를 비우며 각 줄을 HTTP 봉투로 수집 서버에 보냅니다.
//! 실패한 줄은 재시도 정책에 따라 다시 큐에 들어갑니다(최소 한 번 전달, 최선 노력).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::logging::config::{RemoteConfig, RetryPolicy};
use crate::logging::error::{DeliveryError, FatalHook};
use crate::logging::queue::{DeliveryQueue, QueuedLine};

/// 성공
pub const STATUS_OK: i64 = 0;
/// 인증 실패 (치명적)
pub const STATUS_NOT_AUTHORIZED: i64 = -1001;
/// 요청 파라미터 오류
pub const STATUS_PARAMS_INVALID: i64 = -1002;
/// 수집 서버의 데이터 파싱 실패
pub const STATUS_DATA_PARSE_FAILED: i64 = -1003;

/// 수집 서버로 보내는 봉투
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEnvelope {
    /// 전송 시각 (unix 초)
    pub time: i64,
    /// 로그 라인
    pub data: String,
}

impl RemoteEnvelope {
    /// 현재 시각으로 봉투 생성
    pub fn now<S: Into<String>>(data: S) -> Self {
        Self {
            time: chrono::Utc::now().timestamp(),
            data: data.into(),
        }
    }
}

/// 수집 서버 응답
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAck {
    pub status: i64,
    #[serde(default)]
    pub msg: String,
}

/// HTTP 응답 원본
#[derive(Debug, Clone)]
pub struct TransportReply {
    pub status: u16,
    pub body: Vec<u8>,
}

/// 봉투를 수집 서버로 보내는 전송 계층
#[async_trait]
pub trait ReportTransport: Send + Sync {
    async fn post(&self, envelope: &RemoteEnvelope) -> Result<TransportReply, DeliveryError>;
}

/// reqwest 기반 HTTP 전송
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// 고정 타임아웃을 가진 클라이언트 생성
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &RemoteConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.endpoint(), config.timeout)
    }
}

#[async_trait]
impl ReportTransport for HttpTransport {
    async fn post(&self, envelope: &RemoteEnvelope) -> Result<TransportReply, DeliveryError> {
        let body = serde_json::to_vec(envelope)?;
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        Ok(TransportReply {
            status,
            body: body.to_vec(),
        })
    }
}

/// 한 번의 전송 시도 결과 분류
#[derive(Debug)]
pub enum Outcome {
    /// 전달 완료
    Delivered,
    /// 다시 시도
    Retry(DeliveryError),
    /// 재시도 없이 버림
    Drop(DeliveryError),
    /// 프로세스를 끝내야 함
    Fatal(DeliveryError),
}

/// 전송 결과를 재시도 정책에 따라 분류
pub fn classify(result: Result<TransportReply, DeliveryError>, policy: &RetryPolicy) -> Outcome {
    let reply = match result {
        Ok(reply) => reply,
        Err(e @ DeliveryError::Transport(_)) if policy.retry_transport_errors => {
            return Outcome::Retry(e)
        }
        Err(e) => return Outcome::Drop(e),
    };

    if reply.status != 200 {
        return Outcome::Retry(DeliveryError::HttpStatus {
            status: reply.status,
        });
    }

    let ack: RemoteAck = match serde_json::from_slice(&reply.body) {
        Ok(ack) => ack,
        Err(e) => return Outcome::Drop(DeliveryError::MalformedAck(e.to_string())),
    };

    match ack.status {
        STATUS_OK => Outcome::Delivered,
        STATUS_NOT_AUTHORIZED => Outcome::Fatal(DeliveryError::NotAuthorized(ack.msg)),
        status => Outcome::Retry(DeliveryError::Rejected {
            status,
            msg: ack.msg,
        }),
    }
}

/// 리포터 풀
pub struct ReporterPool {
    handles: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

struct Worker {
    id: usize,
    queue: DeliveryQueue,
    transport: Arc<dyn ReportTransport>,
    policy: RetryPolicy,
    cancel: CancellationToken,
    fatal_hook: FatalHook,
}

impl ReporterPool {
    /// `workers` 개의 워커를 띄움
    pub fn spawn(
        workers: usize,
        queue: DeliveryQueue,
        transport: Arc<dyn ReportTransport>,
        policy: RetryPolicy,
        fatal_hook: FatalHook,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handles = (0..workers.max(1))
            .map(|id| {
                let worker = Worker {
                    id,
                    queue: queue.clone(),
                    transport: transport.clone(),
                    policy: policy.clone(),
                    cancel: cancel.clone(),
                    fatal_hook: fatal_hook.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        debug!(workers = workers.max(1), "원격 리포터 워커 시작됨");
        Self { handles, cancel }
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// 모든 워커가 멈췄는지 여부 (치명적 응답 이후 또는 종료 후)
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 워커 종료 요청 후 대기
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
        debug!("원격 리포터 워커 종료됨");
    }
}

impl Worker {
    async fn run(self) {
        // 큐가 가득 차서 되돌려 넣지 못한 항목은 워커가 직접 들고 다시 시도
        let mut held: Option<QueuedLine> = None;

        loop {
            let item = match held.take() {
                Some(item) => item,
                None => tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    item = self.queue.take_one() => item,
                },
            };

            let envelope = RemoteEnvelope::now(item.line.clone());
            let outcome = classify(self.transport.post(&envelope).await, &self.policy);

            match outcome {
                Outcome::Delivered => {}
                Outcome::Drop(e) => {
                    warn!(worker = self.id, error = %e, "원격 전송 실패, 재시도 없이 버림");
                }
                Outcome::Retry(e) => {
                    let attempts = item.attempts.saturating_add(1);
                    if !self.policy.allows_retry(attempts) {
                        error!(
                            worker = self.id,
                            attempts,
                            error = %e,
                            "최대 재시도 횟수 초과, 로그 라인 버림"
                        );
                        continue;
                    }

                    warn!(worker = self.id, attempts, error = %e, "원격 전송 실패, 재시도 예정");
                    let delay = self.policy.delay_for(attempts);
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }

                    let retry = QueuedLine {
                        line: item.line,
                        attempts,
                    };
                    if let Err(retry) = self.queue.try_requeue(retry) {
                        held = Some(retry);
                    }
                }
                Outcome::Fatal(e) => {
                    error!(worker = self.id, error = %e, "수집 서버 인증 실패");
                    self.cancel.cancel();
                    (self.fatal_hook)(&e.to_string());
                    break;
                }
            }
        }
    }
}
