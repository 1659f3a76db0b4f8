//! 원격 리포터 풀 통합 테스트
//!
//! 스크립트된 전송 계층으로 재시도/치명적 응답 처리를 확인하고,
//! mockito 수집 서버로 실제 HTTP 요청 형식을 확인합니다.

use anyhow::Result;
use async_trait::async_trait;
use logship::logging::config::{Backoff, RemoteConfig, RetryPolicy};
use logship::logging::error::{DeliveryError, FatalHook};
use logship::logging::queue::DeliveryQueue;
use logship::logging::reporter::{
    classify, HttpTransport, Outcome, RemoteEnvelope, ReportTransport, ReporterPool,
    TransportReply,
};
use mockito::Matcher;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

type Reply = Result<TransportReply, DeliveryError>;

fn ack(status: i64, msg: &str) -> Reply {
    Ok(TransportReply {
        status: 200,
        body: format!(r#"{{"status":{},"msg":"{}"}}"#, status, msg).into_bytes(),
    })
}

fn http_error(status: u16) -> Reply {
    Ok(TransportReply {
        status,
        body: b"upstream unavailable".to_vec(),
    })
}

/// 정해진 응답을 순서대로 돌려주고, 스크립트가 끝나면 기본 응답을 반복하는 전송 계층
struct ScriptedTransport {
    script: Mutex<VecDeque<Reply>>,
    fallback: fn() -> Reply,
    posts: Mutex<Vec<(Instant, RemoteEnvelope)>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Reply>, fallback: fn() -> Reply) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            posts: Mutex::new(Vec::new()),
        })
    }

    fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    fn posts(&self) -> Vec<(Instant, RemoteEnvelope)> {
        self.posts.lock().unwrap().clone()
    }

    async fn wait_for_posts(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(600), async {
            while self.post_count() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("전송 시도 횟수가 기대값에 도달하지 않음");
    }
}

#[async_trait]
impl ReportTransport for ScriptedTransport {
    async fn post(&self, envelope: &RemoteEnvelope) -> Result<TransportReply, DeliveryError> {
        self.posts
            .lock()
            .unwrap()
            .push((Instant::now(), envelope.clone()));
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(self.fallback)
    }
}

fn recording_hook() -> (FatalHook, Arc<Mutex<Vec<String>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let hook_calls = calls.clone();
    let hook: FatalHook = Arc::new(move |reason: &str| {
        hook_calls.lock().unwrap().push(reason.to_string());
    });
    (hook, calls)
}

/// 비정상 응답 K번 뒤 성공하면 한 번만 전달되고, 재시도 사이에는 최소 지연이 있음
#[tokio::test(start_paused = true)]
async fn test_non_200_responses_are_retried_until_delivered() -> Result<()> {
    const FAILURES: usize = 3;
    let transport = ScriptedTransport::new(
        vec![http_error(500), http_error(502), ack(-1003, "parse failed")],
        || ack(0, "ok"),
    );
    let policy = RetryPolicy::default();
    let delay = policy.delay;
    let (hook, fatal_calls) = recording_hook();

    let queue = DeliveryQueue::new(4);
    queue.write("{\"msg\":\"retry me\"}\n").await;
    let pool = ReporterPool::spawn(1, queue.clone(), transport.clone(), policy, hook);

    transport.wait_for_posts(FAILURES + 1).await;
    // 추가 전송이 없는지 확인
    tokio::time::sleep(delay * 3).await;

    let posts = transport.posts();
    assert_eq!(posts.len(), FAILURES + 1);
    for pair in posts.windows(2) {
        assert!(pair[1].0 - pair[0].0 >= delay);
        assert_eq!(pair[0].1.data, pair[1].1.data);
    }
    assert_eq!(posts[0].1.data, "{\"msg\":\"retry me\"}");
    assert!(queue.is_empty());
    assert!(fatal_calls.lock().unwrap().is_empty());

    pool.shutdown().await;
    Ok(())
}

/// 인증 실패 응답은 첫 시도 직후 종료로 이어지고 더 이상 큐에서 꺼내지 않음
#[tokio::test(start_paused = true)]
async fn test_not_authorized_is_fatal_after_first_attempt() -> Result<()> {
    let transport = ScriptedTransport::new(Vec::new(), || ack(-1001, "invalid key"));
    let (hook, fatal_calls) = recording_hook();

    let queue = DeliveryQueue::new(4);
    for i in 0..3 {
        queue.write(&format!("line {}\n", i)).await;
    }
    let pool = ReporterPool::spawn(1, queue.clone(), transport.clone(), RetryPolicy::default(), hook);

    transport.wait_for_posts(1).await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(transport.post_count(), 1);
    assert_eq!(queue.len(), 2);
    assert!(pool.is_stopped());

    let calls = fatal_calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("invalid key"));

    pool.shutdown().await;
    Ok(())
}

/// 최대 시도 횟수에 도달하면 라인을 버림
#[tokio::test(start_paused = true)]
async fn test_max_attempts_drops_line() -> Result<()> {
    let transport = ScriptedTransport::new(Vec::new(), || http_error(503));
    let policy = RetryPolicy {
        delay: Duration::from_secs(1),
        max_attempts: Some(2),
        ..Default::default()
    };
    let (hook, _) = recording_hook();

    let queue = DeliveryQueue::new(2);
    queue.write("doomed\n").await;
    let pool = ReporterPool::spawn(1, queue.clone(), transport.clone(), policy, hook);

    transport.wait_for_posts(2).await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(transport.post_count(), 2);
    assert!(queue.is_empty());

    pool.shutdown().await;
    Ok(())
}

/// 지수 백오프는 시도마다 간격을 늘림
#[tokio::test(start_paused = true)]
async fn test_exponential_backoff_spacing() -> Result<()> {
    let transport = ScriptedTransport::new(
        vec![http_error(500), http_error(500), http_error(500)],
        || ack(0, "ok"),
    );
    let policy = RetryPolicy {
        delay: Duration::from_secs(1),
        backoff: Backoff::Exponential {
            factor: 2.0,
            max: Duration::from_secs(60),
        },
        ..Default::default()
    };
    let (hook, _) = recording_hook();

    let queue = DeliveryQueue::new(2);
    queue.write("backoff\n").await;
    let pool = ReporterPool::spawn(1, queue.clone(), transport.clone(), policy, hook);

    transport.wait_for_posts(4).await;
    let posts = transport.posts();
    assert!(posts[1].0 - posts[0].0 >= Duration::from_secs(1));
    assert!(posts[2].0 - posts[1].0 >= Duration::from_secs(2));
    assert!(posts[3].0 - posts[2].0 >= Duration::from_secs(4));

    pool.shutdown().await;
    Ok(())
}

/// 여러 워커가 모든 라인을 정확히 한 번씩 전달
#[tokio::test(start_paused = true)]
async fn test_worker_pool_delivers_each_line_once() -> Result<()> {
    let transport = ScriptedTransport::new(Vec::new(), || ack(0, "ok"));
    let (hook, _) = recording_hook();

    let queue = DeliveryQueue::new(5);
    let pool = ReporterPool::spawn(3, queue.clone(), transport.clone(), RetryPolicy::default(), hook);
    assert_eq!(pool.worker_count(), 3);

    for i in 0..30 {
        queue.write(&format!("line {}\n", i)).await;
    }
    transport.wait_for_posts(30).await;

    let delivered: HashSet<String> = transport
        .posts()
        .into_iter()
        .map(|(_, envelope)| envelope.data)
        .collect();
    assert_eq!(delivered.len(), 30);
    assert!(delivered.contains("line 0"));
    assert!(delivered.contains("line 29"));

    pool.shutdown().await;
    Ok(())
}

/// 전송 계층 오류 재시도 여부는 정책을 따름
#[tokio::test(start_paused = true)]
async fn test_transport_errors_dropped_when_policy_disables_retry() -> Result<()> {
    let transport = ScriptedTransport::new(Vec::new(), || {
        Err(DeliveryError::Transport("connection refused".to_string()))
    });
    let policy = RetryPolicy {
        retry_transport_errors: false,
        ..Default::default()
    };
    let (hook, _) = recording_hook();

    let queue = DeliveryQueue::new(2);
    queue.write("unreachable\n").await;
    let pool = ReporterPool::spawn(1, queue.clone(), transport.clone(), policy, hook);

    transport.wait_for_posts(1).await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.post_count(), 1);
    assert!(queue.is_empty());

    pool.shutdown().await;
    Ok(())
}

/// HTTP 요청 형식: 메서드, 경로+쿼리, Content-Type, 본문 필드
#[tokio::test]
async fn test_http_transport_wire_format() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Regex(r"^/report".to_string()))
        .match_query(Matcher::UrlEncoded("key".into(), "abc".into()))
        .match_header("content-type", "application/json; charset=utf-8")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "data": "{\"msg\":\"hi\"}"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":0,"msg":"ok"}"#)
        .create_async()
        .await;

    let remote = RemoteConfig {
        request_url: format!("{}/report", server.url()),
        query_key: "?key=abc".to_string(),
        ..Default::default()
    };
    let transport = HttpTransport::from_config(&remote)?;
    let envelope = RemoteEnvelope::now("{\"msg\":\"hi\"}");
    let outcome = classify(transport.post(&envelope).await, &RetryPolicy::default());

    assert!(matches!(outcome, Outcome::Delivered));
    mock.assert_async().await;
    Ok(())
}

/// 수집 서버의 비정상 상태 코드와 인증 실패 응답 분류
#[tokio::test]
async fn test_http_transport_error_responses() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _unavailable = server
        .mock("POST", "/down")
        .with_status(503)
        .create_async()
        .await;
    let _unauthorized = server
        .mock("POST", "/auth")
        .with_status(200)
        .with_body(r#"{"status":-1001,"msg":"not authorized"}"#)
        .create_async()
        .await;

    let policy = RetryPolicy::default();
    let envelope = RemoteEnvelope::now("line");

    let down = HttpTransport::new(format!("{}/down", server.url()), Duration::from_secs(3))?;
    assert!(matches!(
        classify(down.post(&envelope).await, &policy),
        Outcome::Retry(DeliveryError::HttpStatus { status: 503 })
    ));

    let auth = HttpTransport::new(format!("{}/auth", server.url()), Duration::from_secs(3))?;
    assert!(matches!(
        classify(auth.post(&envelope).await, &policy),
        Outcome::Fatal(DeliveryError::NotAuthorized(_))
    ));
    Ok(())
}

/// 연결할 수 없는 수집 서버는 전송 계층 오류
#[tokio::test]
async fn test_http_transport_connection_failure() -> Result<()> {
    let transport = HttpTransport::new(
        "http://127.0.0.1:9/report".to_string(),
        Duration::from_millis(500),
    )?;
    let result = transport.post(&RemoteEnvelope::now("line")).await;
    assert!(matches!(result, Err(DeliveryError::Transport(_))));
    Ok(())
}
