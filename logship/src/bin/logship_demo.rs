//! logship 데모
//!
//! `LOG_*` 환경변수(또는 `.env`)로 설정을 읽어 로깅 시스템을 띄우고,
//! 레벨별로 몇 줄을 기록한 뒤 Ctrl+C 를 받으면 종료합니다.

use anyhow::Result;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use logship::logging::{init_global_logging, global_logger, log_info, LoggingConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // 서브시스템 자체의 진단 로그
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = LoggingConfig::from_env();
    info!(?config, "logship 데모 시작");

    init_global_logging(config).await?;
    let logger = global_logger().ok_or_else(|| anyhow::anyhow!("전역 로깅 시스템 없음"))?;

    logger.debug().println("디버그 메시지").await;
    logger.info().println("서버 시작").await;
    logger.warn().println(format!("메모리 사용률 {}%", 85)).await;
    logger.error().println("데이터베이스 연결 실패").await;
    log_info("전역 편의 함수로 기록").await;

    let mut ticker = tokio::time::interval(Duration::from_secs(10));
    let mut count = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                count += 1;
                logger.info().println(format!("heartbeat #{}", count)).await;
            }
            _ = signal::ctrl_c() => {
                info!("종료 신호 수신");
                break;
            }
        }
    }

    logger.flush().await?;
    logger.shutdown().await?;
    Ok(())
}
