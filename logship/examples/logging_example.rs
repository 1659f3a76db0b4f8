//! logship 로깅 시스템 사용 예제
//!
//! 이 예제는 출력 대상 조합과 보조 로그 보관 기능을 보여줍니다.

use anyhow::Result;
use logship::logging::{
    init_logging, ArchiveTarget, FormatMode, LoggingConfig, LoggingSystem,
};
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() -> Result<()> {
    println!("logship 로깅 시스템 예제 시작");

    // === 예제 1: 기본 사용법 ===
    println!("\n예제 1: 콘솔 JSON 출력");
    basic_logging_example().await?;

    // === 예제 2: 텍스트 형식 + 로컬 파일 ===
    println!("\n예제 2: 텍스트 형식으로 콘솔과 날짜 파일에 기록");
    text_file_example().await?;

    // === 예제 3: 보조 로그 보관 ===
    println!("\n예제 3: 외부 컴포넌트 로그 분할/압축");
    archive_target_example().await?;

    println!("\n모든 예제 완료! ./log 디렉토리에서 생성된 로그를 확인하세요.");
    Ok(())
}

/// 예제 1: 기본 설정 (콘솔 JSON)
async fn basic_logging_example() -> Result<()> {
    let logger = init_logging(LoggingConfig::default()).await?;

    logger.debug().println("디버깅 정보").await;
    logger.info().println("서버 시작: port=50051").await;
    logger.warn().println(format!("메모리 사용률 {}%", 85)).await;
    logger.error().println("데이터베이스 연결 실패").await;

    logger.flush().await?;
    logger.shutdown().await?;
    Ok(())
}

/// 예제 2: 텍스트 형식으로 콘솔과 로컬 파일에 기록
async fn text_file_example() -> Result<()> {
    let config = LoggingConfig {
        store_local_file: true,
        format: FormatMode::Text,
        ..Default::default()
    };
    let logger = LoggingSystem::start(config).await?;

    let handles = logger.handles();
    let mut tasks = Vec::new();
    for worker in 0..3 {
        let info = handles.info.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..5 {
                info.println(format!("worker {} 작업 {} 완료", worker, i)).await;
                sleep(Duration::from_millis(10)).await;
            }
        }));
    }
    for task in tasks {
        task.await?;
    }

    if let Some(path) = logger.pipeline().active_file_path().await {
        println!("   로그 파일: {}", path.display());
    }
    logger.shutdown().await?;
    Ok(())
}

/// 예제 3: 외부 컴포넌트가 쓰는 접근 로그를 날짜별로 분할/압축
async fn archive_target_example() -> Result<()> {
    tokio::fs::create_dir_all("./log").await?;
    tokio::fs::write("./log/access.log", "GET / 200\nGET /health 200\n").await?;

    let config = LoggingConfig {
        std_output: false,
        store_local_file: true,
        archive_targets: vec![ArchiveTarget::new("access", "./log/access.log")],
        ..Default::default()
    };
    let logger = LoggingSystem::start(config).await?;
    println!("   ./log/access-archives 에 전날 접근 로그가 압축됨");

    logger.shutdown().await?;
    Ok(())
}
