//! 자정 로그 파일 회전 스케줄러
//!
//! 다음 회전 시각은 "오늘 00:00:05 + 하루" 입니다. 스케줄러는 그 시각까지 잠들었다가
//! 활성 파일을 닫고 로깅 파이프라인을 다시 초기화한 뒤 다음 시각을 계산합니다.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::logging::clock::Clock;
use crate::logging::error::FatalHook;

/// 자정 이후 회전까지의 여유 시간(초)
pub const ROTATION_OFFSET_SECS: u32 = 5;

/// `now` 기준 다음 회전 시각 (로컬 시간 기준의 순수 계산)
pub fn next_rotation_after(now: NaiveDateTime) -> NaiveDateTime {
    let date = now.date();
    let next_day = date.succ_opt().unwrap_or(date);
    let offset = NaiveTime::from_hms_opt(0, 0, ROTATION_OFFSET_SECS).unwrap_or_default();
    next_day.and_time(offset)
}

/// 회전 시각을 찾을 때 살펴보는 최대 일수
const MAX_SEARCH_DAYS: usize = 7;

/// 로컬 시간대의 다음 회전 시각. 항상 `now` 보다 뒤입니다.
pub fn next_rotation(now: DateTime<Local>) -> DateTime<Local> {
    resolve_next_rotation(&now, |naive| Local.from_local_datetime(naive).earliest())
}

/// `now` 이후 첫 회전 시각
///
/// `resolve` 는 벽시계 시각을 시간대의 실제 시각으로 바꿉니다. 서머타임 전환으로
/// 00:00:05 가 존재하지 않는 날은 한 시간씩 뒤로 밀어 처음 존재하는 시각을 쓰고,
/// 해석 결과가 `now` 이전이면 다음 날로 넘어갑니다.
pub fn resolve_next_rotation<Tz, F>(now: &DateTime<Tz>, resolve: F) -> DateTime<Tz>
where
    Tz: TimeZone,
    F: Fn(&NaiveDateTime) -> Option<DateTime<Tz>>,
{
    let mut base = now.naive_local();
    for _ in 0..MAX_SEARCH_DAYS {
        let mut candidate = next_rotation_after(base);
        for _ in 0..24 {
            match resolve(&candidate) {
                Some(at) if at > *now => return at,
                Some(_) => break,
                None => candidate += chrono::Duration::hours(1),
            }
        }
        base = next_rotation_after(base);
    }
    now.clone() + chrono::Duration::days(1)
}

/// `now` 부터 `target` 까지 남은 시간. 이미 지났으면 0
pub fn duration_until(now: DateTime<Local>, target: DateTime<Local>) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

/// 회전 대상 (로깅 파이프라인)
#[async_trait]
pub trait RotationTarget: Send + Sync + 'static {
    fn clock(&self) -> Arc<dyn Clock>;

    /// 회전 시각이 정해졌음을 알림
    async fn armed(&self, _next: DateTime<Local>) {}

    /// 활성 파일을 닫고 다시 초기화
    async fn rotate(&self) -> anyhow::Result<()>;
}

/// 회전 스케줄러
pub struct RotationScheduler;

impl RotationScheduler {
    /// 백그라운드 태스크 시작. `cancel` 이 취소되거나 회전이 실패할 때까지 실행됩니다.
    pub fn spawn<T: RotationTarget>(
        target: Arc<T>,
        cancel: CancellationToken,
        fatal_hook: FatalHook,
    ) -> JoinHandle<()> {
        tokio::spawn(Self::run(target, cancel, fatal_hook))
    }

    async fn run<T: RotationTarget>(target: Arc<T>, cancel: CancellationToken, fatal_hook: FatalHook) {
        let clock = target.clock();
        let mut last_rotated: Option<NaiveDate> = None;

        loop {
            // Armed
            let now = clock.now();
            let next = next_rotation(now);
            target.armed(next).await;
            info!(next_rotation = %next.format("%Y-%m-%d %H:%M:%S"), "다음 로그 회전 시각 확정");

            let wait = duration_until(now, next);
            if !wait.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
            }

            // 같은 날짜는 두 번 회전하지 않음
            let today = clock.now().date_naive();
            if last_rotated == Some(today) {
                warn!(date = %today, "이미 회전한 날짜, 다음 회전 시각 재계산");
                continue;
            }

            // Rotating
            last_rotated = Some(today);
            if let Err(e) = target.rotate().await {
                error!(error = %format!("{:#}", e), "로그 회전 실패");
                fatal_hook(&format!("로그 회전 실패: {:#}", e));
                break;
            }
        }
    }
}
