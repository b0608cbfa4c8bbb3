//! 폴링 정책 — 백오프 간격과 대기 상한
//!
//! 준비 프로브, 배포 완료 확인, 텔레메트리 스냅샷 조회는 모두
//! "푸시가 아닌 폴링" 신호입니다. [`BackoffPolicy`]는 폴링 간격을,
//! [`poll_until`]은 상한이 있는 폴링 루프를 제공합니다.
//! 모든 대기는 명시적 상한을 가지며, 무한 블로킹은 없습니다.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// 지수 백오프 정책
///
/// `attempt`번째 재시도 전 대기 시간은
/// `initial * multiplier^attempt`이며 `max_interval`로 제한됩니다.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// 첫 재시도 전 대기 시간
    pub initial: Duration,
    /// 대기 시간 상한
    pub max_interval: Duration,
    /// 증가 배율 (1.0 이상)
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max_interval: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// 새 백오프 정책을 생성합니다. 배율은 1.0 미만이면 1.0으로 보정됩니다.
    pub fn new(initial: Duration, max_interval: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max_interval,
            multiplier: multiplier.max(1.0),
        }
    }

    /// `attempt`번째 재시도 전 대기 시간을 반환합니다.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut delay = self.initial;
        // 단계별로 상한을 확인하여 오버플로 전에 수렴한다
        for _ in 0..attempt.min(32) {
            if delay >= self.max_interval {
                return self.max_interval;
            }
            delay = delay.mul_f64(self.multiplier);
        }
        delay.min(self.max_interval)
    }
}

/// 상한이 있는 폴링의 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// 프로브가 타임아웃 내에 성공함
    Ready(T),
    /// 타임아웃까지 프로브가 성공하지 못함
    TimedOut,
    /// 외부 취소 신호로 중단됨
    Cancelled,
}

impl<T> PollOutcome<T> {
    /// 성공 여부를 반환합니다.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// 프로브가 성공할 때까지 백오프 간격으로 폴링합니다.
///
/// 프로브는 성공 시 `Some(값)`, 아직이면 `None`을 반환합니다.
/// 타임아웃 경과 후에는 늦어도 한 번의 폴링 간격 안에 `TimedOut`을
/// 반환하며, 취소 토큰은 대기 중에도 즉시 반영됩니다.
pub async fn poll_until<T, F, Fut>(
    policy: &BackoffPolicy,
    timeout: Duration,
    cancel: &CancellationToken,
    mut probe: F,
) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled;
        }

        if let Some(value) = probe().await {
            return PollOutcome::Ready(value);
        }

        if Instant::now() >= deadline {
            return PollOutcome::TimedOut;
        }

        let delay = policy.delay_for(attempt);
        attempt = attempt.saturating_add(1);

        tokio::select! {
            () = cancel.cancelled() => return PollOutcome::Cancelled,
            () = tokio::time::sleep(delay) => {}
        }
    }
}
