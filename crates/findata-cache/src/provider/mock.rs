//! 테스트용 provider.
//!
//! 호출 횟수와 요청 구간을 기록하고 합성 데이터를 돌려줍니다.
//! `test-utils` feature로 의존 crate의 테스트에서도 사용할 수 있습니다.

use super::SeriesProvider;
use async_trait::async_trait;
use chrono::Datelike;
use findata_core::{CacheError, DateRange, EntityKey, Observation, Result};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// 합성 시계열 provider.
///
/// 기본 동작은 구간의 달력 날짜마다 관측치 1개(값 = 일(day) 숫자)를
/// 생성하는 것입니다. 실패, 빈 응답, 특정 엔티티 차단을 스크립트할 수 있습니다.
#[derive(Default)]
pub struct MockProvider {
    calls: AtomicU64,
    recorded: Mutex<Vec<(EntityKey, DateRange)>>,
    fail: AtomicBool,
    return_empty: AtomicBool,
    /// (entity_id, 세마포어). 해당 엔티티의 fetch는 permit이 생길 때까지 대기.
    gate: Mutex<Option<(String, Arc<Semaphore>)>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지의 fetch 호출 횟수.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// 기록된 (키, 구간) 호출 목록.
    pub fn recorded_calls(&self) -> Vec<(EntityKey, DateRange)> {
        self.recorded.lock().unwrap().clone()
    }

    /// true면 이후 모든 fetch가 provider 오류를 반환.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// true면 이후 모든 fetch가 빈 결과를 반환 (비거래일 구간 시뮬레이션).
    pub fn set_return_empty(&self, empty: bool) {
        self.return_empty.store(empty, Ordering::SeqCst);
    }

    /// 해당 엔티티의 fetch를 차단하는 게이트를 설치합니다.
    ///
    /// 반환된 세마포어에 `add_permits(1)`을 호출하면 차단이 풀립니다.
    pub fn gate_entity(&self, entity_id: &str) -> Arc<Semaphore> {
        let semaphore = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some((entity_id.to_string(), semaphore.clone()));
        semaphore
    }
}

#[async_trait]
impl SeriesProvider for MockProvider {
    async fn fetch(&self, key: &EntityKey, range: DateRange) -> Result<Vec<Observation>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().unwrap().push((key.clone(), range));

        let gate = self.gate.lock().unwrap().clone();
        if let Some((entity_id, semaphore)) = gate {
            if key.entity_id == entity_id {
                let _permit = semaphore.acquire().await;
            }
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(CacheError::Provider("합성 provider 실패".to_string()));
        }
        if self.return_empty.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }

        let mut observations = Vec::new();
        let mut date = range.start;
        loop {
            observations.push(Observation::new(date, Decimal::from(date.day())));
            if date >= range.end {
                break;
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        Ok(observations)
    }
}
