//! 데이터 캐시 서비스 (조율 계층).
//!
//! 요청 하나의 흐름:
//!
//! 1. 키/구간 검증 후 엔티티 락 획득
//! 2. 레지스트리에 없는 엔티티면 내구 저장소에서 복원 (lazy hydration)
//! 3. 커버리지와 요청 구간을 대조해 갭 계산
//! 4. 갭마다 원격 fetch 후 병합. 빈 결과도 커버리지는 확장
//! 5. 병합된 상태에서 관측치 재조회
//! 6. 변경이 있으면 write-back 큐에 스냅샷 적재
//! 7. 실패한 갭은 `unresolved`로 보고
//!
//! 내구 쓰기는 락 밖에서 백그라운드 워커가 수행하므로 락 보유 시간은
//! 원격 fetch 시간에만 비례합니다.

use crate::lock::EntityLockManager;
use crate::persist::{PersistJob, PersistQueue, PersistStats};
use crate::provider::SeriesProvider;
use crate::storage::{decode_snapshot, BlobStore};
use crate::store::{SeriesSnapshot, SeriesStore};
use chrono::NaiveDate;
use findata_core::{CacheConfig, CacheError, DateRange, EntityKey, RangeResult, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// health 응답용 서비스 상태 요약.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub series_count: usize,
    pub dirty_count: usize,
    pub lock_count: usize,
    pub persist: PersistStats,
}

/// 계층형 캐시의 조율자.
///
/// provider와 내구 저장소는 trait 객체로 주입되므로 테스트에서는
/// mock provider와 메모리 저장소로 전체 흐름을 검증합니다.
pub struct DataCacheService {
    store: SeriesStore,
    locks: EntityLockManager,
    provider: Arc<dyn SeriesProvider>,
    durable: Arc<dyn BlobStore>,
    persist: PersistQueue,
    fetch_timeout: Duration,
    lock_timeout: Duration,
}

impl DataCacheService {
    pub fn new(
        provider: Arc<dyn SeriesProvider>,
        durable: Arc<dyn BlobStore>,
        config: &CacheConfig,
    ) -> Self {
        let persist = PersistQueue::start(
            durable.clone(),
            config.persist_queue_capacity,
            config.persist_workers,
        );

        Self {
            store: SeriesStore::new(),
            locks: EntityLockManager::new(),
            provider,
            durable,
            persist,
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            lock_timeout: Duration::from_secs(config.lock_timeout_secs),
        }
    }

    /// 닫힌 날짜 구간 `[start, end]`의 시계열을 반환합니다.
    ///
    /// 캐시에 없는 갭만 원격에서 가져옵니다. 일부 갭의 provider 실패는
    /// 요청 전체를 망치지 않고 해당 구간만 `unresolved`로 보고합니다.
    /// 단, 캐시에 아무것도 없고 모든 fetch가 실패하면 provider 오류입니다.
    #[instrument(skip(self))]
    pub async fn get_range(
        &self,
        key: &EntityKey,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RangeResult> {
        if key.entity_id.trim().is_empty() {
            return Err(CacheError::InvalidRange(
                "entity_id가 비어 있습니다".to_string(),
            ));
        }
        let range = DateRange::new(start, end).ok_or_else(|| {
            CacheError::InvalidRange(format!(
                "start_date {}가 end_date {}보다 늦습니다",
                start, end
            ))
        })?;

        // 같은 엔티티의 요청은 직렬화 - 중복 fetch와 경합 병합 방지.
        // 타임아웃 초과는 정상 경합이 아니라 락 보유자가 멈췄다는 신호.
        let lock = self.locks.lock_for(key).await;
        let _guard = tokio::time::timeout(self.lock_timeout, lock.lock())
            .await
            .map_err(|_| {
                error!(timeout_secs = self.lock_timeout.as_secs(), "엔티티 락 획득 타임아웃");
                CacheError::LockTimeout(format!(
                    "{} 락을 {}초 안에 획득하지 못했습니다",
                    key,
                    self.lock_timeout.as_secs()
                ))
            })?;

        self.hydrate_if_absent(key).await;

        let (cached, missing) = self.store.get_range(key, range).await;
        if missing.is_empty() {
            debug!(rows = cached.len(), "캐시 적중, 원격 조회 없음");
            return Ok(RangeResult::complete(cached));
        }

        debug!(cached = cached.len(), gaps = missing.len(), "캐시 갭 조회 시작");

        let mut unresolved = Vec::new();
        let mut merged_any = false;
        for gap in &missing {
            match tokio::time::timeout(self.fetch_timeout, self.provider.fetch(key, *gap)).await {
                Ok(Ok(fetched)) => {
                    info!(gap = %gap, rows = fetched.len(), "갭 조회 완료");
                    self.store.merge(key, fetched, *gap).await;
                    merged_any = true;
                }
                Ok(Err(e)) => {
                    warn!(gap = %gap, error = %e, "갭 조회 실패, 부분 결과로 응답");
                    unresolved.push(*gap);
                }
                Err(_) => {
                    warn!(
                        gap = %gap,
                        timeout_secs = self.fetch_timeout.as_secs(),
                        "갭 조회 타임아웃"
                    );
                    unresolved.push(*gap);
                }
            }
        }

        // 캐시도 비어 있고 가져온 것도 없으면 응답할 것이 없음
        if !merged_any && cached.is_empty() {
            return Err(CacheError::Provider(format!(
                "{} {} 구간 데이터를 가져오지 못했습니다",
                key, range
            )));
        }

        let (observations, _) = self.store.get_range(key, range).await;

        if merged_any {
            if let Some(snapshot) = self.store.take_dirty_snapshot(key).await {
                let accepted = self
                    .persist
                    .enqueue(PersistJob {
                        blob_name: key.blob_name(),
                        snapshot,
                    })
                    .await;
                // 버려진 스냅샷은 dirty를 되돌려 다음 병합·요청에서 재적재
                if !accepted {
                    self.store.mark_dirty(key).await;
                }
            }
        }

        if unresolved.is_empty() {
            Ok(RangeResult::complete(observations))
        } else {
            Ok(RangeResult::partial(observations, unresolved))
        }
    }

    /// 최초 요청 시 내구 저장소에서 시계열을 복원합니다.
    ///
    /// 복원 실패는 빈 시계열로 간주하고 진행합니다. 내구 계층은 원격 재조회를
    /// 줄이는 최적화이지 정합성의 원천이 아닙니다.
    async fn hydrate_if_absent(&self, key: &EntityKey) {
        if self.store.contains(key).await {
            return;
        }

        let snapshot = match self.durable.load(&key.blob_name()).await {
            Ok(Some(bytes)) => match decode_snapshot(&bytes) {
                Ok(snapshot) => {
                    info!(rows = snapshot.observations.len(), "내구 저장소에서 시계열 복원");
                    snapshot
                }
                Err(e) => {
                    warn!(error = %e, "스냅샷 디코딩 실패, 빈 시계열로 시작");
                    SeriesSnapshot::default()
                }
            },
            Ok(None) => {
                debug!("내구 저장소에 blob 없음, 빈 시계열로 시작");
                SeriesSnapshot::default()
            }
            Err(e) => {
                warn!(error = %e, "내구 저장소 조회 실패, 빈 시계열로 시작");
                SeriesSnapshot::default()
            }
        };

        self.store.hydrate(key, snapshot).await;
    }

    /// 서비스 상태 요약.
    pub async fn stats(&self) -> ServiceStats {
        ServiceStats {
            series_count: self.store.series_count().await,
            dirty_count: self.store.dirty_count().await,
            lock_count: self.locks.lock_count().await,
            persist: self.persist.stats(),
        }
    }

    /// write-back 큐를 드레인하고 종료합니다.
    pub async fn shutdown(&self) {
        info!("데이터 캐시 서비스 종료, write-back 큐 드레인");
        self.persist.shutdown().await;
    }
}
