//! 메모리 Series Store.
//!
//! 엔티티별로 날짜 정렬된 관측치(`BTreeMap`)와 커버리지 구간 목록을 보관합니다.
//! 커버리지 구간은 "이 날짜 구간은 이미 원격에서 조회됨"을 뜻하므로,
//! 관측치가 하나도 없는 구간(비거래일 등)도 커버된 것으로 기록할 수 있습니다.

use chrono::NaiveDate;
use findata_core::{insert_range, subtract_covered, DateRange, EntityKey, Observation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// 단일 엔티티의 시계열 상태.
#[derive(Debug, Default)]
pub struct Series {
    /// 날짜 → 관측치. BTreeMap이므로 항상 날짜 오름차순.
    observations: BTreeMap<NaiveDate, Observation>,
    /// 이미 조회된 날짜 구간. 서로 겹치지 않고 정렬 상태 유지.
    covered: Vec<DateRange>,
    /// 마지막 내구 기록 이후 변경 여부.
    dirty: bool,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// 내구 저장소 스냅샷에서 시계열을 복원합니다.
    pub fn from_snapshot(snapshot: SeriesSnapshot) -> Self {
        let mut observations = BTreeMap::new();
        for obs in snapshot.observations {
            observations.insert(obs.date, obs);
        }
        Self {
            observations,
            covered: snapshot.covered,
            dirty: false,
        }
    }

    /// 요청 구간의 관측치와, 아직 커버되지 않은 갭 목록을 반환합니다.
    pub fn get_range(&self, range: DateRange) -> (Vec<Observation>, Vec<DateRange>) {
        let observations = self
            .observations
            .range(range.start..=range.end)
            .map(|(_, obs)| obs.clone())
            .collect();
        let missing = subtract_covered(range, &self.covered);
        (observations, missing)
    }

    /// 원격에서 가져온 관측치를 병합하고 커버리지를 확장합니다.
    ///
    /// 같은 날짜는 새 값으로 덮어씁니다 (last-write-wins).
    /// 빈 관측치 목록도 커버리지는 확장합니다 - "조회했지만 데이터 없음"도
    /// 유효한 결과이므로 같은 구간을 다시 조회하지 않습니다.
    pub fn merge(&mut self, observations: Vec<Observation>, fetched: DateRange) {
        for obs in observations {
            // provider가 요청 구간 밖 데이터를 돌려줘도 커버리지와 어긋나지 않게 잘라냄
            if fetched.contains(obs.date) {
                self.observations.insert(obs.date, obs);
            }
        }
        self.covered = insert_range(&self.covered, fetched);
        self.dirty = true;
    }

    /// 내구 기록용 전체 스냅샷.
    pub fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot {
            observations: self.observations.values().cloned().collect(),
            covered: self.covered.clone(),
        }
    }

}

/// 내구 저장소에 기록되는 시계열 전체 이미지.
///
/// 증분이 아닌 전체 이미지이므로 쓰기 순서가 뒤바뀌어도 최종 상태는
/// 어느 한 시점의 일관된 스냅샷입니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    pub observations: Vec<Observation>,
    pub covered: Vec<DateRange>,
}

/// 엔티티별 시계열 레지스트리.
///
/// 맵 수준 RwLock만 사용합니다. 병합은 순수 메모리 연산이라 임계 구역이
/// 짧고, 엔티티별 쓰기 직렬화는 [`crate::lock::EntityLockManager`]가 담당합니다.
#[derive(Debug, Default)]
pub struct SeriesStore {
    series: RwLock<HashMap<EntityKey, Series>>,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 해당 엔티티가 레지스트리에 있는지 확인합니다.
    ///
    /// 복원 시도 여부 판단에 쓰입니다. 빈 시계열로라도 등록되어 있으면
    /// 내구 저장소를 다시 조회하지 않습니다.
    pub async fn contains(&self, key: &EntityKey) -> bool {
        self.series.read().await.contains_key(key)
    }

    /// 요청 구간의 관측치와 미커버 갭을 반환합니다.
    ///
    /// 등록되지 않은 엔티티는 전체 구간이 갭입니다.
    pub async fn get_range(&self, key: &EntityKey, range: DateRange) -> (Vec<Observation>, Vec<DateRange>) {
        let series = self.series.read().await;
        match series.get(key) {
            Some(s) => s.get_range(range),
            None => (Vec::new(), vec![range]),
        }
    }

    /// 관측치를 병합합니다. 엔티티가 없으면 새로 만듭니다.
    pub async fn merge(&self, key: &EntityKey, observations: Vec<Observation>, fetched: DateRange) {
        let mut series = self.series.write().await;
        series
            .entry(key.clone())
            .or_default()
            .merge(observations, fetched);
    }

    /// 스냅샷으로 시계열을 등록합니다. 이미 있으면 기존 상태를 유지합니다.
    ///
    /// 복원은 엔티티 락 안에서 최초 요청 시 한 번만 일어나므로 기존 상태를
    /// 덮어쓰는 경우는 없지만, insert-if-absent 의미론을 유지합니다.
    pub async fn hydrate(&self, key: &EntityKey, snapshot: SeriesSnapshot) {
        let mut series = self.series.write().await;
        series
            .entry(key.clone())
            .or_insert_with(|| Series::from_snapshot(snapshot));
    }

    /// dirty 상태면 스냅샷을 반환하고 플래그를 내립니다.
    ///
    /// 반환된 스냅샷이 쓰기 큐에 들어간 뒤 다시 병합이 일어나면 플래그가
    /// 다시 올라가므로, 변경이 없는 요청에서는 중복 쓰기가 발생하지 않습니다.
    pub async fn take_dirty_snapshot(&self, key: &EntityKey) -> Option<SeriesSnapshot> {
        let mut series = self.series.write().await;
        let s = series.get_mut(key)?;
        if !s.dirty {
            return None;
        }
        s.dirty = false;
        Some(s.snapshot())
    }

    /// 시계열을 다시 dirty로 표시합니다.
    ///
    /// write-back 큐 적재에 실패한 스냅샷을 되돌릴 때 사용합니다.
    /// 되돌리지 않으면 다음 병합까지 변경분이 재적재 대상에서 빠집니다.
    pub async fn mark_dirty(&self, key: &EntityKey) {
        let mut series = self.series.write().await;
        if let Some(s) = series.get_mut(key) {
            s.dirty = true;
        }
    }

    pub async fn series_count(&self) -> usize {
        self.series.read().await.len()
    }

    pub async fn dirty_count(&self) -> usize {
        self.series
            .read()
            .await
            .values()
            .filter(|s| s.dirty)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn range(start: NaiveDate, end: NaiveDate) -> DateRange {
        DateRange::new(start, end).unwrap()
    }

    fn obs(y: i32, m: u32, d: u32, value: i64) -> Observation {
        Observation::new(date(y, m, d), Decimal::from(value))
    }

    fn key() -> EntityKey {
        EntityKey::asset("AAPL")
    }

    #[tokio::test]
    async fn test_get_range_on_empty_store_is_all_missing() {
        let store = SeriesStore::new();
        let request = range(date(2024, 1, 1), date(2024, 1, 31));

        let (rows, missing) = store.get_range(&key(), request).await;

        assert!(rows.is_empty());
        assert_eq!(missing, vec![request]);
    }

    #[tokio::test]
    async fn test_merge_then_get_range_is_complete() {
        let store = SeriesStore::new();
        let request = range(date(2024, 1, 1), date(2024, 1, 3));

        store
            .merge(
                &key(),
                vec![obs(2024, 1, 1, 10), obs(2024, 1, 2, 11), obs(2024, 1, 3, 12)],
                request,
            )
            .await;

        let (rows, missing) = store.get_range(&key(), request).await;
        assert_eq!(rows.len(), 3);
        assert!(missing.is_empty());
        // 날짜 오름차순 보장
        assert_eq!(rows[0].date, date(2024, 1, 1));
        assert_eq!(rows[2].date, date(2024, 1, 3));
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let store = SeriesStore::new();
        let fetched = range(date(2024, 1, 1), date(2024, 1, 2));
        let rows = vec![obs(2024, 1, 1, 10), obs(2024, 1, 2, 11)];

        store.merge(&key(), rows.clone(), fetched).await;
        let first = store.take_dirty_snapshot(&key()).await.unwrap();

        store.merge(&key(), rows, fetched).await;
        let second = store.take_dirty_snapshot(&key()).await.unwrap();

        assert_eq!(first.observations.len(), second.observations.len());
        assert_eq!(first.covered, second.covered);
    }

    #[tokio::test]
    async fn test_merge_last_write_wins_per_date() {
        let store = SeriesStore::new();
        let fetched = range(date(2024, 1, 1), date(2024, 1, 1));

        store.merge(&key(), vec![obs(2024, 1, 1, 10)], fetched).await;
        store.merge(&key(), vec![obs(2024, 1, 1, 99)], fetched).await;

        let (rows, _) = store.get_range(&key(), fetched).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, Decimal::from(99));
    }

    #[tokio::test]
    async fn test_zero_row_merge_extends_coverage() {
        let store = SeriesStore::new();
        // 주말처럼 관측치가 없는 구간을 조회한 경우
        let weekend = range(date(2024, 1, 6), date(2024, 1, 7));

        store.merge(&key(), Vec::new(), weekend).await;

        let (rows, missing) = store.get_range(&key(), weekend).await;
        assert!(rows.is_empty());
        assert!(missing.is_empty(), "커버된 구간은 다시 조회하지 않아야 함");
    }

    #[tokio::test]
    async fn test_merge_trims_rows_outside_fetched_range() {
        let store = SeriesStore::new();
        let fetched = range(date(2024, 1, 1), date(2024, 1, 2));

        // provider가 구간 밖 날짜를 돌려준 경우
        store
            .merge(
                &key(),
                vec![obs(2024, 1, 1, 10), obs(2024, 1, 5, 50)],
                fetched,
            )
            .await;

        let (rows, _) = store
            .get_range(&key(), range(date(2024, 1, 1), date(2024, 1, 10)))
            .await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, date(2024, 1, 1));
    }

    #[tokio::test]
    async fn test_partial_coverage_reports_gap() {
        let store = SeriesStore::new();
        store
            .merge(
                &key(),
                vec![obs(2024, 1, 1, 10)],
                range(date(2024, 1, 1), date(2024, 1, 31)),
            )
            .await;

        let request = range(date(2024, 1, 15), date(2024, 2, 15));
        let (_, missing) = store.get_range(&key(), request).await;

        assert_eq!(missing, vec![range(date(2024, 2, 1), date(2024, 2, 15))]);
    }

    #[tokio::test]
    async fn test_take_dirty_snapshot_clears_flag() {
        let store = SeriesStore::new();
        let fetched = range(date(2024, 1, 1), date(2024, 1, 1));
        store.merge(&key(), vec![obs(2024, 1, 1, 10)], fetched).await;

        assert!(store.take_dirty_snapshot(&key()).await.is_some());
        assert!(store.take_dirty_snapshot(&key()).await.is_none());

        // 다시 병합하면 플래그가 다시 올라감
        store.merge(&key(), vec![obs(2024, 1, 2, 11)], range(date(2024, 1, 2), date(2024, 1, 2))).await;
        assert!(store.take_dirty_snapshot(&key()).await.is_some());
    }

    #[tokio::test]
    async fn test_mark_dirty_restores_snapshot_eligibility() {
        let store = SeriesStore::new();
        let fetched = range(date(2024, 1, 1), date(2024, 1, 1));
        store.merge(&key(), vec![obs(2024, 1, 1, 10)], fetched).await;

        let snapshot = store.take_dirty_snapshot(&key()).await.unwrap();
        assert!(store.take_dirty_snapshot(&key()).await.is_none());

        // 적재 실패로 되돌린 시계열은 같은 스냅샷을 다시 내놓아야 함
        store.mark_dirty(&key()).await;
        let again = store.take_dirty_snapshot(&key()).await.unwrap();
        assert_eq!(again.observations.len(), snapshot.observations.len());
        assert_eq!(again.covered, snapshot.covered);
    }

    #[tokio::test]
    async fn test_hydrate_populates_series_as_clean() {
        let store = SeriesStore::new();
        let snapshot = SeriesSnapshot {
            observations: vec![obs(2024, 1, 1, 10), obs(2024, 1, 2, 11)],
            covered: vec![range(date(2024, 1, 1), date(2024, 1, 5))],
        };

        store.hydrate(&key(), snapshot).await;

        assert!(store.contains(&key()).await);
        let (rows, missing) = store
            .get_range(&key(), range(date(2024, 1, 1), date(2024, 1, 5)))
            .await;
        assert_eq!(rows.len(), 2);
        assert!(missing.is_empty());
        // 복원 직후에는 쓸 것이 없음
        assert!(store.take_dirty_snapshot(&key()).await.is_none());
    }

    #[tokio::test]
    async fn test_hydrate_keeps_existing_series() {
        let store = SeriesStore::new();
        let fetched = range(date(2024, 1, 1), date(2024, 1, 1));
        store.merge(&key(), vec![obs(2024, 1, 1, 10)], fetched).await;

        // 이미 등록된 엔티티는 스냅샷으로 덮어쓰지 않음
        store
            .hydrate(
                &key(),
                SeriesSnapshot {
                    observations: vec![obs(2024, 1, 1, 99)],
                    covered: vec![fetched],
                },
            )
            .await;

        let (rows, _) = store.get_range(&key(), fetched).await;
        assert_eq!(rows[0].value, Decimal::from(10));
    }
}
