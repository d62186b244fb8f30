//! 계층형 시계열 캐시 crate.
//!
//! 세 개의 계층으로 일별 시계열 데이터를 제공합니다:
//!
//! 1. **메모리 Series Store** - 엔티티별 날짜 정렬 관측치와 커버리지 구간
//! 2. **내구 blob 저장소** - gzip 압축 스냅샷 (Redis), 재시작 간 원격 재조회 방지
//! 3. **원격 provider** - Yahoo Finance (자산), FRED (매크로 지표)
//!
//! [`DataCacheService`]가 세 계층을 조율합니다: 요청 구간에서 커버되지 않은
//! 갭만 원격에서 가져와 병합하고, 변경된 시계열은 백그라운드 워커가
//! 내구 저장소에 기록합니다.

pub mod lock;
pub mod persist;
pub mod provider;
pub mod service;
pub mod storage;
pub mod store;

pub use lock::EntityLockManager;
pub use persist::{PersistJob, PersistQueue, PersistStats};
pub use provider::{FredApiClient, MarketDataProvider, SeriesProvider, YahooFinanceProvider};
pub use service::{DataCacheService, ServiceStats};
pub use storage::{decode_snapshot, encode_snapshot, BlobStore, MemoryBlobStore, RedisBlobStore};
pub use store::{Series, SeriesSnapshot, SeriesStore};
