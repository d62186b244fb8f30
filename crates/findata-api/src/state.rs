//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 캐시 서비스 핸들과 서버 메타데이터를 담습니다.
//! Arc로 래핑되어 여러 요청 간에 안전하게 공유됩니다.

use std::sync::Arc;

use findata_cache::{DataCacheService, ServiceStats};

/// 애플리케이션 공유 상태.
///
/// Axum의 State extractor를 통해 핸들러에 주입됩니다. 캐시 서비스는
/// trait 객체(provider, 내구 저장소)를 주입받아 조립되므로 테스트에서는
/// [`create_test_state`]로 외부 I/O 없는 상태를 만들 수 있습니다.
#[derive(Clone)]
pub struct AppState {
    /// 계층형 캐시 서비스 - 범위 조회, 갭 fetch, write-back 조율
    pub service: Arc<DataCacheService>,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 새로운 AppState 생성.
    pub fn new(service: Arc<DataCacheService>) -> Self {
        Self {
            service,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 서버 업타임(초) 반환.
    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }

    /// 캐시 서비스 상태 요약 반환.
    pub async fn cache_stats(&self) -> ServiceStats {
        self.service.stats().await
    }
}

/// 테스트용 AppState 생성 헬퍼.
///
/// 합성 provider와 메모리 저장소로 조립하므로 외부 I/O 없이 전체
/// 요청 흐름을 검증할 수 있습니다. MockProvider 핸들도 함께 반환하므로
/// 테스트에서 실패/빈 응답 시나리오를 스크립트할 수 있습니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> (AppState, Arc<findata_cache::provider::MockProvider>) {
    use findata_cache::provider::MockProvider;
    use findata_cache::MemoryBlobStore;
    use findata_core::CacheConfig;

    let provider = Arc::new(MockProvider::default());
    let durable = Arc::new(MemoryBlobStore::new());
    let service = DataCacheService::new(provider.clone(), durable, &CacheConfig::default());

    (AppState::new(Arc::new(service)), provider)
}
