//! 헬스 체크 endpoint.
//!
//! 로드밸런서나 오케스트레이션 시스템(Kubernetes 등)에서 사용됩니다.
//! 캐시 서비스의 상태 요약(시계열 수, write-back 카운터)을 함께 노출합니다.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use findata_cache::ServiceStats;

use crate::state::AppState;

/// 헬스 체크 응답 구조체.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// 전체 서비스 상태 ("healthy" | "degraded")
    pub status: String,

    /// API 버전
    pub version: String,

    /// 서버 업타임(초)
    pub uptime_secs: i64,

    /// 현재 시간 (ISO 8601)
    pub timestamp: String,

    /// 캐시 서비스 상태 요약
    pub cache: ServiceStats,
}

/// 헬스 체크.
///
/// write-back 유실(dropped)이 관측되면 degraded로 보고합니다.
/// 요청 처리는 계속 가능하지만 내구성이 깨진 상태입니다.
/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cache = state.cache_stats().await;

    let status = if cache.persist.dropped > 0 {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        cache,
    })
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(health_check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::state::create_test_state;

    #[tokio::test]
    async fn test_health_returns_stats_json() {
        let (state, _provider) = create_test_state();
        let app = Router::new()
            .nest("/health", health_router())
            .with_state(Arc::new(state));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(health["status"], "healthy");
        assert!(!health["version"].as_str().unwrap().is_empty());
        assert_eq!(health["cache"]["series_count"], 0);
        assert_eq!(health["cache"]["persist"]["dropped"], 0);
    }

    #[tokio::test]
    async fn test_health_reflects_cached_series() {
        use chrono::NaiveDate;
        use findata_core::EntityKey;

        let (state, _provider) = create_test_state();
        let key = EntityKey::asset("AAPL");
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        state.service.get_range(&key, start, end).await.unwrap();

        let app = Router::new()
            .nest("/health", health_router())
            .with_state(Arc::new(state));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(health["cache"]["series_count"], 1);
        assert_eq!(health["cache"]["persist"]["enqueued"], 1);
    }
}
