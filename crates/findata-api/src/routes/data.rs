//! 시계열 데이터 조회 endpoint.
//!
//! 닫힌 날짜 구간 `[start_date, end_date]`의 일별 시계열을 반환합니다.
//! 캐시에 없는 갭만 원격에서 가져오며, 일부 갭을 해소하지 못한 경우에도
//! 확보한 행과 미해소 구간 목록을 함께 담아 200으로 응답합니다.
//!
//! # 엔드포인트
//!
//! - `GET /api/v1/data?asset_id=AAPL&start_date=2024-01-01&end_date=2024-01-31`
//!
//! `asset_id`의 `M_` 접두사는 거시경제 지표를 의미합니다 (예: `M_CPIAUCSL`).

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use findata_core::{DateRange, EntityKey, Observation, SeriesKind};

use crate::error::{cache_error_response, ApiErrorResponse, ApiResult};
use crate::state::AppState;

// ==================== 요청/응답 타입 ====================

/// 시계열 조회 쿼리 파라미터.
#[derive(Debug, Deserialize)]
pub struct DataQuery {
    /// 자산 티커 또는 지표 ID (예: AAPL, M_CPIAUCSL)
    pub asset_id: String,
    /// 시작 날짜 (YYYY-MM-DD, 포함)
    pub start_date: String,
    /// 종료 날짜 (YYYY-MM-DD, 포함)
    pub end_date: String,
}

/// 시계열 조회 응답.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataResponse {
    /// 요청한 엔티티 ID (접두사 포함 원형 유지)
    pub asset_id: String,
    /// 시계열 종류 (asset | macro)
    pub kind: SeriesKind,
    /// 날짜 오름차순 관측값
    pub observations: Vec<Observation>,
    /// provider 실패로 해소하지 못한 구간 (비어 있으면 완전한 결과)
    pub unresolved_ranges: Vec<DateRange>,
}

// ==================== Handler ====================

/// 날짜 구간 시계열 조회.
///
/// GET /api/v1/data
///
/// # 쿼리 파라미터
/// - `asset_id`: 자산 티커 또는 `M_` 접두사 지표 ID
/// - `start_date`: 시작 날짜 (YYYY-MM-DD)
/// - `end_date`: 종료 날짜 (YYYY-MM-DD)
pub async fn get_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DataQuery>,
) -> ApiResult<Json<DataResponse>> {
    let start = parse_date(&params.start_date, "시작 날짜")?;
    let end = parse_date(&params.end_date, "종료 날짜")?;
    let key = EntityKey::from_id(params.asset_id.trim());

    match state.service.get_range(&key, start, end).await {
        Ok(result) => {
            // 커버는 됐지만 행이 하나도 없는 구간 (예: 전부 비거래일)
            if result.observations.is_empty() && result.unresolved.is_empty() {
                return Err((
                    StatusCode::NOT_FOUND,
                    Json(ApiErrorResponse::new(
                        "NO_DATA",
                        format!("지정한 구간에 데이터가 없습니다: {}", key),
                    )),
                ));
            }

            info!(
                key = %key,
                rows = result.observations.len(),
                unresolved = result.unresolved.len(),
                "시계열 구간 조회 성공"
            );

            Ok(Json(DataResponse {
                asset_id: key.entity_id.clone(),
                kind: key.kind,
                observations: result.observations,
                unresolved_ranges: result.unresolved,
            }))
        }
        Err(e) => {
            // 락 타임아웃 같은 결함 신호는 알림 대상이므로 error로 격상
            if e.is_critical() {
                error!(key = %key, error = %e, "시계열 구간 조회 실패, 결함 신호");
            } else {
                warn!(key = %key, error = %e, "시계열 구간 조회 실패");
            }
            Err(cache_error_response(e))
        }
    }
}

// ==================== 헬퍼 함수 ====================

/// 날짜 파싱.
fn parse_date(
    raw: &str,
    field: &str,
) -> Result<NaiveDate, (StatusCode, Json<ApiErrorResponse>)> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiErrorResponse::new(
                "INVALID_RANGE",
                format!("{} 형식 오류 (YYYY-MM-DD): {}", field, raw),
            )),
        )
    })
}

// ==================== 라우터 ====================

/// 시계열 데이터 라우터 생성.
pub fn data_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use findata_cache::provider::MockProvider;

    use crate::routes::create_api_router;
    use crate::state::create_test_state;

    fn test_app() -> (Router, Arc<MockProvider>) {
        let (state, provider) = create_test_state();
        let app = create_api_router().with_state(Arc::new(state));
        (app, provider)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_get_data_returns_full_range() {
        let (app, _provider) = test_app();

        let (status, body) = get_json(
            app,
            "/api/v1/data?asset_id=AAPL&start_date=2024-01-01&end_date=2024-01-10",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["assetId"], "AAPL");
        assert_eq!(body["kind"], "asset");
        assert_eq!(body["observations"].as_array().unwrap().len(), 10);
        assert_eq!(body["observations"][0]["date"], "2024-01-01");
        assert!(body["unresolvedRanges"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_data_macro_prefix_maps_kind() {
        let (app, _provider) = test_app();

        let (status, body) = get_json(
            app,
            "/api/v1/data?asset_id=M_CPIAUCSL&start_date=2024-01-01&end_date=2024-01-05",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["assetId"], "M_CPIAUCSL");
        assert_eq!(body["kind"], "macro");
    }

    #[tokio::test]
    async fn test_get_data_rejects_malformed_date() {
        let (app, _provider) = test_app();

        let (status, body) = get_json(
            app,
            "/api/v1/data?asset_id=AAPL&start_date=2024-13-01&end_date=2024-01-10",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_RANGE");
    }

    #[tokio::test]
    async fn test_get_data_rejects_reversed_range() {
        let (app, provider) = test_app();

        let (status, body) = get_json(
            app,
            "/api/v1/data?asset_id=AAPL&start_date=2024-02-01&end_date=2024-01-01",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_RANGE");
        // 검증 실패 시 원격 조회 없음
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_get_data_rejects_blank_asset_id() {
        let (app, _provider) = test_app();

        let (status, body) = get_json(
            app,
            "/api/v1/data?asset_id=&start_date=2024-01-01&end_date=2024-01-10",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_RANGE");
    }

    #[tokio::test]
    async fn test_get_data_returns_404_on_empty_range() {
        let (app, provider) = test_app();
        provider.set_return_empty(true);

        let (status, body) = get_json(
            app,
            "/api/v1/data?asset_id=AAPL&start_date=2024-01-06&end_date=2024-01-07",
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NO_DATA");
    }

    #[tokio::test]
    async fn test_get_data_returns_502_when_all_fetches_fail() {
        let (app, provider) = test_app();
        provider.set_fail(true);

        let (status, body) = get_json(
            app,
            "/api/v1/data?asset_id=AAPL&start_date=2024-01-01&end_date=2024-01-10",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "PROVIDER_ERROR");
        assert_eq!(body["retryable"], true);
    }

    #[tokio::test]
    async fn test_get_data_partial_result_reports_unresolved() {
        let (app, provider) = test_app();

        // 1월을 먼저 캐시에 적재
        let (status, _body) = get_json(
            app.clone(),
            "/api/v1/data?asset_id=AAPL&start_date=2024-01-01&end_date=2024-01-31",
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // 2월 갭 조회는 실패 - 캐시된 1월 행 + 미해소 구간으로 응답
        provider.set_fail(true);
        let (status, body) = get_json(
            app,
            "/api/v1/data?asset_id=AAPL&start_date=2024-01-01&end_date=2024-02-15",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["observations"].as_array().unwrap().len(), 31);

        let unresolved = body["unresolvedRanges"].as_array().unwrap();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0]["start"], "2024-02-01");
        assert_eq!(unresolved[0]["end"], "2024-02-15");
    }
}
