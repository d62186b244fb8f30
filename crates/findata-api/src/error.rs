//! 통합 API 에러 응답 타입.
//!
//! 모든 엔드포인트가 같은 에러 형식을 사용합니다:
//!
//! ```json
//! {
//!   "code": "INVALID_RANGE",
//!   "message": "잘못된 범위: start_date 2024-02-01가 end_date 2024-01-01보다 늦습니다",
//!   "timestamp": 1738300800
//! }
//! ```

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use findata_core::CacheError;

/// 통합 API 에러 응답.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "INVALID_RANGE", "NO_DATA", "PROVIDER_ERROR")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 같은 요청을 그대로 다시 보내면 성공할 수 있는지
    #[serde(default)]
    pub retryable: bool,
    /// 에러 발생 타임스탬프 (Unix timestamp, 선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable: false,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// 재시도 가능 여부를 설정합니다.
    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// 에러 코드 반환.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// 에러 메시지 반환.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiErrorResponse>)>;

/// 캐시 서비스 에러를 HTTP 응답으로 변환합니다.
///
/// - `InvalidRange` → 400 (요청 자체가 잘못됨, I/O 없음)
/// - `Provider` → 502 (캐시에도 없고 모든 원격 조회가 실패)
/// - `LockTimeout` → 503 (락 보유자가 멈춘 결함 신호, 재시도 가능)
/// - 나머지 내부 에러 → 500
///
/// 다음 독립 요청에서 재시도할 만한 에러(일시적 원격/저장소 장애)는
/// 응답의 `retryable`로 구분됩니다.
pub fn cache_error_response(err: CacheError) -> (StatusCode, Json<ApiErrorResponse>) {
    let (status, code) = match &err {
        CacheError::InvalidRange(_) => (StatusCode::BAD_REQUEST, "INVALID_RANGE"),
        CacheError::Provider(_) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
        CacheError::LockTimeout(_) => (StatusCode::SERVICE_UNAVAILABLE, "LOCK_TIMEOUT"),
        CacheError::DurableStore(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
        CacheError::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SERIALIZATION_ERROR"),
        CacheError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
    };

    (
        status,
        Json(ApiErrorResponse::new(code, err.to_string()).retryable(err.is_retryable())),
    )
}
