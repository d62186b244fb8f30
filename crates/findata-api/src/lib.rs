//! 계층형 시계열 캐시의 REST API 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 REST API (날짜 구간 시계열 조회)
//! - 헬스 체크 엔드포인트 (캐시 통계 포함)
//! - graceful shutdown 시 write-back 큐 드레인
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`error`]: 통합 API 에러 응답과 상태 코드 매핑

pub mod error;
pub mod routes;
pub mod state;

pub use error::{cache_error_response, ApiErrorResponse, ApiResult};
pub use routes::*;
pub use state::AppState;

#[cfg(any(test, feature = "test-utils"))]
pub use state::create_test_state;
