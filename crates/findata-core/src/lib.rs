//! # Findata Core
//!
//! 금융/거시경제 시계열 데이터 서비스의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 서비스 전반에서 사용되는 기본 타입을 제공합니다:
//! - 시계열 키 및 관측값 타입
//! - 닫힌 날짜 구간 집합 연산 (커버리지/갭 계산)
//! - 에러 타입
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod error;
pub mod logging;
pub mod range;
pub mod types;

pub use config::*;
pub use error::{CacheError, Result};
pub use logging::*;
pub use range::{insert_range, subtract_covered, DateRange};
pub use types::*;
