//! 데이터 캐시 서비스의 에러 타입.
//!
//! 컴포넌트 경계(원격 프로바이더, 내구 저장소)에서 발생한 I/O 에러는
//! 이 모듈의 분류로 변환된 뒤에만 오케스트레이터에 도달합니다.

use thiserror::Error;

/// 캐시 서비스 핵심 에러.
#[derive(Debug, Error)]
pub enum CacheError {
    /// 원격 프로바이더 에러 (fetch 실패/타임아웃/요청 한도 초과)
    #[error("프로바이더 에러: {0}")]
    Provider(String),

    /// 내구 저장소 에러 (blob load/save 실패)
    #[error("내구 저장소 에러: {0}")]
    DurableStore(String),

    /// 락 타임아웃 (정상 동작에서는 발생하지 않음)
    #[error("락 타임아웃: {0}")]
    LockTimeout(String),

    /// 잘못된 요청 범위 또는 키
    #[error("잘못된 범위: {0}")]
    InvalidRange(String),

    /// 직렬화/역직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),
}

/// 캐시 작업을 위한 Result 타입.
pub type Result<T> = std::result::Result<T, CacheError>;

impl CacheError {
    /// 다음 독립 요청에서 재시도 가능한 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CacheError::Provider(_) | CacheError::DurableStore(_)
        )
    }

    /// 치명적인(알림 대상) 에러인지 확인합니다.
    pub fn is_critical(&self) -> bool {
        matches!(self, CacheError::LockTimeout(_))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::DurableStore(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let provider_err = CacheError::Provider("timeout".to_string());
        assert!(provider_err.is_retryable());

        let range_err = CacheError::InvalidRange("start > end".to_string());
        assert!(!range_err.is_retryable());
    }

    #[test]
    fn test_error_critical() {
        let lock_err = CacheError::LockTimeout("stuck holder".to_string());
        assert!(lock_err.is_critical());

        let provider_err = CacheError::Provider("rate limited".to_string());
        assert!(!provider_err.is_critical());
    }
}
