//! 원격 시계열 provider.
//!
//! 캐시 미스 구간을 채우는 데이터 소스입니다. 구현은 [`SeriesProvider`]
//! trait 뒤에 있어 서비스 조립 시 주입되고, 테스트에서는 mock으로 대체합니다.

pub mod fred;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod yahoo;

pub use fred::FredApiClient;
#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockProvider;
pub use yahoo::YahooFinanceProvider;

use async_trait::async_trait;
use findata_core::{DateRange, EntityKey, Observation, Result, SeriesKind};

/// 원격 데이터 소스 인터페이스.
#[async_trait]
pub trait SeriesProvider: Send + Sync {
    /// 닫힌 날짜 구간의 일별 관측치를 가져옵니다.
    ///
    /// 비거래일만 포함한 구간이면 빈 Vec을 반환할 수 있으며,
    /// 이것도 성공 응답입니다.
    async fn fetch(&self, key: &EntityKey, range: DateRange) -> Result<Vec<Observation>>;
}

/// 엔티티 종류별로 실제 데이터 소스에 라우팅하는 운영용 provider.
///
/// - [`SeriesKind::Asset`] → Yahoo Finance (OHLCV 일봉)
/// - [`SeriesKind::Macro`] → FRED (단일 값 관측치)
pub struct MarketDataProvider {
    yahoo: YahooFinanceProvider,
    fred: FredApiClient,
}

impl MarketDataProvider {
    pub fn new(yahoo: YahooFinanceProvider, fred: FredApiClient) -> Self {
        Self { yahoo, fred }
    }
}

#[async_trait]
impl SeriesProvider for MarketDataProvider {
    async fn fetch(&self, key: &EntityKey, range: DateRange) -> Result<Vec<Observation>> {
        match key.kind {
            SeriesKind::Asset => self.yahoo.fetch_daily(key.provider_id(), range).await,
            SeriesKind::Macro => self.fred.fetch_observations(key.provider_id(), range).await,
        }
    }
}
