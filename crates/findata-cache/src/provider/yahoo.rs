//! Yahoo Finance provider.
//!
//! 자산(주식, ETF, 지수) 시계열의 일봉 OHLCV를 수집합니다.

use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use findata_core::{CacheError, DateRange, Observation, Result};
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::debug;

/// Yahoo Finance 커넥터 래퍼.
pub struct YahooFinanceProvider {
    connector: yahoo_finance_api::YahooConnector,
}

impl YahooFinanceProvider {
    pub fn new() -> Result<Self> {
        let connector = yahoo_finance_api::YahooConnector::new()
            .map_err(|e| CacheError::Provider(format!("Yahoo Finance 연결 실패: {}", e)))?;
        Ok(Self { connector })
    }

    /// 닫힌 날짜 구간의 일봉을 조회합니다.
    ///
    /// Yahoo API의 종료 시각은 배타적이므로 종료일 다음 자정까지 조회해
    /// 종료일 당일 봉을 포함시킵니다.
    pub async fn fetch_daily(&self, ticker: &str, range: DateRange) -> Result<Vec<Observation>> {
        let start = naive_date_to_offset_datetime(range.start);
        let end_exclusive = range.end.succ_opt().unwrap_or(range.end);
        let end = naive_date_to_offset_datetime(end_exclusive);

        debug!(
            ticker = ticker,
            start = %range.start,
            end = %range.end,
            "Yahoo Finance 일봉 조회"
        );

        let response = self
            .connector
            .get_quote_history_interval(ticker, start, end, "1d")
            .await
            .map_err(|e| {
                CacheError::Provider(format!("Yahoo Finance API 오류 ({}): {}", ticker, e))
            })?;

        let quotes = response
            .quotes()
            .map_err(|e| CacheError::Provider(format!("Quote 파싱 오류 ({}): {}", ticker, e)))?;

        let mut observations: Vec<Observation> = quotes
            .iter()
            .filter_map(|q| {
                let date = Utc
                    .timestamp_opt(q.timestamp as i64, 0)
                    .single()?
                    .date_naive();
                // 조회 여유분 탓에 구간 밖 봉이 섞여올 수 있음
                if !range.contains(date) {
                    return None;
                }
                Some(Observation::ohlcv(
                    date,
                    Decimal::from_f64_retain(q.open).unwrap_or_default(),
                    Decimal::from_f64_retain(q.high).unwrap_or_default(),
                    Decimal::from_f64_retain(q.low).unwrap_or_default(),
                    Decimal::from_f64_retain(q.close).unwrap_or_default(),
                    q.volume,
                ))
            })
            .collect();

        observations.sort_by_key(|o| o.date);
        Ok(observations)
    }
}

/// NaiveDate를 OffsetDateTime으로 변환.
fn naive_date_to_offset_datetime(date: NaiveDate) -> OffsetDateTime {
    let (year, month, day) = (date.year(), date.month() as u8, date.day() as u8);
    time::Date::from_calendar_date(year, time::Month::try_from(month).unwrap(), day)
        .unwrap()
        .midnight()
        .assume_utc()
}
