//! FRED (Federal Reserve Economic Data) API 클라이언트.
//!
//! 거시경제 지표(CPI, 실업률, 금리 등)의 일/월 단위 관측치를 수집합니다.
//!
//! # API 키
//!
//! 환경변수 `FRED_API_KEY` 또는 설정 `provider.fred_api_key`로 전달합니다.
//! 키가 없으면 매크로 지표 요청은 provider 오류로 실패하며,
//! 자산 시계열은 영향을 받지 않습니다.

use chrono::NaiveDate;
use findata_core::{CacheError, DateRange, Observation, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

/// FRED Open API 클라이언트.
#[derive(Clone)]
pub struct FredApiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

/// observations 응답 래퍼.
#[derive(Debug, Deserialize)]
struct FredObservationsResponse {
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: NaiveDate,
    /// FRED는 결측치를 숫자가 아닌 "."로 표기함
    value: String,
}

impl FredApiClient {
    /// 새로운 FRED API 클라이언트 생성.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("HTTP 클라이언트 생성 실패"),
            api_key,
            base_url: "https://api.stlouisfed.org".to_string(),
        }
    }

    /// 환경변수 `FRED_API_KEY`에서 키를 읽어 클라이언트 생성.
    pub fn from_env() -> Self {
        Self::new(std::env::var("FRED_API_KEY").ok())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// 닫힌 날짜 구간의 지표 관측치를 조회합니다.
    ///
    /// `series_id`는 FRED 시리즈 ID입니다 (예: CPIAUCSL, UNRATE).
    pub async fn fetch_observations(
        &self,
        series_id: &str,
        range: DateRange,
    ) -> Result<Vec<Observation>> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(CacheError::Provider(
                "FRED API 키가 설정되지 않았습니다".to_string(),
            ));
        };

        let url = format!("{}/fred/series/observations", self.base_url);
        let params = [
            ("series_id", series_id.to_string()),
            ("api_key", api_key.to_string()),
            ("file_type", "json".to_string()),
            ("observation_start", range.start.to_string()),
            ("observation_end", range.end.to_string()),
        ];

        debug!(series_id = series_id, start = %range.start, end = %range.end, "FRED API 조회");

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| CacheError::Provider(format!("FRED API 요청 실패 ({}): {}", series_id, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CacheError::Provider(format!(
                "FRED API 오류 ({}): {} - {}",
                series_id, status, body
            )));
        }

        let data: FredObservationsResponse = response
            .json()
            .await
            .map_err(|e| CacheError::Provider(format!("FRED 응답 파싱 오류 ({}): {}", series_id, e)))?;

        Ok(to_observations(data.observations, range))
    }
}

/// 원시 응답을 관측치로 변환. 결측치("." 값)와 구간 밖 날짜는 버립니다.
fn to_observations(raw: Vec<FredObservation>, range: DateRange) -> Vec<Observation> {
    raw.into_iter()
        .filter_map(|o| {
            let value = parse_value(&o.value)?;
            if !range.contains(o.date) {
                return None;
            }
            Some(Observation::new(o.date, value))
        })
        .collect()
}

/// FRED 값 문자열을 Decimal로 파싱. "."은 결측치.
fn parse_value(s: &str) -> Option<Decimal> {
    if s == "." {
        return None;
    }
    s.parse().ok()
}
