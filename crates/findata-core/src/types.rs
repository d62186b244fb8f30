//! 시계열 키 및 관측값 정의.
//!
//! 이 모듈은 시계열 데이터 관련 타입을 정의합니다:
//! - `SeriesKind` - 시계열 종류 (자산 vs 거시경제 지표)
//! - `EntityKey` - 하나의 논리적 시계열을 식별하는 키
//! - `Observation` - 일 단위 관측값 (자산은 OHLCV 포함)
//! - `RangeResult` - 범위 질의 결과 (부분 결과의 미해소 구간 포함)

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::range::DateRange;

/// 거시경제 지표 ID 접두사 (예: "M_CPIAUCSL").
pub const MACRO_PREFIX: &str = "M_";

/// 시계열 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    /// 자산 시장 데이터 (주식, ETF 등)
    Asset,
    /// 거시경제 지표 (CPI, 금리 등)
    Macro,
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKind::Asset => write!(f, "asset"),
            SeriesKind::Macro => write!(f, "macro"),
        }
    }
}

/// 하나의 논리적 시계열을 식별하는 키.
///
/// 자산 티커(예: AAPL) 또는 거시경제 지표 ID(예: M_CPIAUCSL)와
/// 시계열 종류로 구성됩니다. 생성 후 불변입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    /// 자산 티커 또는 지표 ID
    pub entity_id: String,
    /// 시계열 종류
    pub kind: SeriesKind,
}

impl EntityKey {
    /// 새 키를 생성합니다.
    pub fn new(entity_id: impl Into<String>, kind: SeriesKind) -> Self {
        Self {
            entity_id: entity_id.into(),
            kind,
        }
    }

    /// 자산 키를 생성합니다.
    pub fn asset(entity_id: impl Into<String>) -> Self {
        Self::new(entity_id, SeriesKind::Asset)
    }

    /// 거시경제 지표 키를 생성합니다.
    pub fn macro_metric(entity_id: impl Into<String>) -> Self {
        Self::new(entity_id, SeriesKind::Macro)
    }

    /// ID 접두사로부터 종류를 유도하여 키를 생성합니다.
    ///
    /// `M_` 접두사가 붙은 ID는 거시경제 지표, 나머지는 자산으로 분류됩니다.
    pub fn from_id(entity_id: impl Into<String>) -> Self {
        let entity_id = entity_id.into();
        let kind = if entity_id.starts_with(MACRO_PREFIX) {
            SeriesKind::Macro
        } else {
            SeriesKind::Asset
        };
        Self { entity_id, kind }
    }

    /// 외부 프로바이더에 전달할 ID를 반환합니다.
    ///
    /// 거시경제 지표는 `M_` 접두사를 제거한 원 지표 ID를 사용합니다
    /// (예: `M_CPIAUCSL` → `CPIAUCSL`).
    pub fn provider_id(&self) -> &str {
        match self.kind {
            SeriesKind::Macro => self
                .entity_id
                .strip_prefix(MACRO_PREFIX)
                .unwrap_or(&self.entity_id),
            SeriesKind::Asset => &self.entity_id,
        }
    }

    /// 내구 저장소의 blob 이름을 반환합니다.
    ///
    /// `M_` 접두사가 종류를 이미 구분하므로 이름 충돌이 없습니다.
    pub fn blob_name(&self) -> String {
        format!("{}.json.gz", self.entity_id)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.entity_id)
    }
}

/// 일 단위 관측값.
///
/// `value`는 자산의 경우 종가, 거시경제 지표의 경우 지표값입니다.
/// OHLCV 필드는 자산 시계열에서만 채워집니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// 관측 날짜
    pub date: NaiveDate,
    /// 대표값 (종가 또는 지표값)
    pub value: Decimal,
    /// 시가
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,
    /// 고가
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,
    /// 저가
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,
    /// 거래량
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
}

impl Observation {
    /// 단일 값 관측을 생성합니다 (거시경제 지표용).
    pub fn new(date: NaiveDate, value: Decimal) -> Self {
        Self {
            date,
            value,
            open: None,
            high: None,
            low: None,
            volume: None,
        }
    }

    /// OHLCV 관측을 생성합니다 (자산용). `value`는 종가로 설정됩니다.
    pub fn ohlcv(
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: u64,
    ) -> Self {
        Self {
            date,
            value: close,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            volume: Some(volume),
        }
    }
}

/// 범위 질의 결과.
///
/// 요청 구간에서 확보한 관측값과, 프로바이더 실패 등으로 해소하지 못한
/// 구간 목록을 함께 전달합니다. `unresolved`가 비어 있으면 완전한 결과입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeResult {
    /// 날짜 오름차순 관측값
    pub observations: Vec<Observation>,
    /// 해소하지 못한 구간
    pub unresolved: Vec<DateRange>,
}

impl RangeResult {
    /// 완전한 결과를 생성합니다.
    pub fn complete(observations: Vec<Observation>) -> Self {
        Self {
            observations,
            unresolved: Vec::new(),
        }
    }

    /// 부분 결과를 생성합니다.
    pub fn partial(observations: Vec<Observation>, unresolved: Vec<DateRange>) -> Self {
        Self {
            observations,
            unresolved,
        }
    }

    /// 미해소 구간이 없는지 확인합니다.
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kind_from_id_prefix() {
        assert_eq!(EntityKey::from_id("AAPL").kind, SeriesKind::Asset);
        assert_eq!(EntityKey::from_id("M_CPIAUCSL").kind, SeriesKind::Macro);
    }

    #[test]
    fn test_provider_id_strips_macro_prefix() {
        let key = EntityKey::from_id("M_CPIAUCSL");
        assert_eq!(key.provider_id(), "CPIAUCSL");

        let key = EntityKey::asset("AAPL");
        assert_eq!(key.provider_id(), "AAPL");
    }

    #[test]
    fn test_blob_name_keeps_raw_id() {
        assert_eq!(EntityKey::asset("AAPL").blob_name(), "AAPL.json.gz");
        assert_eq!(
            EntityKey::from_id("M_CPIAUCSL").blob_name(),
            "M_CPIAUCSL.json.gz"
        );
    }

    #[test]
    fn test_entity_key_display() {
        let key = EntityKey::asset("AAPL");
        assert_eq!(key.to_string(), "asset:AAPL");
    }

    #[test]
    fn test_ohlcv_value_is_close() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let obs = Observation::ohlcv(date, dec!(184.0), dec!(186.5), dec!(183.2), dec!(185.9), 1000);
        assert_eq!(obs.value, dec!(185.9));
        assert_eq!(obs.open, Some(dec!(184.0)));
    }
}
