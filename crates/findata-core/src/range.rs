//! 닫힌 날짜 구간 및 구간 집합 연산.
//!
//! 이 모듈은 시계열 커버리지 추적의 기반이 되는 연산을 정의합니다:
//! - `DateRange` - 양끝 포함 닫힌 날짜 구간 `[start, end]`
//! - `insert_range` - 정렬된 서로소 구간 집합에 구간 삽입 (인접/중첩 병합)
//! - `subtract_covered` - 요청 구간에서 커버된 구간을 뺀 갭 계산
//!
//! 닫힌 구간 경계의 ±1일 연산은 모두 이 모듈 안에서만 일어납니다.
//! `[1월 1일, 1월 5일]`과 `[1월 6일, 1월 10일]`은 맞닿은 구간으로
//! `[1월 1일, 1월 10일]` 하나로 병합됩니다.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 양끝 포함 닫힌 날짜 구간 `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// 시작일 (포함)
    pub start: NaiveDate,
    /// 종료일 (포함)
    pub end: NaiveDate,
}

impl DateRange {
    /// 새 구간을 생성합니다. `start > end`이면 None을 반환합니다.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        if start > end {
            None
        } else {
            Some(Self { start, end })
        }
    }

    /// 하루짜리 구간을 생성합니다.
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// 구간에 포함된 날짜 수를 반환합니다 (양끝 포함).
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// 날짜가 구간에 포함되는지 확인합니다.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// 다른 구간 전체를 포함하는지 확인합니다.
    pub fn contains_range(&self, other: &DateRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// 두 구간이 겹치는지 확인합니다.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// 두 구간이 겹치거나 맞닿아 하나로 병합 가능한지 확인합니다.
    ///
    /// 닫힌 구간이므로 `[a, b]`와 `[b+1, c]`도 병합 대상입니다.
    pub fn touches(&self, other: &DateRange) -> bool {
        match (self.end.succ_opt(), other.end.succ_opt()) {
            (Some(self_next), Some(other_next)) => {
                self.start <= other_next && other.start <= self_next
            }
            // 달력 범위 끝에서는 +1일이 없으므로 겹침만 판정
            _ => self.overlaps(other),
        }
    }

    /// 두 구간의 합집합을 반환합니다. `touches`가 참일 때만 의미가 있습니다.
    pub fn union(&self, other: &DateRange) -> DateRange {
        DateRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// 두 구간의 교집합을 반환합니다.
    pub fn intersect(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        DateRange::new(start, end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// 정렬된 서로소 구간 집합에 새 구간을 삽입합니다.
///
/// 겹치거나 맞닿은(하루 차이) 기존 구간은 새 구간과 하나로 병합되며,
/// 결과는 다시 정렬된 서로소 집합입니다.
pub fn insert_range(covered: &[DateRange], new: DateRange) -> Vec<DateRange> {
    let mut result = Vec::with_capacity(covered.len() + 1);
    let mut merged = new;
    let mut placed = false;

    for r in covered {
        if placed {
            result.push(*r);
        } else if r.touches(&merged) {
            merged = merged.union(r);
        } else if r.end < merged.start {
            result.push(*r);
        } else {
            // r이 merged보다 이틀 이상 뒤 - merged 확정
            result.push(merged);
            placed = true;
            result.push(*r);
        }
    }
    if !placed {
        result.push(merged);
    }

    result
}

/// 요청 구간에서 커버된 구간들을 뺀 나머지(갭)를 계산합니다.
///
/// `covered`는 정렬된 서로소 집합이어야 하며, 결과는 요청 구간 내의
/// 커버되지 않은 닫힌 부분 구간을 날짜 오름차순으로 반환합니다.
/// 커버 구간 수에 비례하는 시간에 동작합니다.
pub fn subtract_covered(request: DateRange, covered: &[DateRange]) -> Vec<DateRange> {
    let mut gaps = Vec::new();
    let mut cursor = request.start;

    for r in covered {
        if r.end < request.start {
            continue;
        }
        if r.start > request.end {
            break;
        }
        // cursor..(r.start - 1)이 갭
        if r.start > cursor {
            if let Some(gap_end) = r.start.pred_opt() {
                if cursor <= gap_end {
                    gaps.push(DateRange {
                        start: cursor,
                        end: gap_end,
                    });
                }
            }
        }
        match r.end.succ_opt() {
            Some(next) if next > cursor => cursor = next,
            Some(_) => {}
            // 달력 끝까지 커버됨
            None => return gaps,
        }
        if cursor > request.end {
            return gaps;
        }
    }

    if cursor <= request.end {
        gaps.push(DateRange {
            start: cursor,
            end: request.end,
        });
    }

    gaps
}
