//! Query filters and pagination for stored registrations.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::registration::DomainRegistration;
use crate::utils::error::IndexerError;

/// Time lower bound plus case-insensitive name substring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainFilter {
    pub since: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

impl DomainFilter {
    #[must_use]
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Blank search strings are ignored.
    #[must_use]
    pub fn search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        let term = term.trim();
        self.search = (!term.is_empty()).then(|| term.to_string());
        self
    }

    /// Registrations since midnight UTC today.
    #[must_use]
    pub fn today() -> Self {
        let midnight = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc());
        Self {
            since: midnight,
            search: None,
        }
    }

    /// In-memory evaluation, shared by the memory and file stores.
    #[must_use]
    pub fn matches(&self, domain: &DomainRegistration) -> bool {
        if let Some(since) = self.since {
            if domain.timestamp < since {
                return false;
            }
        }
        match &self.search {
            Some(term) => domain.name.to_lowercase().contains(&term.to_lowercase()),
            None => true,
        }
    }
}

/// Dashboard time windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    #[default]
    All,
    Days(u32),
}

impl TimeRange {
    const ALLOWED_DAYS: [u32; 8] = [3, 5, 7, 10, 14, 21, 30, 90];

    /// Lower bound relative to `now`.
    #[must_use]
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeRange::All => None,
            TimeRange::Days(days) => Some(now - Duration::days(i64::from(*days))),
        }
    }

    #[must_use]
    pub fn to_filter(&self) -> DomainFilter {
        DomainFilter {
            since: self.since(Utc::now()),
            search: None,
        }
    }
}

impl FromStr for TimeRange {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "all" {
            return Ok(TimeRange::All);
        }
        s.strip_suffix('d')
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|n| Self::ALLOWED_DAYS.contains(n))
            .map(TimeRange::Days)
            .ok_or_else(|| IndexerError::ConfigError(format!("Unknown time range '{s}'")))
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 50 }
    }
}

impl Pagination {
    #[must_use]
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.limit as usize
    }
}

/// One page of query results with totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainPage {
    pub domains: Vec<DomainRegistration>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl DomainPage {
    #[must_use]
    pub fn new(domains: Vec<DomainRegistration>, total: u64, pagination: Pagination) -> Self {
        let limit = u64::from(pagination.limit.max(1));
        let total_pages = u32::try_from(total.div_ceil(limit)).unwrap_or(u32::MAX);
        Self {
            domains,
            total,
            page: pagination.page,
            limit: pagination.limit,
            total_pages,
        }
    }
}
