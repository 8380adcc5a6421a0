use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// One request log row, from either `GET /logs` or `GET /admin/logs`.
/// Every field is optional: the two endpoints return different subsets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEntry {
    pub id: Option<i64>,
    pub created_at: Option<String>,
    pub username: Option<String>,
    pub action: Option<String>,
    pub status: Option<String>,
    pub status_code: Option<i64>,
    pub latency_ms: Option<f64>,
    /// Only present when the backend logs request IPs.
    pub ip_address: Option<String>,
    pub reject_reason: Option<String>,
    pub api_key_id: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub steps: Option<i64>,
    pub samples: Option<i64>,
}

impl LogEntry {
    pub fn created_at(&self) -> Option<NaiveDateTime> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }

    /// Lowercased haystack the text query is matched against.
    fn haystack(&self) -> String {
        let code = self.status_code.map(|c| c.to_string());
        [
            self.username.as_deref(),
            self.action.as_deref(),
            self.status.as_deref(),
            code.as_deref(),
            self.reject_reason.as_deref(),
            self.ip_address.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
    }
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a backend timestamp. Naive ISO strings are taken as-is; strings
/// with an offset are converted to UTC. A bare date means midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogTab {
    #[default]
    Mine,
    All,
}

impl LogTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTab::Mine => "mine",
            LogTab::All => "all",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LogTab::Mine => "My logs",
            LogTab::All => "All logs",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            LogTab::Mine => LogTab::All,
            LogTab::All => LogTab::Mine,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
    pub query: String,
}

impl LogFilter {
    /// Build a filter from raw inputs. Blank bounds are open. A date-only
    /// upper bound covers the whole day.
    pub fn parse(from: &str, to: &str, query: &str) -> Result<Self, CoreError> {
        let from = parse_bound(from, "from")?;
        let to = match parse_bound(to, "to")? {
            Some(dt) if is_date_only(to) => {
                Some(dt + Duration::days(1) - Duration::milliseconds(1))
            }
            other => other,
        };
        Ok(Self {
            from,
            to,
            query: query.trim().to_string(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.query.trim().is_empty()
    }

    /// Entries whose timestamp does not parse are never excluded by the
    /// date range.
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(created) = entry.created_at() {
            if self.from.is_some_and(|from| created < from) {
                return false;
            }
            if self.to.is_some_and(|to| created > to) {
                return false;
            }
        }
        let q = self.query.trim().to_lowercase();
        q.is_empty() || entry.haystack().contains(&q)
    }
}

fn parse_bound(raw: &str, which: &str) -> Result<Option<NaiveDateTime>, CoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    parse_timestamp(raw)
        .map(Some)
        .ok_or_else(|| CoreError::InvalidInput(format!("invalid {which} date: {raw:?}")))
}

fn is_date_only(raw: &str) -> bool {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").is_ok()
}

pub fn filter_logs<'a>(logs: &'a [LogEntry], filter: &LogFilter) -> Vec<&'a LogEntry> {
    logs.iter().filter(|e| filter.matches(e)).collect()
}

/// One page of a filtered list.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
}

impl<T> Page<'_, T> {
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn info(&self) -> String {
        format!("{}/{}", self.page, self.total_pages)
    }
}

/// 1-based page cursor. The page is only clamped against the list when a
/// page is taken, so `next` may run past the end until then.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogPager {
    page: usize,
    page_size: usize,
}

impl Default for LogPager {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

impl LogPager {
    pub const DEFAULT_PAGE_SIZE: usize = 50;
    pub const PAGE_SIZES: [usize; 4] = [20, 50, 100, 200];

    pub fn with_page_size(page_size: usize) -> Self {
        let mut pager = Self::default();
        pager.set_page_size(page_size);
        pager
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.page_size).max(1)
    }

    pub fn set_page_size(&mut self, size: usize) {
        self.page_size = if size == 0 {
            Self::DEFAULT_PAGE_SIZE
        } else {
            size
        };
        self.page = 1;
    }

    /// Step to the next entry of `PAGE_SIZES`, wrapping around.
    pub fn cycle_page_size(&mut self) {
        let next = Self::PAGE_SIZES
            .iter()
            .copied()
            .find(|s| *s > self.page_size)
            .unwrap_or(Self::PAGE_SIZES[0]);
        self.set_page_size(next);
    }

    pub fn next(&mut self) {
        self.page += 1;
    }

    pub fn prev(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }

    pub fn reset(&mut self) {
        self.page = 1;
    }

    pub fn clamp(&mut self, total: usize) {
        self.page = self.page.clamp(1, self.total_pages(total));
    }

    pub fn paginate<'a, T>(&mut self, items: &'a [T]) -> Page<'a, T> {
        let total = items.len();
        self.clamp(total);
        let start = ((self.page - 1) * self.page_size).min(total);
        let end = (start + self.page_size).min(total);
        Page {
            items: &items[start..end],
            page: self.page,
            total_pages: self.total_pages(total),
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(created_at: Option<&str>, username: &str, status_code: Option<i64>) -> LogEntry {
        LogEntry {
            created_at: created_at.map(String::from),
            username: Some(username.into()),
            action: Some("generate".into()),
            status: Some("success".into()),
            status_code,
            ..Default::default()
        }
    }

    #[test]
    fn parses_backend_timestamps() {
        let naive = parse_timestamp("2024-03-01T10:20:30.123456").unwrap();
        assert_eq!(naive.to_string(), "2024-03-01 10:20:30.123456");
        let offset = parse_timestamp("2024-03-01T12:20:30+02:00").unwrap();
        assert_eq!(offset.to_string(), "2024-03-01 10:20:30");
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn query_matches_case_insensitively() {
        let e = entry(None, "Alice", Some(429));
        let filter = LogFilter::parse("", "", "  ALICE ").unwrap();
        assert!(filter.matches(&e));
        assert!(LogFilter::parse("", "", "429").unwrap().matches(&e));
        assert!(!LogFilter::parse("", "", "bob").unwrap().matches(&e));
    }

    #[test]
    fn empty_query_matches_everything() {
        let filter = LogFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&LogEntry::default()));
    }

    #[test]
    fn date_range_is_inclusive() {
        let filter = LogFilter::parse("2024-03-01T00:00", "2024-03-02", "").unwrap();
        assert!(filter.matches(&entry(Some("2024-03-01T00:00:00"), "a", None)));
        assert!(filter.matches(&entry(Some("2024-03-02T23:59:59"), "a", None)));
        assert!(!filter.matches(&entry(Some("2024-03-03T00:00:00"), "a", None)));
        assert!(!filter.matches(&entry(Some("2024-02-28T12:00:00"), "a", None)));
    }

    #[test]
    fn unparseable_timestamps_pass_the_date_range() {
        let filter = LogFilter::parse("2024-03-01", "2024-03-02", "").unwrap();
        assert!(filter.matches(&entry(None, "a", None)));
        assert!(filter.matches(&entry(Some("not a date"), "a", None)));
    }

    #[test]
    fn invalid_bounds_are_reported() {
        assert!(LogFilter::parse("tomorrow", "", "").is_err());
        assert!(LogFilter::parse("", "31/12/2024", "").is_err());
    }

    #[test]
    fn filter_logs_keeps_order() {
        let logs = vec![
            entry(None, "alice", Some(200)),
            entry(None, "bob", Some(200)),
            entry(None, "alicia", Some(500)),
        ];
        let filter = LogFilter::parse("", "", "ali").unwrap();
        let names: Vec<_> = filter_logs(&logs, &filter)
            .into_iter()
            .map(|e| e.username.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["alice", "alicia"]);
    }

    #[test]
    fn pagination_clamps_past_the_end() {
        let items: Vec<u32> = (0..120).collect();
        let mut pager = LogPager::default();
        for _ in 0..4 {
            pager.next();
        }
        assert_eq!(pager.page(), 5);
        let page = pager.paginate(&items);
        assert_eq!(page.page, 3);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 20);
        assert_eq!(page.items[0], 100);
        assert_eq!(page.info(), "3/3");
        assert!(!page.has_next());
    }

    #[test]
    fn empty_list_has_one_page() {
        let items: Vec<u32> = Vec::new();
        let mut pager = LogPager::default();
        let page = pager.paginate(&items);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.page, 1);
        assert!(page.items.is_empty());
    }

    #[test]
    fn page_size_changes_reset_to_first_page() {
        let mut pager = LogPager::default();
        pager.next();
        pager.set_page_size(0);
        assert_eq!(pager.page_size(), 50);
        assert_eq!(pager.page(), 1);
        pager.cycle_page_size();
        assert_eq!(pager.page_size(), 100);
        pager.set_page_size(200);
        pager.cycle_page_size();
        assert_eq!(pager.page_size(), 20);
    }

    #[test]
    fn prev_floors_at_one() {
        let mut pager = LogPager::default();
        pager.prev();
        assert_eq!(pager.page(), 1);
    }
}
