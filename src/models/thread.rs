use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::deserialize_nullable_string;

/// One entry of a thread-list page as the server sends it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadEntry {
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub slug: String,
    /// Naive ISO 8601 timestamp in UTC, e.g. `2025-10-14T00:05:15.472548`
    #[serde(default)]
    pub last_query_datetime: Option<String>,
    /// Only meaningful on the first entry of a page
    #[serde(default)]
    pub has_next_page: bool,
    /// Only meaningful on the first entry of a page
    #[serde(default)]
    pub total_threads: Option<u64>,
}

impl ThreadEntry {
    /// Parse `last_query_datetime`, accepting both naive and offset forms.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.last_query_datetime.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    }
}

/// A thread in the user's library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl ThreadRecord {
    /// Build a record from a page entry, or `None` if it has no usable
    /// timestamp.
    pub fn from_entry(entry: &ThreadEntry, base_url: &str) -> Option<Self> {
        let created_at = entry.created_at()?;
        let title = if entry.title.is_empty() {
            "Untitled".to_string()
        } else {
            entry.title.clone()
        };
        Some(Self {
            title,
            url: format!("{}/search/{}", base_url.trim_end_matches('/'), entry.slug),
            created_at,
        })
    }
}

/// Filters for a thread listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadQuery {
    /// Inclusive lower bound on the creation date
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the creation date
    pub to: Option<NaiveDate>,
    /// Server-side search term
    pub search_term: Option<String>,
}

impl ThreadQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, date: NaiveDate) -> Self {
        self.from = Some(date);
        self
    }

    pub fn to(mut self, date: NaiveDate) -> Self {
        self.to = Some(date);
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }

    /// Whether `record` falls inside the date range.
    pub fn matches(&self, record: &ThreadRecord) -> bool {
        let date = record.created_at.date_naive();
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(datetime: Option<&str>) -> ThreadEntry {
        ThreadEntry {
            title: "Rust question".to_string(),
            slug: "rust-question-abc".to_string(),
            last_query_datetime: datetime.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_naive_timestamp() {
        let created = entry(Some("2025-10-14T00:05:15.472548")).created_at().unwrap();
        assert_eq!(created.date_naive(), NaiveDate::from_ymd_opt(2025, 10, 14).unwrap());
    }

    #[test]
    fn test_parse_offset_timestamp() {
        let created = entry(Some("2025-10-14T01:00:00+01:00")).created_at().unwrap();
        assert_eq!(created, Utc.with_ymd_and_hms(2025, 10, 14, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_record_from_entry() {
        let record =
            ThreadRecord::from_entry(&entry(Some("2025-10-14T00:05:15")), "https://www.perplexity.ai/")
                .unwrap();
        assert_eq!(record.url, "https://www.perplexity.ai/search/rust-question-abc");
        assert_eq!(record.title, "Rust question");
    }

    #[test]
    fn test_entry_without_timestamp_is_skipped() {
        assert!(ThreadRecord::from_entry(&entry(None), "https://x").is_none());
        assert!(ThreadRecord::from_entry(&entry(Some("not a date")), "https://x").is_none());
    }

    #[test]
    fn test_untitled_default() {
        let mut e = entry(Some("2025-10-14T00:05:15"));
        e.title = String::new();
        assert_eq!(ThreadRecord::from_entry(&e, "https://x").unwrap().title, "Untitled");
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let record = ThreadRecord::from_entry(&entry(Some("2025-10-14T23:59:59")), "https://x")
            .unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 10, 14).unwrap();

        assert!(ThreadQuery::new().matches(&record));
        assert!(ThreadQuery::new().from(day).to(day).matches(&record));
        assert!(!ThreadQuery::new()
            .from(day.succ_opt().unwrap())
            .matches(&record));
        assert!(!ThreadQuery::new()
            .to(day.pred_opt().unwrap())
            .matches(&record));
    }
}
