//! Core domain types for botpulse
//!
//! The analytics API speaks a Mongo-flavoured JSON shape (`_id` keys, snake
//! case totals). [`AnalyticsPayload`] mirrors that wire format and
//! [`AnalyticsSnapshot`] is the normalized form the rest of the crate uses.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer};

// ============================================
// Wire format
// ============================================

/// Body of `GET {base_url}/analytics` on success.
///
/// A missing or `null` field reads as 0 or empty.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AnalyticsPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_users: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_messages: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sentiment_distribution: Vec<SentimentBucket>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub daily_messages: Vec<DailyBucket>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One `{_id, count}` entry of the sentiment aggregation
#[derive(Debug, Clone, Deserialize)]
pub struct SentimentBucket {
    #[serde(rename = "_id")]
    pub label: Option<String>,
    pub count: u64,
}

/// One `{_id, count}` entry of the daily message aggregation
#[derive(Debug, Clone, Deserialize)]
pub struct DailyBucket {
    #[serde(rename = "_id")]
    pub date: String,
    pub count: u64,
}

/// Body the server sends alongside a failure status
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
}

// ============================================
// Snapshot
// ============================================

/// Label used when the server reports a sentiment bucket without one.
pub const UNKNOWN_SENTIMENT: &str = "unknown";

/// Message count for one sentiment label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentimentCount {
    pub label: String,
    pub count: u64,
}

/// Message count for one calendar day.
///
/// `date` keeps the server's string so that an unparseable value is still
/// shown rather than silently dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCount {
    pub date: String,
    pub count: u64,
}

impl DailyCount {
    /// The calendar date, if the server string could be parsed.
    ///
    /// Accepts `YYYY-MM-DD` and RFC 3339 timestamps (date part only).
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_day(&self.date)
    }
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Last successfully retrieved and normalized analytics payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnalyticsSnapshot {
    pub total_users: u64,
    pub total_messages: u64,
    /// Distinct labels, order as received
    pub sentiment_distribution: Vec<SentimentCount>,
    /// Always ascending by date
    pub daily_messages: Vec<DailyCount>,
}

impl AnalyticsSnapshot {
    /// Normalize a wire payload.
    ///
    /// The only reordering is of `daily_messages`, see
    /// [`sort_daily_messages`](Self::sort_daily_messages).
    pub fn from_payload(payload: AnalyticsPayload) -> Self {
        let mut snapshot = Self {
            total_users: payload.total_users,
            total_messages: payload.total_messages,
            sentiment_distribution: payload
                .sentiment_distribution
                .into_iter()
                .map(|b| SentimentCount {
                    label: b.label.unwrap_or_else(|| UNKNOWN_SENTIMENT.to_string()),
                    count: b.count,
                })
                .collect(),
            daily_messages: payload
                .daily_messages
                .into_iter()
                .map(|b| DailyCount {
                    date: b.date,
                    count: b.count,
                })
                .collect(),
        };
        snapshot.sort_daily_messages();
        snapshot
    }

    /// Sort `daily_messages` ascending by date.
    ///
    /// Unparseable dates sort as the minimum date, i.e. before every valid
    /// one. The sort is stable, so ties (including several unparseable
    /// entries) keep the order the server sent them in.
    pub fn sort_daily_messages(&mut self) {
        self.daily_messages.sort_by_key(DailyCount::parsed_date);
    }

    /// Sum of all sentiment bucket counts
    pub fn sentiment_total(&self) -> u64 {
        self.sentiment_distribution.iter().map(|s| s.count).sum()
    }

    /// Percentage of the sentiment total held by each label
    pub fn sentiment_shares(&self) -> Vec<(&str, f64)> {
        let total = self.sentiment_total();
        self.sentiment_distribution
            .iter()
            .map(|s| {
                let share = if total == 0 {
                    0.0
                } else {
                    s.count as f64 * 100.0 / total as f64
                };
                (s.label.as_str(), share)
            })
            .collect()
    }
}

// ============================================
// Status
// ============================================

/// Where the most recent fetch activity stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchStatus {
    /// Nothing has been attempted yet
    #[default]
    Idle,
    /// An attempt is in flight
    Loading,
    /// The last attempt committed a snapshot
    Success,
    /// The last attempt failed; `message` is the user-visible status line
    Failed { attempt: u32, message: String },
}

impl FetchStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, FetchStatus::Failed { .. })
    }

    /// The status line to show, if any
    pub fn error_message(&self) -> Option<&str> {
        match self {
            FetchStatus::Failed { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// What a display layer should render for a given store state.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayState<'a> {
    /// First fetch still running, nothing to show yet
    Loading,
    /// No snapshot has ever been committed
    NoData { error: Option<&'a str> },
    /// A snapshot is available; `error` is set while it is stale
    Ready {
        snapshot: &'a AnalyticsSnapshot,
        error: Option<&'a str>,
    },
}
