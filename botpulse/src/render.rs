//! Plain-text rendering of the analytics store for terminal output.

use botpulse_core::{AnalyticsSnapshot, DisplayState, StoreView};
use std::fmt::Write;

pub const LOADING_TEXT: &str = "Loading analytics data...";
pub const NO_DATA_TEXT: &str = "No analytics data available";

/// Render whatever the store currently holds.
pub fn render_view(view: &StoreView) -> String {
    match view.display_state() {
        DisplayState::Loading => format!("{}\n", LOADING_TEXT),
        DisplayState::NoData { error } => {
            let mut out = String::new();
            if let Some(error) = error {
                let _ = writeln!(out, "! {}", error);
            }
            let _ = writeln!(out, "{}", NO_DATA_TEXT);
            out
        }
        DisplayState::Ready { snapshot, error } => {
            let mut out = String::new();
            if let Some(error) = error {
                let _ = writeln!(out, "! {}", error);
            }
            out.push_str(&render_snapshot(snapshot));
            out
        }
    }
}

/// Totals, sentiment shares and the daily series, oldest day first.
pub fn render_snapshot(snapshot: &AnalyticsSnapshot) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Total users:     {}", snapshot.total_users);
    let _ = writeln!(out, "Total messages:  {}", snapshot.total_messages);

    if !snapshot.sentiment_distribution.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Sentiment");
        for ((label, share), bucket) in snapshot
            .sentiment_shares()
            .into_iter()
            .zip(&snapshot.sentiment_distribution)
        {
            let _ = writeln!(out, "  {:<12} {:>6} ({:.1}%)", label, bucket.count, share);
        }
    }

    if !snapshot.daily_messages.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Daily messages");
        for day in &snapshot.daily_messages {
            let _ = writeln!(out, "  {:<12} {:>6}", day.date, day.count);
        }
    }

    out
}
