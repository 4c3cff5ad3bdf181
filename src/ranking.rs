//! TF-IDF scoring and boost composition.
//!
//! The stored posting weight already folds the title boost in, so the score
//! of one term in one document is `weight · ln(|D|/df)`. On top of the
//! summed term scores each document gets a composite boost: a penalty for
//! appearing deep into the paper and a reward for being published late in
//! the corpus year.

use chrono::NaiveDate;

use crate::config::ScoringConfig;

/// 2000 is a leap year; the date boost normalizes by its length.
const DAYS_PER_YEAR: f64 = 366.0;

/// Inverse document frequency: `ln(|D| / df)`.
pub fn idf(collection_size: i64, df: i64) -> f64 {
    (collection_size as f64 / df as f64).ln()
}

/// Per-term score upper bound used for dynamic pruning: no posting of the
/// term can contribute more than its maximum weight times idf, and no
/// document boost exceeds `config.max_boost()`.
pub fn term_upper_bound(config: &ScoringConfig, max_weight: i64, idf: f64) -> f64 {
    max_weight as f64 * idf * config.max_boost()
}

/// Page boost: 1 for the front page, shrinking linearly with page depth.
/// Stays within [0, 1] for `page <= max_page` and `page_weight <= 1`.
pub fn page_boost(config: &ScoringConfig, page: i64, max_page: i64) -> f64 {
    let max_page = max_page.max(1) as f64;
    1.0 - config.page_weight * (page as f64 / max_page)
}

/// Date boost: fraction of the corpus year elapsed at publication, plus the
/// configured offset, scaled by the date weight.
pub fn date_boost(config: &ScoringConfig, date: i64) -> f64 {
    (days_since_epoch(date) as f64 / DAYS_PER_YEAR + config.date_offset) * config.date_weight
}

/// Composite boost of one document.
pub fn document_boost(config: &ScoringConfig, page: i64, date: i64, max_page: i64) -> f64 {
    page_boost(config, page, max_page) * date_boost(config, date)
}

/// Days from 2000-01-01 to a YYYYMMDD date, clamped at zero. Unparseable
/// dates count as the epoch itself.
fn days_since_epoch(date: i64) -> i64 {
    let year = (date / 10_000) as i32;
    let month = ((date / 100) % 100) as u32;
    let day = (date % 100) as u32;
    let epoch = NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid epoch date");
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(d) => d.signed_duration_since(epoch).num_days().max(0),
        None => 0,
    }
}
