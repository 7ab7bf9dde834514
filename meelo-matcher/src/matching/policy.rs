//! Decisions on what resolved album data may overwrite

use chrono::{Datelike, NaiveDate};
use meelo_common::models::AlbumType;

/// Outcome of checking a resolved release date against the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseDateDecision {
    Keep(NaiveDate),
    /// The catalog already has a real date
    AlreadyKnown,
    /// The stored date is a January 1st placeholder but the years are too
    /// far apart: probably another release
    TooFar { stored_year: i32, resolved_year: i32 },
    Unchanged,
}

impl ReleaseDateDecision {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            ReleaseDateDecision::Keep(date) => Some(*date),
            _ => None,
        }
    }
}

/// January 1st is what the catalog stores when it only knows the year
pub fn is_placeholder_date(date: NaiveDate) -> bool {
    date.month() == 1 && date.day() == 1
}

pub fn check_release_date(
    stored: Option<NaiveDate>,
    resolved: NaiveDate,
    tolerance_years: u32,
) -> ReleaseDateDecision {
    let Some(stored) = stored else {
        return ReleaseDateDecision::Keep(resolved);
    };
    if stored == resolved {
        return ReleaseDateDecision::Unchanged;
    }
    if !is_placeholder_date(stored) {
        return ReleaseDateDecision::AlreadyKnown;
    }
    if (resolved.year() - stored.year()).unsigned_abs() > tolerance_years {
        return ReleaseDateDecision::TooFar {
            stored_year: stored.year(),
            resolved_year: resolved.year(),
        };
    }
    ReleaseDateDecision::Keep(resolved)
}

/// Album type to post, if any
///
/// The stored type must be resolvable, the resolved type must differ from
/// it, and `Other` is never posted.
pub fn album_type_update(
    stored: AlbumType,
    resolved: Option<AlbumType>,
    stored_is_resolvable: bool,
) -> Option<AlbumType> {
    if !stored_is_resolvable {
        return None;
    }
    resolved.filter(|t| *t != stored && *t != AlbumType::Other)
}
