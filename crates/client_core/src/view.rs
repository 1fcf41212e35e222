//! Filter, sort and paginate the launch collection for display.
//!
//! Everything here is a pure function of its inputs and is cheap enough to recompute on every
//! change of the view state.

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use shared::protocol::Launch;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

pub const DEFAULT_PAGE_SIZE: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Name,
    #[default]
    Date,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(SortField::Name),
            "date" | "date_utc" => Ok(SortField::Date),
            other => Err(format!("unknown sort field '{other}' (expected name or date)")),
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(format!(
                "unknown sort direction '{other}' (expected asc or desc)"
            )),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortField::Name => f.write_str("name"),
            SortField::Date => f.write_str("date"),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => f.write_str("asc"),
            SortDirection::Descending => f.write_str("desc"),
        }
    }
}

/// View inputs held by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub search: String,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            search: String::new(),
            sort_field: SortField::default(),
            sort_direction: SortDirection::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ViewState {
    /// Clicking the active column flips its direction; a new column starts ascending.
    pub fn toggle_sort(&mut self, field: SortField) {
        if field == self.sort_field {
            self.sort_direction = self.sort_direction.reversed();
        } else {
            self.sort_field = field;
            self.sort_direction = SortDirection::Ascending;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewSlice<'a> {
    pub visible: Vec<&'a Launch>,
    /// Matches before pagination.
    pub total_matches: usize,
}

impl ViewSlice<'_> {
    pub fn page_count(&self, page_size: usize) -> usize {
        page_count(self.total_matches, page_size)
    }
}

pub fn derive_view<'a>(launches: &'a [Launch], view: &ViewState) -> ViewSlice<'a> {
    let mut matches = filter_launches(launches, &view.search);
    sort_launches(&mut matches, view.sort_field, view.sort_direction);
    let total_matches = matches.len();
    let visible = paginate(&matches, view.page, view.page_size).to_vec();
    ViewSlice {
        visible,
        total_matches,
    }
}

/// Case-insensitive substring match on the launch name. An empty needle keeps everything.
pub fn filter_launches<'a>(launches: &'a [Launch], search: &str) -> Vec<&'a Launch> {
    let needle = search.to_lowercase();
    if needle.is_empty() {
        return launches.iter().collect();
    }
    launches
        .iter()
        .filter(|launch| launch.name.to_lowercase().contains(&needle))
        .collect()
}

/// Stable: launches with equal keys keep their input order in either direction.
pub fn sort_launches(launches: &mut [&Launch], field: SortField, direction: SortDirection) {
    launches.sort_by(|a, b| {
        let ordering = match field {
            SortField::Date => a.date_utc.cmp(&b.date_utc),
            SortField::Name => collate(&a.name, &b.name),
        };
        direction.apply(ordering)
    });
}

/// Items `[(page - 1) * page_size, page * page_size)`. Out-of-range pages are empty.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    let Some(start) = page
        .checked_sub(1)
        .and_then(|index| index.checked_mul(page_size))
    else {
        return &[];
    };
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

pub fn page_count(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

/// Approximates a locale collation. Letters compare without accents or case first, then
/// unaccented sorts before accented, then lowercase before uppercase, then raw code points.
pub fn collate(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| {
            a.nfd()
                .flat_map(char::to_lowercase)
                .cmp(b.nfd().flat_map(char::to_lowercase))
        })
        .then_with(|| {
            a.chars()
                .map(char::is_uppercase)
                .cmp(b.chars().map(char::is_uppercase))
        })
        .then_with(|| a.cmp(b))
}

fn base_letters(text: &str) -> impl Iterator<Item = char> + '_ {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
