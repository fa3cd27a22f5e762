//! Unit name search
//!
//! Matching is a case-insensitive substring test against the unit name, run
//! over the whole list in display order regardless of the active filter.

use crate::directory::UnitDirectory;

/// Longest query the search box accepts
pub const MAX_QUERY_LEN: usize = 64;

/// Text typed into the search modal
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchInput {
    query: String,
}

impl SearchInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Append a printable character; ignored once the query is full
    pub fn push(&mut self, ch: char) -> bool {
        if ch.is_control() || self.query.chars().count() >= MAX_QUERY_LEN {
            return false;
        }
        self.query.push(ch);
        true
    }

    pub fn backspace(&mut self) -> bool {
        self.query.pop().is_some()
    }

    /// Trailing part of the query that fits in `width` cells
    pub fn visible_tail(&self, width: usize) -> &str {
        let count = self.query.chars().count();
        if count <= width {
            return &self.query;
        }
        let skip = count - width;
        match self.query.char_indices().nth(skip) {
            Some((at, _)) => &self.query[at..],
            None => "",
        }
    }
}

/// Case-insensitive substring match on the unit name
pub fn name_matches(name: &str, query: &str) -> bool {
    if query.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&query.to_lowercase())
}

/// Position in `order` of the first unit whose name contains `query`.
///
/// `order` holds directory indices in display order; the returned value is the
/// position within `order` together with the matched directory index.
pub fn find_first(dir: &dyn UnitDirectory, order: &[usize], query: &str) -> Option<(usize, usize)> {
    order.iter().enumerate().find_map(|(pos, &idx)| {
        let unit = dir.nth(idx)?;
        name_matches(&unit.name, query).then_some((pos, idx))
    })
}
