//! Type filter and per-column sort over the unit list

use std::cmp::Ordering;

use crate::directory::{UnitDirectory, units};
use crate::unit::{UnitFilter, UnitRecord};

/// Unit file states, most meaningful first
const STATE_PRIORITY: &[&str] = &[
    "enabled",
    "enabled-runtime",
    "loaded",
    "generated",
    "transient",
    "static",
    "not-found",
    "disabled",
    "masked",
];

const ACTIVE_PRIORITY: &[&str] = &[
    "active",
    "reloading",
    "activating",
    "refreshing",
    "deactivating",
    "inactive",
    "failed",
    "maintenance",
];

const SUB_PRIORITY: &[&str] = &[
    "running",
    "listening",
    "waiting",
    "active",
    "mounted",
    "plugged",
    "start",
    "reload",
    "exited",
    "elapsed",
    "stop",
    "dead",
    "failed",
];

/// The five list columns, in header order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortColumn {
    Name,
    State,
    Active,
    Sub,
    Description,
}

impl SortColumn {
    pub fn next(&self) -> Self {
        match self {
            SortColumn::Name => SortColumn::State,
            SortColumn::State => SortColumn::Active,
            SortColumn::Active => SortColumn::Sub,
            SortColumn::Sub => SortColumn::Description,
            SortColumn::Description => SortColumn::Name,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            SortColumn::Name => SortColumn::Description,
            SortColumn::State => SortColumn::Name,
            SortColumn::Active => SortColumn::State,
            SortColumn::Sub => SortColumn::Active,
            SortColumn::Description => SortColumn::Sub,
        }
    }

    /// Header label
    pub fn label(&self) -> &'static str {
        match self {
            SortColumn::Name => "UNIT:",
            SortColumn::State => "STATE:",
            SortColumn::Active => "ACTIVE:",
            SortColumn::Sub => "SUB:",
            SortColumn::Description => "DESCRIPTION:",
        }
    }

    fn priority_table(&self) -> Option<&'static [&'static str]> {
        match self {
            SortColumn::State => Some(STATE_PRIORITY),
            SortColumn::Active => Some(ACTIVE_PRIORITY),
            SortColumn::Sub => Some(SUB_PRIORITY),
            SortColumn::Name | SortColumn::Description => None,
        }
    }

    fn key<'a>(&self, unit: &'a UnitRecord) -> &'a str {
        match self {
            SortColumn::Name => &unit.name,
            SortColumn::State => unit.display_state(),
            SortColumn::Active => &unit.active,
            SortColumn::Sub => &unit.sub,
            SortColumn::Description => &unit.description,
        }
    }

    /// Ascending comparison: lexical for text columns, table position for
    /// state columns (values missing from the table sort last)
    pub fn compare(&self, a: &UnitRecord, b: &UnitRecord) -> Ordering {
        let (ka, kb) = (self.key(a), self.key(b));
        match self.priority_table() {
            None => ka.cmp(kb),
            Some(table) => {
                let rank = |v: &str| table.iter().position(|t| *t == v).unwrap_or(table.len());
                rank(ka).cmp(&rank(kb))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }

    /// Marker appended to the sorted column header
    pub fn arrow(&self) -> char {
        match self {
            Direction::Ascending => '▲',
            Direction::Descending => '▼',
        }
    }
}

/// Active sort: nothing, or one column with its direction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    None,
    Column(SortColumn, Direction),
}

impl SortOrder {
    /// Sort by `column`: flips the direction when already sorted by it,
    /// otherwise starts ascending
    pub fn toggled(self, column: SortColumn) -> Self {
        match self {
            SortOrder::Column(current, dir) if current == column => {
                SortOrder::Column(column, dir.flipped())
            }
            _ => SortOrder::Column(column, Direction::Ascending),
        }
    }

    pub fn direction_of(&self, column: SortColumn) -> Option<Direction> {
        match self {
            SortOrder::Column(c, dir) if *c == column => Some(*dir),
            _ => None,
        }
    }
}

/// Sorted, stable ordering of a record slice (indices into `records`)
pub fn sorted_indices<'a, I>(records: I, order: SortOrder) -> Vec<usize>
where
    I: IntoIterator<Item = &'a UnitRecord>,
{
    let records: Vec<&UnitRecord> = records.into_iter().collect();
    let mut idx: Vec<usize> = (0..records.len()).collect();
    if let SortOrder::Column(column, dir) = order {
        idx.sort_by(|&a, &b| {
            let ord = column.compare(records[a], records[b]);
            match dir {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        });
    }
    idx
}

/// One redraw's view of the directory: the full list in display order and
/// the subset matching the active filter. Rebuilt for every dispatch, never
/// kept across mutations.
#[derive(Clone, Debug, Default)]
pub struct Projection {
    /// Directory indices of every unit, in display order
    pub order: Vec<usize>,
    /// Directory indices of the units matching the filter, in display order
    pub filtered: Vec<usize>,
}

impl Projection {
    pub fn build(dir: &dyn UnitDirectory, filter: UnitFilter, sort: SortOrder) -> Self {
        let order = sorted_indices(units(dir), sort);
        let filtered = order
            .iter()
            .copied()
            .filter(|&i| dir.nth(i).is_some_and(|u| filter.matches(u.category)))
            .collect();
        Self { order, filtered }
    }

    pub fn len(&self) -> usize {
        self.filtered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }

    /// Directory index of the `n`th filtered unit
    pub fn directory_index(&self, n: usize) -> Option<usize> {
        self.filtered.get(n).copied()
    }
}
