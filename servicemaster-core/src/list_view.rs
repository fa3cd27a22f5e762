//! Scroll offset and in-page selection over the filtered unit list

/// Scroll/selection pair.
///
/// `scroll` is the first visible index into the filtered list, `selection` the
/// row within the visible page. After `clamp`, `selection < page` and
/// `scroll + selection < len` (both zero for an empty list).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListView {
    pub scroll: usize,
    pub selection: usize,
}

impl ListView {
    /// Index of the selected record in the filtered list
    pub fn absolute(&self) -> usize {
        self.scroll + self.selection
    }

    pub fn reset(&mut self) {
        self.scroll = 0;
        self.selection = 0;
    }

    /// Range of filtered indices shown on the current page
    pub fn visible_range(&self, len: usize, page: usize) -> std::ops::Range<usize> {
        let start = self.scroll.min(len);
        start..(start + page.max(1)).min(len)
    }

    /// Re-establish the invariants against a fresh count and page height,
    /// keeping the same record selected when it still exists.
    pub fn clamp(&mut self, len: usize, page: usize) {
        let page = page.max(1);
        if len == 0 {
            self.reset();
            return;
        }
        let absolute = self.absolute().min(len - 1);
        // never show trailing empty rows unless the list is shorter than a page
        let mut scroll = self.scroll.min(len.saturating_sub(page));
        if absolute < scroll {
            scroll = absolute;
        }
        if absolute >= scroll + page {
            scroll = absolute + 1 - page;
        }
        self.scroll = scroll;
        self.selection = absolute - scroll;
    }

    pub fn move_up(&mut self) {
        if self.selection > 0 {
            self.selection -= 1;
        } else if self.scroll > 0 {
            self.scroll -= 1;
        }
    }

    pub fn move_down(&mut self, len: usize, page: usize) {
        let page = page.max(1);
        if self.absolute() + 1 >= len {
            return;
        }
        if self.selection + 1 < page {
            self.selection += 1;
        } else {
            self.scroll += 1;
        }
    }

    /// Signed single-step movement
    pub fn move_selection(&mut self, delta: isize, len: usize, page: usize) {
        for _ in 0..delta.unsigned_abs() {
            if delta < 0 {
                self.move_up();
            } else {
                self.move_down(len, page);
            }
        }
    }

    pub fn page_up(&mut self, page: usize) {
        self.scroll = self.scroll.saturating_sub(page.max(1));
        self.selection = 0;
    }

    pub fn page_down(&mut self, len: usize, page: usize) {
        let page = page.max(1);
        if self.scroll + page < len {
            self.scroll = (self.scroll + page).min(len - page);
        }
        self.selection = 0;
    }

    /// Place filtered index `pos` on screen: on its own row when it fits on
    /// the first page, otherwise on the last row of the page.
    pub fn reveal(&mut self, pos: usize, page: usize) {
        let page = page.max(1);
        if pos >= page {
            self.scroll = pos + 1 - page;
            self.selection = page - 1;
        } else {
            self.scroll = 0;
            self.selection = pos;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holds(v: &ListView, len: usize, page: usize) -> bool {
        if len == 0 {
            return v.scroll == 0 && v.selection == 0;
        }
        v.selection < page.min(len) && v.scroll + v.selection < len
    }

    #[test]
    fn test_move_down_scrolls_at_page_end() {
        let mut v = ListView::default();
        for _ in 0..4 {
            v.move_down(10, 3);
        }
        assert_eq!(v, ListView { scroll: 2, selection: 2 });
        for _ in 0..20 {
            v.move_down(10, 3);
        }
        assert_eq!(v.absolute(), 9);
        assert_eq!(v.selection, 2);
    }

    #[test]
    fn test_move_up_stops_at_top() {
        let mut v = ListView { scroll: 1, selection: 1 };
        v.move_selection(-5, 10, 3);
        assert_eq!(v, ListView::default());
    }

    #[test]
    fn test_page_moves_clamp() {
        let mut v = ListView { scroll: 0, selection: 2 };
        v.page_down(10, 4);
        assert_eq!(v, ListView { scroll: 4, selection: 0 });
        v.page_down(10, 4);
        assert_eq!(v, ListView { scroll: 6, selection: 0 });
        v.page_down(10, 4);
        assert_eq!(v.scroll, 6);
        v.page_up(4);
        assert_eq!(v.scroll, 2);
        v.page_up(4);
        assert_eq!(v, ListView::default());

        let mut short = ListView { scroll: 0, selection: 1 };
        short.page_down(3, 10);
        assert_eq!(short, ListView::default());
    }

    #[test]
    fn test_clamp_after_shrink() {
        let mut v = ListView { scroll: 40, selection: 5 };
        v.clamp(50, 20);
        assert_eq!(v, ListView { scroll: 30, selection: 15 });

        v.clamp(10, 20);
        assert_eq!(v, ListView { scroll: 0, selection: 9 });

        v.clamp(0, 20);
        assert_eq!(v, ListView::default());
    }

    #[test]
    fn test_clamp_after_page_shrink_keeps_record() {
        let mut v = ListView { scroll: 0, selection: 15 };
        v.clamp(50, 10);
        assert_eq!(v.absolute(), 15);
        assert_eq!(v.selection, 9);
    }

    #[test]
    fn test_reveal() {
        let mut v = ListView::default();
        v.reveal(3, 10);
        assert_eq!(v, ListView { scroll: 0, selection: 3 });
        v.reveal(25, 10);
        assert_eq!(v, ListView { scroll: 16, selection: 9 });
        assert_eq!(v.absolute(), 25);
    }

    #[test]
    fn test_invariants_under_move_sequences() {
        // deterministic pseudo-random walk over several list/page shapes
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };
        for len in [0usize, 1, 2, 5, 17, 64] {
            for page in [1usize, 3, 8, 20] {
                let mut v = ListView::default();
                for _ in 0..300 {
                    match next() % 4 {
                        0 => v.move_up(),
                        1 => v.move_down(len, page),
                        2 => v.page_up(page),
                        _ => v.page_down(len, page),
                    }
                    v.clamp(len, page);
                    assert!(holds(&v, len, page), "len {len} page {page}: {v:?}");
                }
            }
        }
    }

    #[test]
    fn test_moves_alone_keep_invariants() {
        let (len, page) = (12, 5);
        let mut v = ListView::default();
        for step in 0..40 {
            if step % 3 == 0 {
                v.page_down(len, page);
            } else {
                v.move_down(len, page);
            }
            assert!(holds(&v, len, page), "{v:?}");
        }
    }
}
