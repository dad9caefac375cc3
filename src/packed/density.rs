use std::ops::Range;

use super::ceil_log2;

/// Population counts and density thresholds of the window hierarchy over the sparse array.
///
/// Level 0 has a single window spanning the whole array, every following level halves
/// the window size. The allowed density grows linearly from the configured base density
/// at level 0 to a completely full window at the finest level.
/// Counts are kept for all levels in heap order, so the count of a window always equals
/// the sum of the counts of its two halves.
#[derive(Debug, Clone)]
pub(crate) struct Windows {
    order: u32,
    levels: u32,
    upper_bounds: Vec<usize>,
    populations: Vec<usize>,
}

impl Windows {
    /// Create the windows of an empty array with capacity `2^order`.
    pub fn new(order: u32, density: f64) -> Windows {
        let levels = Windows::levels_for(order);
        Windows {
            order,
            levels,
            upper_bounds: Windows::upper_bounds(order, density),
            populations: vec![0; (1 << levels) - 1],
        }
    }

    /// Upper bounds of all levels, starting with level 0.
    ///
    /// A bound never exceeds the combined bounds of the two halves of its window.
    pub fn upper_bounds(order: u32, density: f64) -> Vec<usize> {
        let levels = Windows::levels_for(order);
        let mut upper_bounds = vec![0; levels as usize];
        let mut below = usize::MAX;
        for level in (0..levels).rev() {
            let window_size = 1usize << (order - level);
            let bound = if level + 1 == levels {
                window_size
            } else {
                let fraction =
                    density + (1.0 - density) * f64::from(level) / f64::from(levels - 1);
                ((window_size as f64) * fraction).floor() as usize
            };
            upper_bounds[level as usize] = bound.min(below.saturating_mul(2));
            below = upper_bounds[level as usize];
        }
        upper_bounds
    }

    pub fn levels_for(order: u32) -> u32 {
        (order + 1 - ceil_log2(order as usize)).max(2)
    }

    pub fn levels(&self) -> u32 {
        self.levels
    }

    pub fn finest_level(&self) -> u32 {
        self.levels - 1
    }

    pub fn window_size(&self, level: u32) -> usize {
        1 << (self.order - level)
    }

    /// Index of the window on `level` that contains the array index.
    pub fn window_of(&self, level: u32, index: usize) -> usize {
        index >> (self.order - level)
    }

    /// Array indices covered by a window.
    pub fn span(&self, level: u32, window: usize) -> Range<usize> {
        let size = self.window_size(level);
        (window * size)..((window + 1) * size)
    }

    fn position(level: u32, window: usize) -> usize {
        (1 << level) - 1 + window
    }

    pub fn population(&self, level: u32, window: usize) -> usize {
        self.populations[Windows::position(level, window)]
    }

    pub fn upper_bound(&self, level: u32) -> usize {
        self.upper_bounds[level as usize]
    }

    /// Number of values in the whole array.
    pub fn len(&self) -> usize {
        self.population(0, 0)
    }

    /// Whether the window on `level` containing `index` has room for one more value.
    pub fn admits(&self, level: u32, index: usize) -> bool {
        self.population(level, self.window_of(level, index)) < self.upper_bound(level)
    }

    /// Whether every window containing `index` has room for one more value.
    pub fn admits_all(&self, index: usize) -> bool {
        (0..self.levels).all(|level| self.admits(level, index))
    }

    /// Selects the level of the window to rebalance for a value inserted at `index`.
    ///
    /// Walks from the finest level upwards and returns the first level whose window and all
    /// enclosing windows admit another value. Returns `None` if even the whole array is at
    /// its upper bound.
    pub fn choose_level(&self, index: usize) -> Option<u32> {
        let admitting = (0..self.levels)
            .take_while(|level| self.admits(*level, index))
            .count() as u32;
        admitting.checked_sub(1)
    }

    /// Account for a new value at the array index.
    pub fn increment(&mut self, index: usize) {
        for level in 0..self.levels {
            let position = Windows::position(level, self.window_of(level, index));
            self.populations[position] += 1;
        }
    }

    /// Recomputes the counts of all windows that overlap the given range of array indices.
    pub fn recount<F>(&mut self, range: Range<usize>, is_filled: F)
    where
        F: Fn(usize) -> bool,
    {
        if range.is_empty() {
            return;
        }
        let finest = self.finest_level();
        let first = self.window_of(finest, range.start);
        let last = self.window_of(finest, range.end - 1);
        for window in first..=last {
            let count = self.span(finest, window).filter(|i| is_filled(*i)).count();
            self.populations[Windows::position(finest, window)] = count;
        }
        for level in (0..finest).rev() {
            let shift = finest - level;
            for window in (first >> shift)..=(last >> shift) {
                self.populations[Windows::position(level, window)] = self
                    .population(level + 1, 2 * window)
                    + self.population(level + 1, 2 * window + 1);
            }
        }
    }

    /// Whether all windows overlapping the range of array indices are within their upper bound.
    pub fn within_bounds(&self, range: Range<usize>) -> bool {
        if range.is_empty() {
            return true;
        }
        (0..self.levels).all(|level| {
            let first = self.window_of(level, range.start);
            let last = self.window_of(level, range.end - 1);
            (first..=last).all(|window| self.population(level, window) <= self.upper_bound(level))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_of_levels() {
        assert_eq!(2, Windows::levels_for(1));
        assert_eq!(2, Windows::levels_for(2));
        assert_eq!(2, Windows::levels_for(3));
        assert_eq!(3, Windows::levels_for(4));
        assert_eq!(3, Windows::levels_for(5));
        assert_eq!(6, Windows::levels_for(8));
        assert_eq!(16, Windows::levels_for(20));
    }

    #[test]
    fn upper_bounds_grow_towards_the_finest_level() {
        let w = Windows::new(4, 0.5);
        assert_eq!(3, w.levels());
        assert_eq!(16, w.window_size(0));
        assert_eq!(4, w.window_size(2));
        // 16 * 0.5, 8 * 0.75 and a full finest window
        assert_eq!(8, w.upper_bound(0));
        assert_eq!(6, w.upper_bound(1));
        assert_eq!(4, w.upper_bound(2));

        let w = Windows::new(8, 0.5);
        let bounds: Vec<_> = (0..w.levels()).map(|l| w.upper_bound(l)).collect();
        assert_eq!(vec![128, 76, 44, 25, 14, 8], bounds);
    }

    #[test]
    fn upper_bounds_are_capped_by_the_halves() {
        // 16 * 0.95 rounds down to 15, but the two halves only take 7 each
        assert_eq!(vec![14, 7, 4], Windows::upper_bounds(4, 0.95));
        assert_eq!(vec![30, 15, 8], Windows::upper_bounds(5, 0.95));

        for order in 1..=20 {
            for density in [0.05, 0.3, 0.5, 0.75, 0.9, 0.95, 0.99] {
                let bounds = Windows::upper_bounds(order, density);
                for pair in bounds.windows(2) {
                    assert!(pair[0] <= 2 * pair[1], "order {} density {}", order, density);
                }
            }
        }
    }

    #[test]
    fn counts_and_admission() {
        let mut w = Windows::new(4, 0.5);
        assert_eq!(0..4, w.span(2, 0));
        assert_eq!(8..16, w.span(1, 1));
        assert_eq!(3, w.window_of(2, 13));

        w.increment(13);
        w.increment(14);
        w.increment(15);
        assert_eq!(3, w.len());
        assert_eq!(3, w.population(1, 1));
        assert_eq!(3, w.population(2, 3));
        assert_eq!(true, w.admits_all(12));
        assert_eq!(Some(2), w.choose_level(12));

        w.increment(12);
        // The finest window is full now
        assert_eq!(false, w.admits(2, 12));
        assert_eq!(Some(1), w.choose_level(12));
        assert_eq!(Some(2), w.choose_level(0));
        assert_eq!(true, w.within_bounds(0..16));
    }

    #[test]
    fn recount_range() {
        let mut w = Windows::new(5, 0.5);
        let filled = [1, 2, 9, 17, 30];
        w.recount(0..32, |i| filled.contains(&i));
        assert_eq!(5, w.len());
        assert_eq!(3, w.population(1, 0));
        assert_eq!(2, w.population(1, 1));
        assert_eq!(2, w.population(2, 0));

        // Only the windows overlapping the range are touched
        let filled = [1, 2, 3, 4, 9, 17, 30];
        w.recount(0..8, |i| filled.contains(&i));
        assert_eq!(7, w.len());
        assert_eq!(4, w.population(2, 0));
        assert_eq!(1, w.population(2, 1));
    }

    #[test]
    fn no_level_admits_a_full_array() {
        let mut w = Windows::new(4, 0.5);
        for i in [0, 2, 4, 6, 8, 10, 12, 14] {
            w.increment(i);
        }
        assert_eq!(false, w.admits(0, 0));
        assert_eq!(None, w.choose_level(3));
        assert_eq!(true, w.within_bounds(0..16));
        w.increment(1);
        assert_eq!(false, w.within_bounds(0..4));
    }
}
