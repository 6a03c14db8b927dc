//! Human-facing reference numbers.
//!
//! Cases, invoices, receipts, and expenses each get a yearly series like
//! `C-2025-00042`. The aggregates treat these as opaque strings; the series
//! lives here so allocation happens once, at the gateway, before the command
//! is dispatched. After a restart the counters are re-seeded by
//! [`NumberSeries::observe`]-ing every number already in the read models.

use std::collections::HashMap;
use std::sync::RwLock;

/// Allocator for one prefix's yearly sequence.
#[derive(Debug)]
pub struct NumberSeries {
    prefix: &'static str,
    width: usize,
    counters: RwLock<HashMap<i32, u64>>,
}

impl NumberSeries {
    pub fn new(prefix: &'static str, width: usize) -> Self {
        Self {
            prefix,
            width,
            counters: RwLock::new(HashMap::new()),
        }
    }

    pub fn cases() -> Self {
        Self::new("C", 5)
    }

    pub fn invoices() -> Self {
        Self::new("INV", 5)
    }

    pub fn receipts() -> Self {
        Self::new("RCT", 6)
    }

    pub fn expenses() -> Self {
        Self::new("EXP", 5)
    }

    /// Allocate the next number in `year`'s sequence.
    pub fn next(&self, year: i32) -> String {
        let mut counters = match self.counters.write() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        };
        let counter = counters.entry(year).or_insert(0);
        *counter += 1;
        format!("{}-{year}-{:0width$}", self.prefix, counter, width = self.width)
    }

    /// Advance the sequence past an already-issued number.
    ///
    /// Numbers with a foreign prefix or shape are ignored, so a startup
    /// scan can feed every number it sees to every series.
    pub fn observe(&self, number: &str) {
        let Some((year, sequence)) = self.parse(number) else {
            return;
        };
        let mut counters = match self.counters.write() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        };
        let counter = counters.entry(year).or_insert(0);
        if sequence > *counter {
            *counter = sequence;
        }
    }

    fn parse(&self, number: &str) -> Option<(i32, u64)> {
        let rest = number.strip_prefix(self.prefix)?.strip_prefix('-')?;
        let (year, sequence) = rest.split_once('-')?;
        Some((year.parse().ok()?, sequence.parse().ok()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_are_per_year_and_zero_padded() {
        let series = NumberSeries::cases();
        assert_eq!(series.next(2025), "C-2025-00001");
        assert_eq!(series.next(2025), "C-2025-00002");
        assert_eq!(series.next(2026), "C-2026-00001");
        assert_eq!(series.next(2025), "C-2025-00003");
    }

    #[test]
    fn each_series_uses_its_documented_prefix_and_width() {
        assert_eq!(NumberSeries::cases().next(2025), "C-2025-00001");
        assert_eq!(NumberSeries::invoices().next(2025), "INV-2025-00001");
        assert_eq!(NumberSeries::receipts().next(2025), "RCT-2025-000001");
        assert_eq!(NumberSeries::expenses().next(2025), "EXP-2025-00001");
    }

    #[test]
    fn observe_seeds_past_existing_numbers() {
        let series = NumberSeries::invoices();
        series.observe("INV-2025-00041");
        series.observe("INV-2025-00007");
        assert_eq!(series.next(2025), "INV-2025-00042");
    }

    #[test]
    fn observe_ignores_foreign_numbers() {
        let series = NumberSeries::receipts();
        series.observe("C-2025-00100");
        series.observe("not-a-number");
        series.observe("RCT-20x5-000100");
        assert_eq!(series.next(2025), "RCT-2025-000001");
    }

    #[test]
    fn wide_sequences_outgrow_the_padding() {
        let series = NumberSeries::expenses();
        series.observe("EXP-2025-99999");
        assert_eq!(series.next(2025), "EXP-2025-100000");
    }
}
