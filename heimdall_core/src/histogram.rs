//! Distance frequency table kept as a diagnostics side channel.
//!
//! 121 bins of 10 cm each cover 0 to 1210 cm, which spans the sensor's full
//! range including the far sentinels. Renders in the device's two classic
//! shapes: a two-column table and a horizontal ASCII bar chart.

/// Bin width in centimeters.
pub const BIN_CM: i32 = 10;
/// Number of bins.
pub const BINS: usize = 121;

#[derive(Debug, Clone)]
pub struct DistanceHistogram {
    bins: [u64; BINS],
}

impl Default for DistanceHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl DistanceHistogram {
    pub fn new() -> Self {
        Self { bins: [0; BINS] }
    }

    /// Count one sample. Out-of-range distances are clamped into the edge
    /// bins rather than indexing out of bounds.
    pub fn record(&mut self, distance_cm: i32) {
        let idx = (distance_cm.max(0) / BIN_CM) as usize;
        self.bins[idx.min(BINS - 1)] += 1;
    }

    pub fn clear(&mut self) {
        self.bins = [0; BINS];
    }

    pub fn bin(&self, idx: usize) -> u64 {
        self.bins.get(idx).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.bins.iter().sum()
    }

    /// Two-column listing of every bin: `D (cm), Counts`.
    pub fn render_table(&self) -> String {
        let mut out = String::from("D (cm), Counts\n");
        for (i, count) in self.bins.iter().enumerate() {
            out.push_str(&format!("{}, {count}\n", i as i32 * BIN_CM));
        }
        out
    }

    /// Horizontal bar chart over bins below `max_distance_cm`, scaled so the
    /// fullest bin gets 100 asterisks. A `+` tic marks every fifth bin
    /// (50 cm). With no data in the span there is nothing to scale by, so a
    /// placeholder message is returned instead.
    pub fn render_chart(&self, max_distance_cm: i32) -> String {
        let max_index = ((max_distance_cm.max(0) / BIN_CM) as usize).min(BINS);
        let max_value = self.bins[..max_index].iter().copied().max().unwrap_or(0);
        if max_value == 0 {
            return "No data, yet.".to_string();
        }

        let mut out = String::from("DISTANCE HISTOGRAM\nD (cm)\t|  Counts\n");
        out.push_str("--------------------------\n");
        for (i, &count) in self.bins[..max_index].iter().enumerate() {
            let tic = if i % 5 == 0 { '+' } else { '|' };
            out.push_str(&format!("{}\t{tic}", i as i32 * BIN_CM));
            let stars = (100 * count / max_value) as usize;
            for _ in 0..stars {
                out.push('*');
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{BINS, DistanceHistogram};

    #[test]
    fn clear_then_record_hits_exactly_one_bin() {
        let mut h = DistanceHistogram::new();
        h.record(55);
        h.clear();
        h.record(237);
        for i in 0..BINS {
            let expected = if i == 23 { 1 } else { 0 };
            assert_eq!(h.bin(i), expected, "bin {i}");
        }
    }

    #[test]
    fn out_of_range_clamps_into_edge_bins() {
        let mut h = DistanceHistogram::new();
        h.record(1210);
        h.record(9999);
        h.record(-5);
        assert_eq!(h.bin(BINS - 1), 2);
        assert_eq!(h.bin(0), 1);
    }

    #[test]
    fn table_lists_every_bin() {
        let mut h = DistanceHistogram::new();
        h.record(0);
        h.record(1200);
        let table = h.render_table();
        let mut lines = table.lines();
        assert_eq!(lines.next(), Some("D (cm), Counts"));
        assert_eq!(lines.next(), Some("0, 1"));
        assert_eq!(table.lines().count(), BINS + 1);
        assert!(table.ends_with("1200, 1\n"));
    }

    #[test]
    fn chart_scales_to_fullest_bin() {
        let mut h = DistanceHistogram::new();
        for _ in 0..4 {
            h.record(100); // bin 10
        }
        h.record(200); // bin 20
        let chart = h.render_chart(300);
        let bar100: Vec<&str> = chart
            .lines()
            .filter(|l| l.starts_with("100\t"))
            .collect();
        assert_eq!(bar100.len(), 1);
        assert!(bar100[0].ends_with(&"*".repeat(100)));
        let bar200: Vec<&str> = chart
            .lines()
            .filter(|l| l.starts_with("200\t"))
            .collect();
        // 100 * 1 / 4 = 25 asterisks.
        assert!(bar200[0].ends_with(&"*".repeat(25)));
        assert!(!bar200[0].ends_with(&"*".repeat(26)));
    }

    #[test]
    fn chart_tics_every_fifth_bin() {
        let mut h = DistanceHistogram::new();
        h.record(10);
        let chart = h.render_chart(100);
        assert!(chart.contains("0\t+"));
        assert!(chart.contains("10\t|"));
        assert!(chart.contains("50\t+"));
    }

    #[test]
    fn empty_span_renders_placeholder() {
        let mut h = DistanceHistogram::new();
        assert_eq!(h.render_chart(700), "No data, yet.");
        // Data beyond the span still renders the placeholder.
        h.record(900);
        assert_eq!(h.render_chart(700), "No data, yet.");
    }
}
