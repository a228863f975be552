//! Run summaries and heap-state rendering.

use std::fmt;
use std::time::Duration;

/// Blocks rendered per line in a heap dump.
const DUMP_BLOCKS_PER_ROW: usize = 16;

/// Read-only summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Requests admitted to the heap.
    pub admitted: u64,
    /// Average admitted size in bytes (integer division; 0 if none admitted).
    pub avg_size_bytes: u64,
    /// Ledger entries reclaimed by the FIFO eviction policy.
    pub evicted: u64,
    /// Calls to the compaction pass.
    pub compactions: u64,
    /// Integrity faults detected by verification (0 when verification is off).
    pub integrity_faults: u64,
    /// Wall time, supplied by the caller.
    pub elapsed: Duration,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "----- RESULTS -----")?;
        writeln!(f, "Requests admitted:        {}", self.admitted)?;
        writeln!(f, "Average admitted size:    {} bytes", self.avg_size_bytes)?;
        writeln!(f, "Entries evicted (FIFO):   {}", self.evicted)?;
        writeln!(f, "Compaction passes:        {}", self.compactions)?;
        writeln!(f, "Integrity faults:         {}", self.integrity_faults)?;
        write!(f, "Elapsed:                  {} ms", self.elapsed.as_millis())
    }
}

/// Render a block array as fixed-width rows under a title. Pure formatting,
/// never touches heap state.
pub fn format_blocks(title: &str, blocks: &[u32]) -> String {
    let mut out = String::with_capacity(blocks.len() * 6 + title.len() + 16);
    out.push_str("----- ");
    out.push_str(title);
    out.push_str(" -----\n");
    for row in blocks.chunks(DUMP_BLOCKS_PER_ROW) {
        for (i, tag) in row.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&format!("{:>5}", tag));
        }
        out.push('\n');
    }
    out.push_str("--------------------");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_all_counters() {
        let report = RunReport {
            admitted: 3,
            avg_size_bytes: 400,
            evicted: 1,
            compactions: 1,
            integrity_faults: 0,
            elapsed: Duration::from_millis(12),
        };
        let text = report.to_string();
        assert!(text.contains("Requests admitted:        3"));
        assert!(text.contains("400 bytes"));
        assert!(text.contains("Compaction passes:        1"));
        assert!(text.contains("12 ms"));
    }

    #[test]
    fn dump_is_fixed_width_rows() {
        let blocks: Vec<u32> = (0..40).collect();
        let text = format_blocks("AFTER", &blocks);
        assert!(text.starts_with("----- AFTER -----"));
        // 40 blocks at 16 per row = 3 data rows
        let rows: Vec<&str> = text.lines().skip(1).take(3).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].split_whitespace().count(), 16);
        assert_eq!(rows[2].split_whitespace().count(), 8);
    }
}
