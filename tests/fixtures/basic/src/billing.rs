//! Invoice totals.

/// One invoice line.
pub struct Line {
    pub cents: u64,
}

impl Line {
    pub fn new(cents: u64) -> Self {
        Self { cents }
    }
}

/// Sum all lines.
pub fn total(lines: &[Line]) -> u64 {
    lines.iter().map(|l| l.cents).sum()
}
