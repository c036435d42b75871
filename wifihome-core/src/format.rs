//! Human-readable byte counts for display fields.

const SUFFIXES: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
const STEP: f64 = 1024.0;

/// Format a byte count as a value with one decimal and a binary unit suffix ("1.5 MB").
///
/// The unit advances while the next unit's value rounds (half to even) to at least 1,
/// so 512 B stays in bytes and 513 B becomes "0.5 KB". TB is the largest unit.
pub fn format_bytes(bytes: u64) -> String {
    let mut unit = 0usize;
    let mut value = bytes as f64;
    while (value / STEP).round_ties_even() >= 1.0 && unit < SUFFIXES.len() - 1 {
        value /= STEP;
        unit += 1;
    }
    format!("{} {}", one_decimal(bytes, unit), SUFFIXES[unit])
}

/// `bytes / 1024^unit` with one fractional digit, midpoint away from zero, thousands
/// grouped with ','. Exact integer arithmetic: `u64 as f64` loses precision above 2^53.
fn one_decimal(bytes: u64, unit: usize) -> String {
    let divisor = 1024u128.pow(unit as u32);
    let tenths = (u128::from(bytes) * 10 + divisor / 2) / divisor;
    format!("{}.{}", group_thousands(tenths / 10), tenths % 10)
}

fn group_thousands(n: u128) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
