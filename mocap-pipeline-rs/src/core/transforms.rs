//! Numeric conversions and per-frame signal operations.
//!
//! Missing samples are `None` throughout; any arithmetic touching a missing
//! sample yields `None` rather than NaN.

/// Parse an exported number, tolerating mis-rendered thousands groupings.
///
/// Spaces are removed. When the value splits into more than two
/// `.`-separated segments, every dot except the last is treated as a
/// thousands separator: `"127.228.226"` becomes `127228.226`. Anything that
/// still fails to parse (or parses to NaN) is a missing value; this never
/// errors.
///
/// The rule cannot tell a thousands-grouped number from a value with
/// several genuine decimal points, so `"1.2.3"` reads as `12.3`.
pub fn parse_val(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| *c != ' ').collect();
    let compact = compact.trim();

    let parts: Vec<&str> = compact.split('.').collect();
    let normalized = if parts.len() > 2 {
        let (last, head) = parts.split_last()?;
        format!("{}.{}", head.concat(), last)
    } else {
        compact.to_string()
    };

    normalized.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Euclidean distance between consecutive frame vectors.
///
/// `frames[i]` holds every marker coordinate of frame `i` concatenated into
/// one vector. Frame 0 has distance `0.0`. A frame pair with any missing
/// coordinate has a missing distance.
pub fn frame_distances(frames: &[Vec<Option<f64>>]) -> Vec<Option<f64>> {
    let mut distances = Vec::with_capacity(frames.len());
    if frames.is_empty() {
        return distances;
    }

    distances.push(Some(0.0));
    for pair in frames.windows(2) {
        distances.push(euclidean(&pair[1], &pair[0]));
    }
    distances
}

fn euclidean(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let mut sum = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let d = (*x)? - (*y)?;
        sum += d * d;
    }
    Some(sum.sqrt())
}

/// Trailing rolling mean over `window` samples.
///
/// The first `window - 1` entries are missing, as is any window that
/// contains a missing sample. A zero window yields all-missing output.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|end| {
            if end + 1 < window {
                return None;
            }
            let start = end + 1 - window;
            let mut sum = 0.0;
            for value in &values[start..=end] {
                sum += (*value)?;
            }
            Some(sum / window as f64)
        })
        .collect()
}

/// Index of the last value strictly greater than `threshold`.
pub fn last_index_above(values: &[Option<f64>], threshold: f64) -> Option<usize> {
    values
        .iter()
        .rposition(|value| value.map_or(false, |v| v > threshold))
}
