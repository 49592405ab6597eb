//! Aspect ratio matching against the closed set the backends accept.

/// Aspect ratios supported by the image backends, in tie-break order.
pub const SUPPORTED_RATIOS: [&str; 10] = [
    "1:1", "2:3", "3:2", "3:4", "4:3", "4:5", "5:4", "9:16", "16:9", "21:9",
];

fn parse_ratio(ratio: &str) -> Option<(u32, u32)> {
    let (w, h) = ratio.split_once(':')?;
    match (w.parse().ok()?, h.parse().ok()?) {
        (0, _) | (_, 0) => None,
        parsed => Some(parsed),
    }
}

fn ratio_value(ratio: &str) -> Option<f64> {
    let (w, h) = parse_ratio(ratio)?;
    Some(f64::from(w) / f64::from(h))
}

/// Finds the supported ratio numerically closest to `width`/`height`.
///
/// Ties resolve to the earlier entry in [`SUPPORTED_RATIOS`]. Degenerate
/// dimensions fall back to `"1:1"`.
pub fn find_closest_ratio(width: i64, height: i64) -> &'static str {
    if width <= 0 || height <= 0 {
        return "1:1";
    }

    let current = width as f64 / height as f64;

    let mut closest = SUPPORTED_RATIOS[0];
    let mut min_diff = f64::INFINITY;

    for ratio in SUPPORTED_RATIOS {
        // Entries in the fixed table always parse
        let Some(value) = ratio_value(ratio) else {
            continue;
        };
        let diff = (current - value).abs();
        if diff < min_diff {
            min_diff = diff;
            closest = ratio;
        }
    }

    closest
}

/// Stretches a resolution to exactly satisfy `target_ratio`.
///
/// The longer edge stays fixed: landscape/square keeps width, portrait
/// keeps height. The other edge is recomputed and rounded to nearest. An
/// unparsable ratio leaves the resolution unchanged.
pub fn adjust_resolution_to_ratio(width: u32, height: u32, target_ratio: &str) -> (u32, u32) {
    let Some(target) = ratio_value(target_ratio) else {
        return (width, height);
    };

    if width >= height {
        let new_height = (f64::from(width) / target).round() as u32;
        (width, new_height)
    } else {
        let new_width = (f64::from(height) * target).round() as u32;
        (new_width, height)
    }
}

/// GCD-reduced `"w:h"` string for diagnostics. Not used for dispatch.
pub fn get_current_ratio_string(width: u32, height: u32) -> String {
    if width == 0 || height == 0 {
        return "1:1".to_string();
    }

    let divisor = gcd(width, height);
    format!("{}:{}", width / divisor, height / divisor)
}

/// Whether the dimensions already reduce to a supported ratio exactly.
pub fn is_ratio_supported(width: u32, height: u32) -> bool {
    let current = get_current_ratio_string(width, height);
    SUPPORTED_RATIOS.contains(&current.as_str())
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
