//! Linear interpolation over gaps in evenly spaced samples

/// Fill interior gaps of an evenly spaced series by linear interpolation.
///
/// Positions are treated as equally spaced. A `None` between two known values is
/// replaced by the straight line joining them; leading and trailing `None`s have no
/// bracketing pair and are left untouched. Returns the number of filled slots.
pub fn interpolate_linear(values: &mut [Option<f64>]) -> usize {
    let mut filled = 0;
    let mut last_known: Option<usize> = None;

    for i in 0..values.len() {
        let Some(current) = values[i] else {
            continue;
        };

        if let Some(start) = last_known {
            let gap = i - start;
            if gap > 1 {
                let Some(from) = values[start] else {
                    continue;
                };
                let step = (current - from) / gap as f64;
                for (offset, slot) in values[start + 1..i].iter_mut().enumerate() {
                    *slot = Some(from + step * (offset + 1) as f64);
                    filled += 1;
                }
            }
        }
        last_known = Some(i);
    }

    filled
}
