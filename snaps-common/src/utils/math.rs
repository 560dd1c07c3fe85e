// NOTE: derived from the line through (from_low, to_low) and (from_up, to_up)
pub fn lerp(from_low: f64, from_up: f64, to_low: f64, to_up: f64, from: f64) -> f64 {
    let perc = (from - from_low) / (from_up - from_low);
    perc * (to_up - to_low) + to_low
}

/// `num` evenly spaced values from `start` to `stop`, both included. A single value is
/// just `start`.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => vec![],
        1 => vec![start],
        _ => {
            let last = (num - 1) as f64;
            (0..num)
                .map(|i| {
                    if i == num - 1 {
                        stop
                    } else {
                        lerp(0.0, last, start, stop, i as f64)
                    }
                })
                .collect()
        }
    }
}
