pub mod time;

/// Relative tolerance used when comparing prices that went through
/// decimal-string parsing on their way in.
pub const DEFAULT_PRICE_TOLERANCE: f64 = 1e-9;

/// Tolerance-based price equality.
///
/// The tolerance is scaled by the larger magnitude (floored at 1.0) so that
/// it behaves sensibly for both sub-cent and five-figure prices.
pub fn prices_equal(a: f64, b: f64, tolerance: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= tolerance * scale
}

/// Render a price the way synthetic level ids expect it.
///
/// Uses the shortest representation that round-trips, so `100.5` renders
/// as `"100.5"` and `100.0` as `"100"`.
pub fn format_price(price: f64) -> String {
    if price.fract() == 0.0 && price.abs() < 1e15 {
        format!("{}", price as i64)
    } else {
        format!("{}", price)
    }
}

/// Format a price for display with a fixed number of decimals
pub fn format_price_fixed(price: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(100.0), "100");
        assert_eq!(format_price(100.5), "100.5");
        assert_eq!(format_price(0.01), "0.01");
        assert_eq!(format_price_fixed(125.5, 2), "125.50");
    }

    #[test]
    fn test_prices_equal_absorbs_drift() {
        assert!(prices_equal(0.1 + 0.2, 0.3, DEFAULT_PRICE_TOLERANCE));
        assert!(prices_equal(100.0, 100.0, DEFAULT_PRICE_TOLERANCE));
        assert!(!prices_equal(100.0, 100.01, DEFAULT_PRICE_TOLERANCE));
        assert!(!prices_equal(100.0, 101.0, DEFAULT_PRICE_TOLERANCE));
    }
}
