//! Steering wheel angle sensor curve

const CURVE_GAIN: f64 = 0.638_765_9;
const CURVE_NUMERATOR: f64 = -515.789_5;
const CURVE_ASYMPTOTE: f64 = 765.789_5;
const CURVE_OFFSET: f64 = 2.0;

/// Convert a raw potentiometer reading into a steering percentage
///
/// The sensor is logarithmic; readings at or past the asymptote saturate at
/// full left.
pub fn raw_to_percent(raw: i32) -> f32 {
    let ratio = CURVE_NUMERATOR / (raw as f64 - CURVE_ASYMPTOTE);
    let percent = 100.0 * CURVE_GAIN * ratio.ln() - CURVE_OFFSET;
    if percent.is_nan() {
        return 100.0;
    }
    percent.clamp(0.0, 100.0) as f32
}
