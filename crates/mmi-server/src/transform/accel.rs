//! Pointer acceleration curves.
//!
//! A curve is a piecewise-linear function of the input speed `vin` (device
//! counts per sample).  For the segment `i` that contains `vin`, the output
//! distance is `slope[i] * vin + diff[i]`, and the gain applied to both axes
//! is that output divided by `vin`.  The `diff` terms are chosen so adjacent
//! segments meet at their breakpoints, which keeps the cursor from jumping
//! when the hand speeds up.
//!
//! `vin` is `max(|dx|, |dy|) + min(|dx|, |dy|) / 2`, a cheap approximation of
//! the Euclidean length that avoids a square root per sample.

/// One acceleration curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelerationCurve {
    /// Upper bound of each segment; input above the last bound uses the last segment.
    pub limits: [f64; 3],
    pub slopes: [f64; 3],
    pub diffs: [f64; 3],
}

pub const MOUSE_CURVE: AccelerationCurve = AccelerationCurve {
    limits: [8.0, 32.0, 128.0],
    slopes: [0.16, 0.30, 0.56],
    diffs: [0.0, -1.12, -9.44],
};

/// Touchpads report finer motion, so their curve is steeper at low speed.
pub const TOUCHPAD_CURVE: AccelerationCurve = AccelerationCurve {
    limits: [6.0, 24.0, 96.0],
    slopes: [0.35, 0.60, 0.90],
    diffs: [0.0, -1.5, -8.7],
};

impl AccelerationCurve {
    /// Gain for input speed `vin`; `0.0` for a stationary sample.
    pub fn gain(&self, vin: f64) -> f64 {
        if vin <= 0.0 {
            return 0.0;
        }
        let i = self
            .limits
            .iter()
            .position(|limit| vin <= *limit)
            .unwrap_or(self.limits.len() - 1);
        (self.slopes[i] * vin + self.diffs[i]) / vin
    }
}

/// Speed setting multiplier: `1.0` at the default speed of 5.
pub fn speed_factor(speed: i32) -> f64 {
    f64::from(speed.clamp(1, 11) + 3) / 8.0
}

/// Input speed estimate for one relative sample.
pub fn input_speed(dx: f64, dy: f64) -> f64 {
    let (ax, ay) = (dx.abs(), dy.abs());
    ax.max(ay) + ax.min(ay) / 2.0
}

/// Applies `curve` at `speed` to a relative sample, returning the scaled delta.
pub fn accelerate(curve: &AccelerationCurve, speed: i32, dx: f64, dy: f64) -> (f64, f64) {
    let gain = curve.gain(input_speed(dx, dy)) * speed_factor(speed);
    (dx * gain, dy * gain)
}
