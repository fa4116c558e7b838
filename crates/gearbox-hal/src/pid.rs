//! Software model of a motor controller's native PID loop.
//!
//! Real controllers run this loop on-board at a kHz rate; the simulator in
//! [`crate::sim`] runs it once per plant step so the closed-loop path can be
//! exercised without hardware.  The loop honours the full [`Gains`] tuple:
//!
//! - the integral accumulator is cleared while `|error| > i_zone` (an
//!   `i_zone` of zero disables the zone);
//! - feed-forward contributes `ff * set_point`;
//! - the output and integral term are clamped to `[min_output, max_output]`.
//!
//! # Example
//!
//! ```rust
//! use gearbox_hal::pid::PidController;
//! use gearbox_types::Gains;
//!
//! let mut pid = PidController::new(Gains::pid(1.0, 0.0, 0.0));
//! pid.set_set_point(2.0);
//!
//! let output = pid.update(0.0, 0.02);
//! assert_eq!(output, 1.0); // P*error = 2.0, clamped to max_output
//! ```

use gearbox_types::Gains;

/// A PID controller parameterised by a full [`Gains`] tuple.
#[derive(Debug, Clone)]
pub struct PidController {
    gains: Gains,
    set_point: f64,
    integral: f64,
    last_error: Option<f64>,
}

impl PidController {
    pub fn new(gains: Gains) -> Self {
        Self {
            gains,
            set_point: 0.0,
            integral: 0.0,
            last_error: None,
        }
    }

    /// Replace the gain tuple.  Takes effect on the next [`update`][Self::update].
    pub fn set_gains(&mut self, gains: Gains) {
        self.gains = gains;
    }

    pub fn gains(&self) -> &Gains {
        &self.gains
    }

    /// Change the set-point.  Clears derivative memory so a step change does
    /// not produce a derivative kick.
    pub fn set_set_point(&mut self, set_point: f64) {
        if set_point != self.set_point {
            self.last_error = None;
        }
        self.set_point = set_point;
    }

    pub fn set_point(&self) -> f64 {
        self.set_point
    }

    /// Compute the next controller output.
    ///
    /// Returns `0.0` without touching internal state if `dt` is not positive.
    pub fn update(&mut self, measurement: f64, dt: f64) -> f64 {
        if dt <= 0.0 {
            return 0.0;
        }
        let Gains {
            p,
            i,
            d,
            i_zone,
            ff,
            min_output,
            max_output,
        } = self.gains;

        // A half-written range can leave min above max; use the bounds in
        // whichever order they arrived.
        let (lo, hi) = if min_output <= max_output {
            (min_output, max_output)
        } else {
            (max_output, min_output)
        };

        let error = self.set_point - measurement;

        if i_zone > 0.0 && error.abs() > i_zone {
            self.integral = 0.0;
        } else {
            self.integral += error * dt;
        }
        let i_term = (i * self.integral).clamp(lo, hi);
        // Back-calculate so the accumulator cannot wind up past the clamp.
        if i.abs() > f64::EPSILON {
            self.integral = i_term / i;
        }

        let d_term = match self.last_error {
            Some(prev) => d * (error - prev) / dt,
            None => 0.0,
        };
        self.last_error = Some(error);

        (p * error + i_term + d_term + ff * self.set_point).clamp(lo, hi)
    }

    /// Clear the integral accumulator and derivative memory.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide(p: f64, i: f64, d: f64) -> Gains {
        Gains::pid(p, i, d).with_output_range(-100.0, 100.0)
    }

    #[test]
    fn proportional_only_drives_toward_set_point() {
        let mut pid = PidController::new(wide(2.0, 0.0, 0.0));
        pid.set_set_point(10.0);
        let output = pid.update(0.0, 0.1);
        assert!((output - 20.0).abs() < 1e-9);
    }

    #[test]
    fn output_is_zero_at_set_point() {
        let mut pid = PidController::new(wide(1.0, 0.0, 0.0));
        pid.set_set_point(5.0);
        assert!(pid.update(5.0, 0.1).abs() < 1e-12);
    }

    #[test]
    fn output_clamped_to_range() {
        let mut pid = PidController::new(Gains::pid(100.0, 0.0, 0.0).with_output_range(-0.5, 0.25));
        pid.set_set_point(1.0);
        assert_eq!(pid.update(0.0, 0.01), 0.25);
        pid.set_set_point(-1.0);
        assert_eq!(pid.update(0.0, 0.01), -0.5);
    }

    #[test]
    fn inverted_range_clamps_without_panicking() {
        let mut gains = Gains::pid(100.0, 1.0, 0.0);
        gains.min_output = 0.5;
        gains.max_output = -0.5;
        let mut pid = PidController::new(gains);
        pid.set_set_point(1.0);
        assert_eq!(pid.update(0.0, 0.01), 0.5);
        pid.set_set_point(-1.0);
        assert_eq!(pid.update(0.0, 0.01), -0.5);
    }

    #[test]
    fn integral_accumulates_over_time() {
        let mut pid = PidController::new(wide(0.0, 1.0, 0.0));
        pid.set_set_point(2.0);
        pid.update(1.0, 0.5);
        let out = pid.update(1.0, 0.5);
        assert!((out - 1.0).abs() < 1e-9);
    }

    #[test]
    fn i_zone_clears_integral_outside_zone() {
        let mut pid = PidController::new(wide(0.0, 1.0, 0.0).with_i_zone(0.5));
        pid.set_set_point(2.0);
        // |error| = 2.0 > 0.5: no accumulation.
        assert_eq!(pid.update(0.0, 0.5), 0.0);
        // |error| = 0.25 inside the zone: accumulates.
        let out = pid.update(1.75, 0.5);
        assert!((out - 0.125).abs() < 1e-9);
    }

    #[test]
    fn feed_forward_scales_with_set_point() {
        let mut pid = PidController::new(wide(0.0, 0.0, 0.0).with_ff(0.5));
        pid.set_set_point(4.0);
        assert!((pid.update(4.0, 0.02) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_state() {
        let mut pid = PidController::new(wide(1.0, 1.0, 1.0));
        pid.set_set_point(5.0);
        pid.update(0.0, 0.1);
        pid.reset();

        let mut fresh = PidController::new(wide(1.0, 1.0, 1.0));
        fresh.set_set_point(5.0);
        assert!((pid.update(0.0, 0.1) - fresh.update(0.0, 0.1)).abs() < 1e-12);
    }

    #[test]
    fn non_positive_dt_returns_zero_without_side_effects() {
        let mut pid = PidController::new(wide(1.0, 1.0, 1.0));
        pid.set_set_point(5.0);
        assert_eq!(pid.update(0.0, 0.0), 0.0);
        assert_eq!(pid.update(0.0, -0.1), 0.0);

        let mut fresh = PidController::new(wide(1.0, 1.0, 1.0));
        fresh.set_set_point(5.0);
        assert!((pid.update(0.0, 0.1) - fresh.update(0.0, 0.1)).abs() < 1e-12);
    }

    #[test]
    fn set_gains_takes_effect_next_update() {
        let mut pid = PidController::new(wide(1.0, 0.0, 0.0));
        pid.set_set_point(10.0);
        pid.set_gains(wide(3.0, 0.0, 0.0));
        assert!((pid.update(0.0, 0.1) - 30.0).abs() < 1e-9);
        assert_eq!(pid.gains().p, 3.0);
    }
}
