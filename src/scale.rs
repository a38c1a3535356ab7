//! Focus-based non-linear coordinate scale.
//!
//! Maps a genomic domain onto a pixel range with a power-law that
//! concentrates resolution around a movable focus point. The mapping is
//! split at the focus: each side is an ordinary power curve, normalized so
//! the two branches agree at the focus and at the domain endpoints.

use crate::types::GenomicPos;
use serde::{Deserialize, Serialize};

/// Minimum screen gap (px) between consecutive ticks before a sub-interval
/// is refined with the next power of ten.
const TICK_REFINE_PX: f64 = 60.0;
const POWERTICK_REFINE_PX: f64 = 50.0;

/// An invertible focus-centered power-law scale.
///
/// Treated as a value snapshot once handed to a renderer: every mutating
/// call logically produces a new scale, and interpolation snapshots are
/// taken by copy before mutation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocusScale {
    domain: [f64; 2],
    range: [f64; 2],
    focus: f64,
    exponent: f64,
    domain_size: f64,
    range_size: f64,
}

impl FocusScale {
    /// Create a scale. The focus is clamped into the domain.
    ///
    /// `exponent < 1` is not rejected but produces degenerate curves;
    /// callers should clamp.
    pub fn new(domain: [f64; 2], range: [f64; 2], focus: f64, exponent: f64) -> Self {
        let mut scale = Self {
            domain,
            range,
            focus: focus.clamp(domain[0], domain[1]),
            exponent,
            domain_size: 0.0,
            range_size: 0.0,
        };
        scale.rescale();
        scale
    }

    /// An undeformed scale: focus at the domain start, exponent 1.
    pub fn linear(domain: [f64; 2], range: [f64; 2]) -> Self {
        Self::new(domain, range, domain[0], 1.0)
    }

    fn rescale(&mut self) {
        self.domain_size = self.domain[1] - self.domain[0];
        self.range_size = self.range[1] - self.range[0];
    }

    pub fn domain(&self) -> [f64; 2] {
        self.domain
    }

    pub fn range(&self) -> [f64; 2] {
        self.range
    }

    pub fn focus(&self) -> f64 {
        self.focus
    }

    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    /// Set the domain, clamping the focus into it.
    pub fn set_domain(&mut self, domain: [f64; 2]) {
        self.domain = domain;
        self.focus = self.focus.clamp(domain[0], domain[1]);
        self.rescale();
    }

    pub fn set_range(&mut self, range: [f64; 2]) {
        self.range = range;
        self.rescale();
    }

    pub fn set_focus(&mut self, focus: f64) {
        self.focus = focus.clamp(self.domain[0], self.domain[1]);
        self.rescale();
    }

    pub fn set_exponent(&mut self, exponent: f64) {
        self.exponent = exponent;
        self.rescale();
    }

    /// Map a domain coordinate to a range (pixel) coordinate.
    ///
    /// Outside the domain the result clamps to the range endpoints.
    pub fn forward(&self, x: f64) -> f64 {
        let pos = x - self.domain[0];
        let focus2 = self.focus - self.domain[0];
        if pos < 0.0 {
            return self.range[0];
        }
        if pos <= focus2 && focus2 > 0.0 {
            return self.range[0]
                + focus2 * self.range_size / self.domain_size
                    * (pos / focus2).powf(self.exponent);
        }
        if pos < self.domain_size {
            return self.range[0]
                + self.range_size
                    * (1.0
                        - (1.0 - focus2 / self.domain_size)
                            * ((self.domain_size - pos) / (self.domain_size - focus2))
                                .powf(self.exponent));
        }
        self.range[1]
    }

    /// Exact algebraic inverse of [`forward`](Self::forward), rounded to the
    /// nearest integral base. The branch is selected by comparing the pixel
    /// against the focus image.
    pub fn invert(&self, y: f64) -> f64 {
        let pos = y - self.range[0];
        let focus2 = (self.focus - self.domain[0]).min(self.domain_size);
        if pos <= 0.0 {
            return self.domain[0];
        }
        if pos < self.range_size {
            if pos / self.range_size < focus2 / self.domain_size {
                return self.domain[0]
                    + (focus2
                        * ((pos / self.range_size) / (focus2 / self.domain_size))
                            .powf(1.0 / self.exponent))
                    .round();
            }
            if focus2 < self.domain_size {
                return self.domain[0]
                    + (self.domain_size
                        - (self.domain_size - focus2)
                            * ((1.0 - pos / self.range_size) / (1.0 - focus2 / self.domain_size))
                                .powf(1.0 / self.exponent))
                    .round();
            }
        }
        self.domain[1]
    }

    /// Pixel width of a feature span under this scale.
    pub fn span_width(&self, start: GenomicPos, end: GenomicPos) -> f64 {
        self.forward(end as f64) - self.forward(start as f64)
    }

    /// Closed-form derivative of the active branch at `x`.
    ///
    /// Used to convert a pixel drag delta near the focus into a
    /// proportional domain delta; the mapping is not locally linear.
    pub fn derivative(&self, x: f64) -> f64 {
        let slope = self.range_size / self.domain_size * self.exponent;
        if x < self.focus {
            let focus2 = self.focus - self.domain[0];
            slope * ((x - self.domain[0]) / focus2).powf(self.exponent - 1.0)
        } else if self.focus < self.domain[1] {
            slope
                * ((self.domain[1] - x) / (self.domain[1] - self.focus)).powf(self.exponent - 1.0)
        } else {
            // focus pinned to the domain end: both branches meet here with
            // the focal slope
            slope
        }
    }

    /// Reciprocal slope exactly at the focus, `domainSize / (rangeSize * exponent)`.
    /// Scales pointer-drag panning speed.
    pub fn inv_deriv_at_focus(&self) -> f64 {
        self.domain_size / (self.range_size * self.exponent)
    }

    /// Solve for focus and exponent such that `[rstart, rend]` occupies
    /// exactly `proportion` of the range when centered at `rstart`.
    /// Used to zoom to a feature.
    pub fn region_focus(&mut self, rstart: f64, rend: f64, proportion: f64) {
        let rlen = rend - rstart;
        let dlen = self.domain[1] - self.domain[0];
        self.focus = dlen * rstart / (dlen - rlen);
        self.exponent = (1.0 - proportion).ln() / ((dlen - rlen) / dlen).ln();
    }

    /// Tick positions, denser near the focus.
    ///
    /// The domain is subdivided by powers of ten, recursively refining any
    /// sub-interval whose consecutive ticks land more than a fixed pixel
    /// gap apart on screen.
    pub fn ticks(&self) -> Vec<f64> {
        let mut ticks = vec![self.domain[0]];
        let power = (self.domain[1].ln() / 10f64.ln()).floor() as i32;
        self.add_ticks(&mut ticks, self.domain[0], self.domain[1], 10f64.powi(power));
        // the ceil'd grid can overshoot the domain end
        ticks.retain(|&t| t < self.domain[1]);
        ticks.push(self.domain[1]);
        ticks
    }

    fn add_ticks(&self, ticks: &mut Vec<f64>, start: f64, end: f64, interval: f64) {
        // single-base resolution is the finest meaningful subdivision
        if interval < 1.0 {
            return;
        }
        let start = (start / interval).floor() * interval;
        let end = (end / interval).ceil() * interval;
        let mut sprev = self.forward(start);
        let mut i = start + interval;
        while i <= end {
            let scur = self.forward(i);
            if scur - sprev > TICK_REFINE_PX {
                self.add_ticks(ticks, start.max(i - interval), end.min(i), interval / 10.0);
            }
            if i < end {
                ticks.push(i);
                sprev = scur;
            }
            i += interval;
        }
    }

    /// Like [`ticks`](Self::ticks), but each tick carries the decimal power
    /// of the subdivision it came from, for label formatting.
    pub fn powerticks(&self) -> Vec<(f64, i32)> {
        let power = (self.domain[1].ln() / 10f64.ln()).floor() as i32;
        let mut ticks = vec![(self.domain[0], power + 1)];
        self.add_powerticks(&mut ticks, self.domain[0], self.domain[1], power);
        ticks.retain(|&(t, _)| t < self.domain[1]);
        ticks.push((self.domain[1], power));
        ticks
    }

    fn add_powerticks(&self, ticks: &mut Vec<(f64, i32)>, start: f64, end: f64, power: i32) {
        let interval = 10f64.powi(power);
        if interval < 1.0 {
            return;
        }
        let start = (start / interval).floor() * interval;
        let end2 = (end / interval).ceil() * interval;
        let mut sprev = self.forward(start);
        let mut i = start + interval;
        while i <= end2 {
            let iclamp = i.min(end);
            let scur = self.forward(iclamp);
            if scur - sprev > POWERTICK_REFINE_PX {
                self.add_powerticks(ticks, start.max(i - interval), iclamp, power - 1);
            }
            if i < end {
                ticks.push((i, power + 1));
                sprev = scur;
            }
            i += interval;
        }
    }

    /// Interpolator from `old` to `self`, linear in focus and exponent.
    /// Domain and range are assumed equal on both ends.
    pub fn interpolate_from(&self, old: &FocusScale) -> ScaleInterpolator {
        ScaleInterpolator {
            base: *old,
            focus_from: old.focus,
            focus_delta: self.focus - old.focus,
            exponent_from: old.exponent,
            exponent_delta: self.exponent - old.exponent,
        }
    }
}

/// A pure `t -> FocusScale` function used to animate zoom and pan
/// transitions. Custom easing or interpolation strategies implement this
/// in place of the default [`ScaleInterpolator`].
pub trait ScaleInterpolate {
    fn at(&self, t: f64) -> FocusScale;
}

/// Default transition: linear interpolation of focus and exponent.
#[derive(Debug, Clone, Copy)]
pub struct ScaleInterpolator {
    base: FocusScale,
    focus_from: f64,
    focus_delta: f64,
    exponent_from: f64,
    exponent_delta: f64,
}

impl ScaleInterpolate for ScaleInterpolator {
    fn at(&self, t: f64) -> FocusScale {
        let mut scale = self.base;
        scale.set_exponent(self.exponent_from + t * self.exponent_delta);
        scale.set_focus(self.focus_from + t * self.focus_delta);
        scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_scale() -> FocusScale {
        FocusScale::new([0.0, 1000.0], [0.0, 500.0], 200.0, 2.0)
    }

    #[test]
    fn test_forward_at_focus() {
        // focus2 * rangeSize / domainSize = 200 * 500 / 1000
        let scale = sample_scale();
        assert!((scale.forward(200.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_forward_endpoints_and_clamping() {
        let scale = sample_scale();
        assert_eq!(scale.forward(0.0), 0.0);
        assert_eq!(scale.forward(1000.0), 500.0);
        assert_eq!(scale.forward(-50.0), 0.0);
        assert_eq!(scale.forward(2000.0), 500.0);
    }

    #[test]
    fn test_invertibility() {
        for &exponent in &[1.0, 1.5, 2.0, 3.0, 7.0] {
            for &focus in &[0.0, 1.0, 200.0, 500.0, 999.0, 1000.0] {
                let scale = FocusScale::new([0.0, 1000.0], [0.0, 500.0], focus, exponent);
                for x in (0..=1000).step_by(25) {
                    let x = x as f64;
                    let roundtrip = scale.invert(scale.forward(x));
                    assert!(
                        (roundtrip - x).abs() < 1e-6,
                        "x={} focus={} exponent={} -> {}",
                        x,
                        focus,
                        exponent,
                        roundtrip
                    );
                }
            }
        }
    }

    #[test]
    fn test_invertibility_with_offset_domain() {
        let scale = FocusScale::new([5000.0, 9000.0], [10.0, 810.0], 6000.0, 2.5);
        for x in (5000..=9000).step_by(100) {
            let x = x as f64;
            assert!((scale.invert(scale.forward(x)) - x).abs() < 1e-6);
        }
    }

    #[test]
    fn test_monotonicity() {
        let scale = FocusScale::new([0.0, 1000.0], [0.0, 500.0], 333.0, 4.0);
        let mut prev = scale.forward(0.0);
        for x in 1..=1000 {
            let cur = scale.forward(x as f64);
            assert!(cur > prev, "not increasing at x={}", x);
            prev = cur;
        }
    }

    #[test]
    fn test_focus_continuity() {
        // both branches agree at the split point
        for &exponent in &[1.0, 2.0, 5.0] {
            let scale = FocusScale::new([0.0, 1000.0], [0.0, 500.0], 400.0, exponent);
            let left = scale.forward(400.0 - 1e-7);
            let right = scale.forward(400.0 + 1e-7);
            assert!((left - right).abs() < 1e-3);
        }
    }

    #[test]
    fn test_exponent_one_is_linear() {
        let scale = FocusScale::new([0.0, 1000.0], [0.0, 500.0], 700.0, 1.0);
        for x in (0..=1000).step_by(50) {
            let expected = x as f64 / 2.0;
            assert!((scale.forward(x as f64) - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let scale = sample_scale();
        for &x in &[50.0, 150.0, 300.0, 800.0] {
            let h = 1e-4;
            let numeric = (scale.forward(x + h) - scale.forward(x - h)) / (2.0 * h);
            assert!(
                (scale.derivative(x) - numeric).abs() < 1e-3,
                "x={}: {} vs {}",
                x,
                scale.derivative(x),
                numeric
            );
        }
    }

    #[test]
    fn test_inv_deriv_at_focus() {
        let scale = sample_scale();
        assert!((scale.inv_deriv_at_focus() - 1000.0 / (500.0 * 2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_region_focus_example() {
        let mut scale = FocusScale::new([0.0, 1000.0], [0.0, 500.0], 0.0, 1.0);
        scale.region_focus(400.0, 500.0, 0.5);
        assert!((scale.focus() - 1000.0 * 400.0 / 900.0).abs() < 1e-9);
        let expected_exponent = 0.5f64.ln() / (900.0f64 / 1000.0).ln();
        assert!((scale.exponent() - expected_exponent).abs() < 1e-9);
        // the region now occupies the promised share of the range
        let scale = FocusScale::new([0.0, 1000.0], [0.0, 500.0], scale.focus(), scale.exponent());
        let share = (scale.forward(500.0) - scale.forward(400.0)) / 500.0;
        assert!((share - 0.5).abs() < 0.01, "share {}", share);
    }

    #[test]
    fn test_setters_keep_focus_in_domain() {
        let mut scale = sample_scale();
        scale.set_focus(-100.0);
        assert_eq!(scale.focus(), 0.0);
        scale.set_focus(5000.0);
        assert_eq!(scale.focus(), 1000.0);
        scale.set_domain([100.0, 900.0]);
        assert_eq!(scale.focus(), 900.0);
    }

    #[test]
    fn test_ticks_sorted_within_domain() {
        let scale = FocusScale::new([0.0, 248_956_422.0], [0.0, 800.0], 50_000_000.0, 8.0);
        let ticks = scale.ticks();
        assert!(ticks.len() > 2);
        assert_eq!(ticks[0], 0.0);
        assert_eq!(*ticks.last().unwrap(), 248_956_422.0);
        for t in &ticks {
            assert!(*t >= 0.0 && *t <= 248_956_422.0);
        }
    }

    #[test]
    fn test_ticks_denser_near_focus() {
        let scale = FocusScale::new([0.0, 100_000_000.0], [0.0, 800.0], 30_000_000.0, 6.0);
        let ticks = scale.ticks();
        let near = ticks
            .iter()
            .filter(|&&t| (t - 30_000_000.0).abs() < 5_000_000.0)
            .count();
        let far = ticks
            .iter()
            .filter(|&&t| (t - 80_000_000.0).abs() < 5_000_000.0)
            .count();
        assert!(near > far, "near={} far={}", near, far);
    }

    #[test]
    fn test_powerticks_carry_powers() {
        let scale = FocusScale::new([0.0, 1_000_000.0], [0.0, 600.0], 200_000.0, 3.0);
        let ticks = scale.powerticks();
        assert_eq!(ticks[0], (0.0, 6));
        assert_eq!(*ticks.last().unwrap(), (1_000_000.0, 5));
        for (value, _) in &ticks {
            assert!(*value >= 0.0 && *value <= 1_000_000.0);
        }
    }

    #[test]
    fn test_interpolator_endpoints() {
        let old = FocusScale::new([0.0, 1000.0], [0.0, 500.0], 100.0, 1.0);
        let new = FocusScale::new([0.0, 1000.0], [0.0, 500.0], 600.0, 3.0);
        let interp = new.interpolate_from(&old);
        let at0 = interp.at(0.0);
        assert_eq!(at0.focus(), 100.0);
        assert_eq!(at0.exponent(), 1.0);
        let at1 = interp.at(1.0);
        assert_eq!(at1.focus(), 600.0);
        assert_eq!(at1.exponent(), 3.0);
        let mid = interp.at(0.5);
        assert_eq!(mid.focus(), 350.0);
        assert_eq!(mid.exponent(), 2.0);
    }

    #[test]
    fn test_interpolator_is_pure() {
        let old = FocusScale::new([0.0, 1000.0], [0.0, 500.0], 100.0, 1.0);
        let new = FocusScale::new([0.0, 1000.0], [0.0, 500.0], 600.0, 3.0);
        let interp = new.interpolate_from(&old);
        let a = interp.at(0.25);
        let _ = interp.at(0.75);
        let b = interp.at(0.25);
        assert_eq!(a, b);
    }
}
