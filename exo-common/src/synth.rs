//! Synthetic light-curve generation
//!
//! Produces relative-flux sequences over a normalized phase axis `[0, 1]`:
//! - `synthesize_transit`: box-shaped dip with a U↔V shape blend
//! - `synthesize_decoy`: stellar-variability baseline with an optional
//!   sharp, asymmetric spurious dip (a "not a planet" example)
//!
//! Inputs are never rejected. Out-of-range values are clamped before use so
//! flux stays finite and a zero duty cycle never divides.
//!
//! The random source is passed in by the caller so curves are reproducible
//! under a seeded RNG.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Probability that a decoy curve carries a spurious dip
pub const DECOY_DIP_PROBABILITY: f64 = 0.6;

/// Decoy baseline modulation amplitude range (relative flux)
pub const DECOY_AMPLITUDE_RANGE: (f64, f64) = (0.0005, 0.003);

/// Decoy baseline cycles across the phase axis
pub const DECOY_CYCLES_RANGE: (f64, f64) = (1.0, 3.0);

/// Decoy dip depth range; shallower than the transits used by the game
pub const DECOY_DIP_DEPTH_RANGE: (f64, f64) = (0.002, 0.008);

/// Decoy dip total width range (fraction of phase axis)
pub const DECOY_DIP_WIDTH_RANGE: (f64, f64) = (0.01, 0.05);

/// Decoy dip center range
pub const DECOY_DIP_CENTER_RANGE: (f64, f64) = (0.1, 0.9);

/// Share of the decoy dip width spent on ingress (the rest is egress)
pub const DECOY_INGRESS_SHARE: f64 = 0.25;

/// Largest noise standard deviation applied to a curve
pub const MAX_NOISE_SIGMA: f64 = 1.0;

/// One sample of a light curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Normalized orbital phase in `[0, 1]`
    pub phase: f64,
    /// Relative flux, nominally 1.0 out of transit
    pub flux: f64,
}

/// Fixed-length, immutable sequence of curve samples
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalCurve {
    points: Vec<CurvePoint>,
}

impl SignalCurve {
    fn from_parts(phases: Vec<f64>, fluxes: Vec<f64>) -> Self {
        let points = phases
            .into_iter()
            .zip(fluxes)
            .map(|(phase, flux)| CurvePoint { phase, flux })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn fluxes(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.flux)
    }

    /// Lowest flux value in the curve
    pub fn min_flux(&self) -> f64 {
        self.fluxes().fold(f64::INFINITY, f64::min)
    }

    /// Index of the sample whose phase is closest to `phase`
    ///
    /// Ties resolve to the lower index.
    pub fn nearest_index(&self, phase: f64) -> Option<usize> {
        self.points
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (a.phase - phase)
                    .abs()
                    .total_cmp(&(b.phase - phase).abs())
            })
            .map(|(i, _)| i)
    }
}

/// Inputs of `synthesize_transit` after deriving them from physical parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DipShape {
    /// Fractional flux drop at the dip center
    pub depth: f64,
    /// Duty cycle: fraction of the phase axis inside the dip
    pub width: f64,
    /// Phase of the dip center
    pub center: f64,
    /// 0 = flat-bottom U, 1 = pointed V
    pub shape_factor: f64,
}

impl DipShape {
    /// Clamp every field into the range the synthesizer accepts
    pub fn sanitized(self) -> Self {
        Self {
            depth: finite_or(self.depth, 0.0).clamp(0.0, 1.0),
            width: finite_or(self.width, 0.0).clamp(0.0, 1.0),
            center: finite_or(self.center, 0.5).clamp(0.0, 1.0),
            shape_factor: finite_or(self.shape_factor, 0.0).clamp(0.0, 1.0),
        }
    }
}

/// Physical transit description as entered on the simulator page
///
/// `period` is in days and `duration` in hours, matching the KOI catalogue
/// columns `koi_period` and `koi_duration`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitParameters {
    pub period: f64,
    pub duration: f64,
    /// Planet-to-star radius ratio (Rp / Rs)
    pub radius_ratio: f64,
    pub impact_parameter: f64,
    pub noise_sigma: f64,
    pub shape_factor: f64,
    pub center_phase: f64,
}

impl Default for TransitParameters {
    fn default() -> Self {
        Self {
            period: 10.0,
            duration: 6.0,
            radius_ratio: 0.1,
            impact_parameter: 0.3,
            noise_sigma: 0.0005,
            shape_factor: 0.2,
            center_phase: 0.5,
        }
    }
}

impl TransitParameters {
    /// Derive depth, duty cycle and shape from the physical parameters
    ///
    /// Depth is `k²` scaled by the visible fraction of the planet disk: full
    /// for `b ≤ 1 − k`, falling linearly to zero at `b = 1 + k` (no transit).
    /// Grazing geometry pushes the shape toward V.
    pub fn dip_shape(&self) -> DipShape {
        let k = finite_or(self.radius_ratio, 0.0).clamp(0.0, 1.0);
        let b = finite_or(self.impact_parameter, 0.0).max(0.0);

        let (visible, grazing) = if k == 0.0 || b >= 1.0 + k {
            (0.0, 0.0)
        } else if b <= 1.0 - k {
            (1.0, 0.0)
        } else {
            let overlap = ((1.0 + k - b) / (2.0 * k)).clamp(0.0, 1.0);
            (overlap, 1.0 - overlap)
        };

        let period_hours = finite_or(self.period, 0.0) * 24.0;
        let width = if period_hours > 0.0 {
            finite_or(self.duration, 0.0) / period_hours
        } else {
            0.0
        };

        DipShape {
            depth: k * k * visible,
            width,
            center: self.center_phase,
            shape_factor: finite_or(self.shape_factor, 0.0).max(grazing),
        }
        .sanitized()
    }
}

/// `n` evenly spaced phases over `[0, 1]`, both endpoints included
///
/// `n = 0` is treated as 1; a single sample sits at phase 0.0.
pub fn phase_axis(n: usize) -> Vec<f64> {
    let n = n.max(1);
    if n == 1 {
        return vec![0.0];
    }
    let last = (n - 1) as f64;
    (0..n).map(|i| i as f64 / last).collect()
}

/// Generate a transit light curve
///
/// In-window samples (`|phase − center| ≤ width/2`) get
/// `flux = 1 − depth × (1 − shape_factor × frac)` where `frac` is the
/// normalized distance from the center. `width = 0` yields a flat curve.
pub fn synthesize_transit<R: Rng + ?Sized>(
    rng: &mut R,
    n: usize,
    depth: f64,
    width: f64,
    center: f64,
    shape_factor: f64,
    noise_sigma: f64,
) -> SignalCurve {
    let shape = DipShape {
        depth,
        width,
        center,
        shape_factor,
    }
    .sanitized();

    let phases = phase_axis(n);
    let half = shape.width / 2.0;

    let mut fluxes: Vec<f64> = phases
        .iter()
        .map(|&phase| {
            let distance = (phase - shape.center).abs();
            if half <= 0.0 || distance > half {
                return 1.0;
            }
            let frac = (distance / half).clamp(0.0, 1.0);
            1.0 - shape.depth * (1.0 - shape.shape_factor * frac)
        })
        .collect();

    add_noise(rng, &mut fluxes, noise_sigma);
    SignalCurve::from_parts(phases, fluxes)
}

/// Generate a transit light curve from a pre-derived [`DipShape`]
pub fn synthesize_shape<R: Rng + ?Sized>(
    rng: &mut R,
    n: usize,
    shape: DipShape,
    noise_sigma: f64,
) -> SignalCurve {
    synthesize_transit(
        rng,
        n,
        shape.depth,
        shape.width,
        shape.center,
        shape.shape_factor,
        noise_sigma,
    )
}

/// Spurious dip carried by some decoys
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecoyDip {
    pub depth: f64,
    pub center: f64,
    /// Phase span from dip start to the minimum
    pub ingress: f64,
    /// Phase span from the minimum back to baseline
    pub egress: f64,
}

/// Randomly drawn decoy parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecoyProfile {
    pub amplitude: f64,
    pub cycles: f64,
    pub offset: f64,
    pub dip: Option<DecoyDip>,
}

impl DecoyProfile {
    /// Draw a fresh profile; every parameter is independent per call
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let amplitude = rng.gen_range(DECOY_AMPLITUDE_RANGE.0..=DECOY_AMPLITUDE_RANGE.1);
        let cycles = rng.gen_range(DECOY_CYCLES_RANGE.0..=DECOY_CYCLES_RANGE.1);
        let offset = rng.gen_range(0.0..1.0);

        let dip = if rng.gen_bool(DECOY_DIP_PROBABILITY) {
            let width = rng.gen_range(DECOY_DIP_WIDTH_RANGE.0..=DECOY_DIP_WIDTH_RANGE.1);
            Some(DecoyDip {
                depth: rng.gen_range(DECOY_DIP_DEPTH_RANGE.0..=DECOY_DIP_DEPTH_RANGE.1),
                center: rng.gen_range(DECOY_DIP_CENTER_RANGE.0..=DECOY_DIP_CENTER_RANGE.1),
                ingress: width * DECOY_INGRESS_SHARE,
                egress: width * (1.0 - DECOY_INGRESS_SHARE),
            })
        } else {
            None
        };

        Self {
            amplitude,
            cycles,
            offset,
            dip,
        }
    }

    /// Noise-free flux at `phase`
    pub fn flux_at(&self, phase: f64) -> f64 {
        let baseline = 1.0 + self.amplitude * (TAU * (self.cycles * phase + self.offset)).sin();
        let dip = self.dip.map_or(0.0, |dip| dip.drop_at(phase));
        (baseline - dip).max(0.0)
    }
}

impl DecoyDip {
    /// V-shaped drop with separate ingress and egress slopes
    fn drop_at(&self, phase: f64) -> f64 {
        let offset = phase - self.center;
        let span = if offset < 0.0 { self.ingress } else { self.egress };
        if span <= 0.0 || offset.abs() > span {
            return 0.0;
        }
        self.depth * (1.0 - offset.abs() / span)
    }
}

/// Generate a non-planet light curve with randomly drawn parameters
pub fn synthesize_decoy<R: Rng + ?Sized>(rng: &mut R, n: usize, noise_sigma: f64) -> SignalCurve {
    let profile = DecoyProfile::draw(rng);
    synthesize_decoy_with(rng, n, &profile, noise_sigma)
}

/// Generate a non-planet light curve from an explicit profile
pub fn synthesize_decoy_with<R: Rng + ?Sized>(
    rng: &mut R,
    n: usize,
    profile: &DecoyProfile,
    noise_sigma: f64,
) -> SignalCurve {
    let phases = phase_axis(n);
    let mut fluxes: Vec<f64> = phases.iter().map(|&p| profile.flux_at(p)).collect();
    add_noise(rng, &mut fluxes, noise_sigma);
    SignalCurve::from_parts(phases, fluxes)
}

/// Noise sigma as applied: NaN and negatives become 0, large values are capped
pub fn clamp_noise_sigma(noise_sigma: f64) -> f64 {
    finite_or(noise_sigma, 0.0).clamp(0.0, MAX_NOISE_SIGMA)
}

fn add_noise<R: Rng + ?Sized>(rng: &mut R, fluxes: &mut [f64], noise_sigma: f64) {
    let sigma = clamp_noise_sigma(noise_sigma);
    if sigma <= 0.0 {
        return;
    }
    if let Ok(normal) = Normal::new(0.0, sigma) {
        for flux in fluxes.iter_mut() {
            *flux += normal.sample(rng);
        }
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
