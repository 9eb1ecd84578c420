//! Fourier synthesis and analysis along latitude rows.
//!
//! A row of `n` equally spaced longitudes `λ_k = λ_0 + k Δλ` and the
//! wavenumber coefficients `F_m` are related by
//! `f(λ) = Re F_0 + 2 Re Σ_{m>0} F_m e^{imλ}` and
//! `F_m = (1/n) Σ_k f_k e^{-imλ_k}`.
//!
//! Rows with a power-of-two length that resolves every wavenumber use a
//! radix-2 FFT; all others evaluate the sums directly from a shared table
//! of `e^{iλ_k}`.

use std::f64::consts::PI;

use num_complex::Complex64;

/// Highest wavenumber a row of `count` points can carry without aliasing.
pub fn max_wavenumber(count: usize, truncation: usize) -> usize {
    truncation.min(count.saturating_sub(1) / 2)
}

/// Precomputed transform for rows sharing `(count, first_longitude, increment)`.
#[derive(Debug, Clone)]
pub struct FourierPlan {
    count: usize,
    first_longitude: f64,
    increment: f64,
    phases: Vec<Complex64>,
    radix2: bool,
}

impl FourierPlan {
    pub fn new(count: usize, first_longitude: f64, increment: f64) -> Self {
        let phases = (0..count)
            .map(|k| Complex64::from_polar(1.0, (first_longitude + k as f64 * increment).to_radians()))
            .collect();
        let full_circle = (count as f64 * increment - 360.0).abs() < 1e-6;
        Self {
            count,
            first_longitude,
            increment,
            phases,
            radix2: full_circle && count >= 2 && count.is_power_of_two(),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether rows described by `(count, first, increment)` share this plan.
    pub fn matches(&self, count: usize, first_longitude: f64, increment: f64) -> bool {
        self.count == count
            && (self.first_longitude - first_longitude).abs() < 1e-9
            && (self.increment - increment).abs() < 1e-12
    }

    /// Grid-point values from wavenumber coefficients `F_0..=F_M`.
    pub fn synthesise(&self, coefficients: &[Complex64]) -> Vec<f64> {
        if coefficients.is_empty() {
            return vec![0.0; self.count];
        }
        let max_wave = coefficients.len() - 1;
        if self.radix2 && 2 * max_wave < self.count {
            return self.synthesise_fft(coefficients);
        }
        // Horner evaluation of Σ F_m z^m at z = e^{iλ_k}.
        self.phases
            .iter()
            .map(|&z| {
                let mut acc = Complex64::new(0.0, 0.0);
                for c in coefficients.iter().rev() {
                    acc = acc * z + c;
                }
                2.0 * acc.re - coefficients[0].re
            })
            .collect()
    }

    fn synthesise_fft(&self, coefficients: &[Complex64]) -> Vec<f64> {
        let n = self.count;
        let shift = Complex64::from_polar(1.0, self.first_longitude.to_radians());
        let mut spectrum = vec![Complex64::new(0.0, 0.0); n];
        let mut rot = Complex64::new(1.0, 0.0);
        for (m, c) in coefficients.iter().enumerate() {
            let v = c * rot;
            if m == 0 {
                spectrum[0] = Complex64::new(v.re, 0.0);
            } else {
                spectrum[m] = v;
                spectrum[n - m] = v.conj();
            }
            rot *= shift;
        }
        fft_in_place(&mut spectrum, true);
        spectrum.iter().map(|v| v.re).collect()
    }

    /// Wavenumber coefficients `F_0..=F_max_wave` of a row of values.
    pub fn analyse(&self, values: &[f64], max_wave: usize) -> Vec<Complex64> {
        let n = self.count as f64;
        if self.radix2 && 2 * max_wave < self.count {
            let mut data: Vec<Complex64> = values.iter().map(|&v| Complex64::new(v, 0.0)).collect();
            fft_in_place(&mut data, false);
            let shift = Complex64::from_polar(1.0, -self.first_longitude.to_radians());
            let mut rot = Complex64::new(1.0, 0.0);
            return (0..=max_wave)
                .map(|m| {
                    let c = data[m] * rot / n;
                    rot *= shift;
                    c
                })
                .collect();
        }
        let mut out = vec![Complex64::new(0.0, 0.0); max_wave + 1];
        for (&v, &z) in values.iter().zip(&self.phases) {
            let w = z.conj();
            let mut p = Complex64::new(v / n, 0.0);
            for c in out.iter_mut() {
                *c += p;
                p *= w;
            }
        }
        out
    }
}

/// Iterative radix-2 Cooley-Tukey transform. `inverse` uses `e^{+i}`
/// twiddles and does not scale.
pub fn fft_in_place(data: &mut [Complex64], inverse: bool) {
    let n = data.len();
    if n < 2 {
        return;
    }
    let bits = n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> (usize::BITS - bits);
        if j > i {
            data.swap(i, j);
        }
    }
    let sign = if inverse { 1.0 } else { -1.0 };
    let mut len = 2;
    while len <= n {
        let step = Complex64::from_polar(1.0, sign * 2.0 * PI / len as f64);
        for start in (0..n).step_by(len) {
            let mut w = Complex64::new(1.0, 0.0);
            for k in 0..len / 2 {
                let a = data[start + k];
                let b = data[start + k + len / 2] * w;
                data[start + k] = a + b;
                data[start + k + len / 2] = a - b;
                w *= step;
            }
        }
        len <<= 1;
    }
}
