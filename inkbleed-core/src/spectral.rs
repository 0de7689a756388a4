//! Spectral pigment mixing.
//!
//! Colors are lifted into a 38-band reflectance curve (380nm..=750nm, 10nm steps), mixed per band
//! with a single-constant Kubelka-Munk model, and integrated back into linear RGB. Mixing blue and
//! yellow this way produces green rather than the gray a channel-wise blend would give.
//!
//! The reflectance basis is a partition of unity over the visible range, so white, the primaries
//! and the secondaries all survive the round trip through [`Spectrum`] exactly.

use std::sync::OnceLock;

/// Number of sampled wavelengths.
pub const BANDS: usize = 38;
/// Reflectance floor, keeps the absorption/scattering ratio finite.
const EPSILON: f32 = 1e-8;
const FIRST_WAVELENGTH: f64 = 380.0;
const WAVELENGTH_STEP: f64 = 10.0;
/// Rec. 709 luminance weights for linear RGB.
const LUMA: [f64; 3] = [0.2126, 0.7152, 0.0722];
/// CIE XYZ to linear sRGB (D65).
const XYZ_TO_RGB: [[f64; 3]; 3] = [
    [3.240_454_2, -1.537_138_5, -0.498_531_4],
    [-0.969_266_0, 1.876_010_8, 0.041_556_0],
    [0.055_643_4, -0.204_025_9, 1.057_225_2],
];

type Curve = [f32; BANDS];

struct Tables {
    white: Curve,
    cyan: Curve,
    magenta: Curve,
    yellow: Curve,
    red: Curve,
    green: Curve,
    blue: Curve,
    /// Reflectance to linear RGB, one row per channel.
    to_linear: [Curve; 3],
    /// Reflectance to luminance.
    luma: Curve,
}

fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(Tables::build)
}

fn logistic(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// One asymmetric gaussian lobe of the analytic color matching fit.
fn lobe(wavelength: f64, mean: f64, below: f64, above: f64) -> f64 {
    let width = if wavelength < mean { below } else { above };
    let t = (wavelength - mean) / width;
    (-0.5 * t * t).exp()
}

/// Multi-lobe fit of the CIE 1931 observer (Wyman, Sloan & Shirley).
fn color_matching(wavelength: f64) -> [f64; 3] {
    let l = wavelength;
    [
        1.056 * lobe(l, 599.8, 37.9, 31.0) + 0.362 * lobe(l, 442.0, 16.0, 26.7)
            - 0.065 * lobe(l, 501.1, 20.4, 26.2),
        0.821 * lobe(l, 568.8, 46.9, 40.5) + 0.286 * lobe(l, 530.9, 16.3, 31.1),
        1.217 * lobe(l, 437.0, 11.8, 36.0) + 0.681 * lobe(l, 459.0, 26.0, 13.8),
    ]
}

fn invert3(m: [[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let cofactor = |r0: usize, r1: usize, c0: usize, c1: usize| {
        m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]
    };
    let det = m[0][0] * cofactor(1, 2, 1, 2) - m[0][1] * cofactor(1, 2, 0, 2)
        + m[0][2] * cofactor(1, 2, 0, 1);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    Some([
        [
            cofactor(1, 2, 1, 2) * inv_det,
            -cofactor(0, 2, 1, 2) * inv_det,
            cofactor(0, 1, 1, 2) * inv_det,
        ],
        [
            -cofactor(1, 2, 0, 2) * inv_det,
            cofactor(0, 2, 0, 2) * inv_det,
            -cofactor(0, 1, 0, 2) * inv_det,
        ],
        [
            cofactor(1, 2, 0, 1) * inv_det,
            -cofactor(0, 2, 0, 1) * inv_det,
            cofactor(0, 1, 0, 1) * inv_det,
        ],
    ])
}

#[allow(clippy::cast_possible_truncation)]
fn narrow(curve: &[f64; BANDS]) -> Curve {
    curve.map(|v| v as f32)
}

impl Tables {
    #[allow(clippy::cast_precision_loss, clippy::needless_range_loop)]
    fn build() -> Self {
        let mut red = [0.0f64; BANDS];
        let mut green = [0.0f64; BANDS];
        let mut blue = [0.0f64; BANDS];
        let mut projection = [[0.0f64; BANDS]; 3];

        for i in 0..BANDS {
            let wavelength = FIRST_WAVELENGTH + WAVELENGTH_STEP * i as f64;
            // Soft blue/green and green/red boundaries.
            let above_blue = logistic((wavelength - 490.0) / 20.0);
            let above_green = logistic((wavelength - 585.0) / 15.0);
            blue[i] = 1.0 - above_blue;
            red[i] = above_green;
            green[i] = above_blue - above_green;

            let xyz = color_matching(wavelength);
            for (channel, row) in XYZ_TO_RGB.iter().enumerate() {
                projection[channel][i] = row[0] * xyz[0] + row[1] * xyz[1] + row[2] * xyz[2];
            }
        }

        // Calibrate so the primaries land exactly on the unit axes.
        let mut response = [[0.0f64; 3]; 3];
        for (channel, row) in projection.iter().enumerate() {
            for (primary, curve) in [&red, &green, &blue].into_iter().enumerate() {
                response[channel][primary] = row.iter().zip(curve.iter()).map(|(a, b)| a * b).sum();
            }
        }
        let calibration = invert3(response).unwrap_or_else(|| {
            log::error!("spectral response is singular, mixing will be uncalibrated");
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
        });
        let mut to_linear = [[0.0f64; BANDS]; 3];
        for (channel, weights) in calibration.iter().enumerate() {
            for i in 0..BANDS {
                to_linear[channel][i] = (0..3).map(|k| weights[k] * projection[k][i]).sum();
            }
        }
        let mut luma = [0.0f64; BANDS];
        for i in 0..BANDS {
            luma[i] = (0..3).map(|k| LUMA[k] * to_linear[k][i]).sum();
        }

        let add = |a: &[f64; BANDS], b: &[f64; BANDS]| -> [f64; BANDS] {
            std::array::from_fn(|i| a[i] + b[i])
        };
        Self {
            white: [1.0; BANDS],
            cyan: narrow(&add(&green, &blue)),
            magenta: narrow(&add(&red, &blue)),
            yellow: narrow(&add(&red, &green)),
            red: narrow(&red),
            green: narrow(&green),
            blue: narrow(&blue),
            to_linear: to_linear.map(|row| narrow(&row)),
            luma: narrow(&luma),
        }
    }
}

#[must_use]
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
#[must_use]
pub fn linear_to_srgb(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Absorption/scattering ratio of a reflectance.
fn absorption(reflectance: f32) -> f32 {
    let r = reflectance.max(EPSILON);
    (1.0 - r) * (1.0 - r) / (2.0 * r)
}
/// Reflectance of an absorption/scattering ratio. Inverse of [`absorption`].
///
/// `1 + ks - sqrt(ks² + 2ks)`, rearranged to stay accurate for very dark bands.
fn reflectance(ks: f32) -> f32 {
    1.0 / (1.0 + ks + (ks * ks + 2.0 * ks).sqrt())
}

/// A color lifted into reflectance space.
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrum {
    reflectance: Curve,
    absorption: Curve,
    luminance: f32,
}
impl Spectrum {
    /// Lift a linear RGB color, channels in `[0, 1]`.
    #[must_use]
    pub fn from_linear(rgb: [f32; 3]) -> Self {
        let tables = tables();
        let [r, g, b] = rgb.map(|c| if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) });

        let w = r.min(g).min(b);
        let (r, g, b) = (r - w, g - w, b - w);
        let c = g.min(b);
        let m = r.min(b);
        let y = r.min(g);
        let r_only = (r - b).min(r - g).max(0.0);
        let g_only = (g - r).min(g - b).max(0.0);
        let b_only = (b - g).min(b - r).max(0.0);

        let reflectance: Curve = std::array::from_fn(|i| {
            let v = w * tables.white[i]
                + c * tables.cyan[i]
                + m * tables.magenta[i]
                + y * tables.yellow[i]
                + r_only * tables.red[i]
                + g_only * tables.green[i]
                + b_only * tables.blue[i];
            v.max(EPSILON)
        });
        Self::from_reflectance(reflectance)
    }
    /// Lift a display-space color, channels in `[0, 1]`.
    #[must_use]
    pub fn from_srgb(rgb: [f32; 3]) -> Self {
        Self::from_linear(rgb.map(srgb_to_linear))
    }
    fn from_reflectance(reflectance: Curve) -> Self {
        let luma = &tables().luma;
        let luminance = reflectance
            .iter()
            .zip(luma.iter())
            .map(|(r, l)| r * l)
            .sum::<f32>()
            .max(EPSILON);
        Self {
            absorption: reflectance.map(absorption),
            reflectance,
            luminance,
        }
    }
    #[must_use]
    pub fn reflectance(&self) -> &[f32; BANDS] {
        &self.reflectance
    }
    /// Relative luminance, the "strength" used to weight concentrations.
    #[must_use]
    pub fn luminance(&self) -> f32 {
        self.luminance
    }
    #[must_use]
    pub fn to_linear(&self) -> [f32; 3] {
        integrate(&self.reflectance)
    }
    #[must_use]
    pub fn to_srgb(&self) -> [f32; 3] {
        self.to_linear().map(linear_to_srgb)
    }
    /// Mix `t` parts of `other` into `self`, returning linear RGB.
    #[must_use]
    pub fn mix_linear(&self, other: &Self, t: f32) -> [f32; 3] {
        let t = t.clamp(0.0, 1.0);
        let t1 = self.luminance * (1.0 - t) * (1.0 - t);
        let t2 = other.luminance * t * t;
        let concentration = if t1 + t2 > 0.0 { t2 / (t1 + t2) } else { t };

        let mixed: Curve = std::array::from_fn(|i| {
            let ks = (1.0 - concentration) * self.absorption[i]
                + concentration * other.absorption[i];
            reflectance(ks)
        });
        integrate(&mixed)
    }
    /// Mix `t` parts of `other` into `self`, returning display-space RGB.
    #[must_use]
    pub fn mix_srgb(&self, other: &Self, t: f32) -> [f32; 3] {
        self.mix_linear(other, t).map(linear_to_srgb)
    }
}

fn integrate(reflectance: &Curve) -> [f32; 3] {
    tables().to_linear.each_ref().map(|row| {
        row.iter()
            .zip(reflectance.iter())
            .map(|(w, r)| w * r)
            .sum::<f32>()
            .clamp(0.0, 1.0)
    })
}

/// Mix two display-space colors.
#[must_use]
pub fn mix_srgb(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    Spectrum::from_srgb(a).mix_srgb(&Spectrum::from_srgb(b), t)
}

#[cfg(test)]
mod test {
    use super::*;
    fn close(a: [f32; 3], b: [f32; 3], tolerance: f32) -> bool {
        a.iter().zip(b.iter()).all(|(a, b)| (a - b).abs() <= tolerance)
    }
    #[test]
    fn basis_round_trips() {
        for rgb in [
            [1.0, 1.0, 1.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 1.0, 0.0],
            [0.2, 0.5, 0.9],
        ] {
            let back = Spectrum::from_linear(rgb).to_linear();
            assert!(close(rgb, back, 1e-3), "{rgb:?} came back as {back:?}");
        }
    }
    #[test]
    fn mixing_endpoints_and_self() {
        let a = Spectrum::from_srgb([0.8, 0.4, 0.2]);
        let b = Spectrum::from_srgb([0.1, 0.3, 0.7]);
        assert!(close(a.mix_linear(&b, 0.0), a.to_linear(), 1e-3));
        assert!(close(a.mix_linear(&b, 1.0), b.to_linear(), 1e-3));
        assert!(close(a.mix_linear(&a, 0.5), a.to_linear(), 1e-3));
    }
    #[test]
    fn blue_and_yellow_make_green() {
        let [r, g, b] = mix_srgb([0.0, 0.0, 1.0], [1.0, 1.0, 0.0], 0.5);
        assert!(g > r && g > b, "got {:?}", [r, g, b]);
    }
    #[test]
    fn gamma_round_trip() {
        for v in [0.0, 0.02, 0.2, 0.5, 1.0] {
            assert!((linear_to_srgb(srgb_to_linear(v)) - v).abs() < 1e-5);
        }
    }
}
