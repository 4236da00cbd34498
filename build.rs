use std::fs::File;
use std::io::{Error, ErrorKind, Result, Write};
use std::path::PathBuf;

// Lanczos approximation of ln Γ(x) for x > 0.
fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFS: [f64; 8] = [
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        return std::f64::consts::PI.ln()
            - (std::f64::consts::PI * x).sin().ln()
            - ln_gamma(1.0 - x);
    }
    let z = x - 1.0;
    let mut sum = 0.999_999_999_999_809_9;
    for (i, c) in COEFFS.iter().enumerate() {
        sum += c / (z + (i as f64) + 1.0);
    }
    let t = z + G + 0.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (z + 0.5) * t.ln() - t + sum.ln()
}

fn gamma_fn(x: f64) -> f64 {
    ln_gamma(x).exp()
}

// Regularized lower incomplete gamma P(a, x).
fn regularized_lower_gamma(a: f64, x: f64) -> f64 {
    if x < 0.0 || a <= 0.0 {
        return 0.0;
    }
    if x < a + 1.0 {
        let mut ap = a;
        let mut sum = 1.0 / a;
        let mut del = sum;
        for _ in 0..200 {
            ap += 1.0;
            del *= x / ap;
            sum += del;
            if del.abs() < sum.abs() * 1e-14 {
                break;
            }
        }
        sum * (-x + a * x.ln() - ln_gamma(a)).exp()
    } else {
        let mut b = x + 1.0 - a;
        let mut c = 1.0 / 1e-30;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..200 {
            let an = -(i as f64) * ((i as f64) - a);
            b += 2.0;
            d = an * d + b;
            if d.abs() < 1e-30 {
                d = 1e-30;
            }
            c = b + an / c;
            if c.abs() < 1e-30 {
                c = 1e-30;
            }
            d = 1.0 / d;
            let delta = d * c;
            h *= delta;
            if (delta - 1.0).abs() < 1e-14 {
                break;
            }
        }
        1.0 - (-x + a * x.ln() - ln_gamma(a)).exp() * h
    }
}

fn lower_incomplete_gamma(a: f64, x: f64) -> f64 {
    regularized_lower_gamma(a, x) * gamma_fn(a)
}

fn upper_incomplete_gamma(a: f64, x: f64) -> f64 {
    gamma_fn(a) - lower_incomplete_gamma(a, x)
}

// Two-view correspondences (x1 y1 x2 y2) live in a 4-dimensional space.
const DOF: usize = 4;
// 0.99 quantile of the chi distribution with `DOF` degrees of freedom.
const SIGMA_QUANTILE: f64 = 3.64;
const SAMPLES: usize = 1024;

fn main() -> Result<()> {
    // Tabulate the incomplete gamma values sigma-consensus++ evaluates per
    // residual so the scoring loop never calls the series expansions.
    let out_dir = std::env::var("OUT_DIR")
        .map(PathBuf::from)
        .map_err(|e| Error::new(ErrorKind::NotFound, e))?;
    let mut f = File::create(out_dir.join("sigma_lut.rs"))?;

    let upper_a = (DOF as f64 - 1.0) / 2.0;
    let lower_a = (DOF as f64 + 1.0) / 2.0;
    let k = SIGMA_QUANTILE;

    writeln!(
        f,
        "// Generated by build.rs: incomplete gamma tables for sigma-consensus++.\n\
         // Entry i holds (upper_gamma((n-1)/2, t^2/2), lower_gamma((n+1)/2, t^2/2)) at t = i * k / (samples - 1).\n\
         pub const SIGMA_DOF: usize = {DOF};\n\
         pub const SIGMA_QUANTILE: f64 = {k:?};\n\
         pub const SIGMA_LUT_SAMPLES: usize = {SAMPLES};\n\
         pub const UPPER_GAMMA_AT_QUANTILE: f64 = {:?};\n\
         pub const LOWER_GAMMA_AT_QUANTILE: f64 = {:?};",
        upper_incomplete_gamma(upper_a, k * k / 2.0),
        lower_incomplete_gamma(lower_a, k * k / 2.0),
    )?;

    let step = k / (SAMPLES as f64 - 1.0);
    let entries = (0..SAMPLES)
        .map(|i| {
            let t = i as f64 * step;
            let x = t * t / 2.0;
            format!(
                "({:?}, {:?}),",
                upper_incomplete_gamma(upper_a, x),
                lower_incomplete_gamma(lower_a, x)
            )
        })
        .collect::<Vec<_>>()
        .join("\n    ");
    writeln!(
        f,
        "pub static SIGMA_LUT: [(f64, f64); SIGMA_LUT_SAMPLES] = [\n    {entries}\n];"
    )?;

    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
