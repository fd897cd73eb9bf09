use std::f64::consts::PI;

/// Magnitudes of the first `n / 2` bins of the real input's spectrum,
/// normalised by `n`. The input length must be a power of two.
pub(crate) fn real_magnitudes(input: &[f64]) -> Vec<f64> {
    let n = input.len();
    debug_assert!(n.is_power_of_two(), "fft length must be a power of two");
    if n < 2 {
        return Vec::new();
    }

    let mut re = input.to_vec();
    let mut im = vec![0.0; n];

    let shift = usize::BITS - n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> shift;
        if j > i {
            re.swap(i, j);
        }
    }

    let mut span = 2;
    while span <= n {
        let half = span / 2;
        let step = -2.0 * PI / span as f64;
        for start in (0..n).step_by(span) {
            for k in 0..half {
                let (sin, cos) = (step * k as f64).sin_cos();
                let a = start + k;
                let b = a + half;
                let tr = re[b] * cos - im[b] * sin;
                let ti = re[b] * sin + im[b] * cos;
                re[b] = re[a] - tr;
                im[b] = im[a] - ti;
                re[a] += tr;
                im[a] += ti;
            }
        }
        span <<= 1;
    }

    let scale = n as f64;
    (0..n / 2).map(|k| re[k].hypot(im[k]) / scale).collect()
}

/// Blackman window coefficients, matching the browser analyser node.
pub(crate) fn blackman(size: usize) -> Vec<f64> {
    let n = size as f64;
    (0..size)
        .map(|i| {
            let x = i as f64 / n;
            0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
        })
        .collect()
}
