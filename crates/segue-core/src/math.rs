//! Small numeric helpers shared by the DSP code.

/// Flushes values below 1e-20 to zero.
///
/// Recursive filters decaying toward silence otherwise drift into subnormal
/// floats, which are very slow on most CPUs.
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flushes_tiny_values() {
        assert_eq!(flush_denormal(1e-25), 0.0);
        assert_eq!(flush_denormal(-1e-30), 0.0);
        assert_eq!(flush_denormal(0.5), 0.5);
    }
}
