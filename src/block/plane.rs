//! Byte-plane transform.
//!
//! [`forward`] regroups a byte sequence by index residue: for `planes = N`,
//! all bytes whose index is ≡ 0 (mod N) come first, then ≡ 1 (mod N), and so
//! on. Fixed-stride records that look random byte-by-byte often turn into
//! runs and arithmetic sequences once split this way — `"1200120112021203"`
//! becomes `"1111222200000123"` under a 4-plane split. [`inverse`] undoes the
//! permutation exactly, for any length: when the length is not a multiple of
//! `planes`, the leading planes are simply one byte longer than the rest.

/// Forward plane split: `output[k]` collects `input` bytes plane by plane.
///
/// Length is preserved; [`inverse`] restores the original order.
///
/// # Panics
///
/// Panics if `planes < 2` or the slice lengths differ. Both are internal
/// contract violations, not data-dependent conditions.
pub fn forward(input: &[u8], output: &mut [u8], planes: usize) {
    assert!(planes >= 2, "plane split needs at least 2 planes");
    assert_eq!(input.len(), output.len());

    let mut o = 0;
    for plane in 0..planes {
        let mut i = plane;
        while i < input.len() {
            output[o] = input[i];
            o += 1;
            i += planes;
        }
    }
    debug_assert_eq!(o, output.len());
}

/// Inverse plane split: scatters the planed `input` back to original order.
///
/// # Panics
///
/// Panics if `planes < 2` or the slice lengths differ.
pub fn inverse(input: &[u8], output: &mut [u8], planes: usize) {
    assert!(planes >= 2, "plane merge needs at least 2 planes");
    assert_eq!(input.len(), output.len());

    let mut o = 0;
    for plane in 0..planes {
        let mut i = plane;
        while i < output.len() {
            output[i] = input[o];
            o += 1;
            i += planes;
        }
    }
    debug_assert_eq!(o, input.len());
}
