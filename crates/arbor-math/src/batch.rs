//! Element-wise spatial operations over slices of independent instances.
//!
//! Every helper pairs its inputs index by index and fails with
//! [`MathError::ShapeMismatch`] when the slices differ in length.

use crate::{DMat, DVec, MathError, Result, SpatialTransform, SpatialVec};

/// Ok when `actual == expected`.
#[inline]
pub fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(MathError::ShapeMismatch { expected, actual })
    }
}

/// `a[i] ∘ b[i]` for every instance.
pub fn compose_all(
    a: &[SpatialTransform],
    b: &[SpatialTransform],
) -> Result<Vec<SpatialTransform>> {
    check_len(a.len(), b.len())?;
    Ok(a.iter().zip(b).map(|(x, y)| x.compose(y)).collect())
}

/// Inverse of every transform.
pub fn inverse_all(x: &[SpatialTransform]) -> Vec<SpatialTransform> {
    x.iter().map(SpatialTransform::inverse).collect()
}

/// `x[i]` applied to motion vector `v[i]`.
pub fn apply_motion_all(x: &[SpatialTransform], v: &[SpatialVec]) -> Result<Vec<SpatialVec>> {
    check_len(x.len(), v.len())?;
    Ok(x.iter().zip(v).map(|(x, v)| x.apply_motion(v)).collect())
}

/// `x[i]` applied to force vector `f[i]`.
pub fn apply_force_all(x: &[SpatialTransform], f: &[SpatialVec]) -> Result<Vec<SpatialVec>> {
    check_len(x.len(), f.len())?;
    Ok(x.iter().zip(f).map(|(x, f)| x.apply_force(f)).collect())
}

/// Stack per-instance vectors into a `[batch, n]` matrix.
///
/// An empty batch yields a `0 × n` matrix with `n = 0`.
pub fn stack_rows(rows: &[DVec]) -> Result<DMat> {
    let n = rows.first().map_or(0, |r| r.len());
    for r in rows {
        check_len(n, r.len())?;
    }
    Ok(DMat::from_fn(rows.len(), n, |i, j| rows[i][j]))
}

/// Split a `[batch, n]` matrix into per-instance vectors, checking the
/// batch dimension.
pub fn split_rows(m: &DMat, batch: usize) -> Result<Vec<DVec>> {
    check_len(batch, m.nrows())?;
    Ok(m.row_iter().map(|r| r.transpose()).collect())
}
