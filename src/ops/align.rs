//! Optimal rigid superposition of coordinate sets.
//!
//! Conformer comparison needs the root-mean-square deviation after removing translation and
//! rotation. The Kabsch solution here builds the cross-covariance of the centred point sets,
//! decomposes it with `nalgebra`'s SVD, and corrects improper rotations so that a reflection
//! is never reported as a match.

use crate::model::Error;
use crate::model::types::Point;
use nalgebra::{Matrix3, Rotation3, Vector3};

/// Rigid transform mapping a mobile point set onto a target point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Superposition {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl Superposition {
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Applies the transform to a single point.
    pub fn apply(&self, point: &Point) -> Point {
        Point::from(self.rotation * point.coords + self.translation)
    }
}

/// Computes the rotation and translation that best superimpose `mobile` onto `target`.
///
/// # Arguments
///
/// * `mobile` - Points to be moved.
/// * `target` - Reference points, paired index-by-index with `mobile`.
///
/// # Returns
///
/// The least-squares optimal proper rigid transform.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] when the sets differ in length and [`Error::Alignment`]
/// when the decomposition does not yield singular vectors.
pub fn superpose(mobile: &[Point], target: &[Point]) -> Result<Superposition, Error> {
    if mobile.len() != target.len() {
        return Err(Error::shape_mismatch(target.len(), mobile.len()));
    }
    let n = mobile.len();
    if n == 0 {
        return Ok(Superposition::identity());
    }

    let center_mobile = centroid(mobile);
    let center_target = centroid(target);

    if n == 1 {
        return Ok(Superposition {
            rotation: Matrix3::identity(),
            translation: center_target - center_mobile,
        });
    }

    if n == 2 {
        let v_mobile = mobile[1] - mobile[0];
        let v_target = target[1] - target[0];
        let rotation = Rotation3::rotation_between(&v_mobile, &v_target)
            .unwrap_or_else(Rotation3::identity)
            .into_inner();
        return Ok(Superposition {
            rotation,
            translation: center_target - rotation * center_mobile,
        });
    }

    let mut cov = Matrix3::zeros();
    for (p_mobile, p_target) in mobile.iter().zip(target) {
        cov += (p_target.coords - center_target) * (p_mobile.coords - center_mobile).transpose();
    }

    let svd = cov.svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| Error::alignment("SVD did not produce U"))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| Error::alignment("SVD did not produce V^T"))?;

    let mut rotation = u * v_t;
    if rotation.determinant() < 0.0 {
        let mut correction = Matrix3::identity();
        correction[(2, 2)] = -1.0;
        rotation = u * correction * v_t;
    }

    Ok(Superposition {
        rotation,
        translation: center_target - rotation * center_mobile,
    })
}

/// Root-mean-square deviation between paired points without any alignment.
pub fn rmsd_in_place(a: &[Point], b: &[Point]) -> Result<f64, Error> {
    if a.len() != b.len() {
        return Err(Error::shape_mismatch(a.len(), b.len()));
    }
    if a.is_empty() {
        return Ok(0.0);
    }
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(p, q)| nalgebra::distance_squared(p, q))
        .sum();
    Ok((sum / a.len() as f64).sqrt())
}

/// Root-mean-square deviation after optimal rigid superposition of `mobile` onto `target`.
pub fn rmsd(mobile: &[Point], target: &[Point]) -> Result<f64, Error> {
    let fit = superpose(mobile, target)?;
    let moved: Vec<Point> = mobile.iter().map(|p| fit.apply(p)).collect();
    rmsd_in_place(&moved, target)
}

pub(crate) fn centroid(points: &[Point]) -> Vector3<f64> {
    if points.is_empty() {
        return Vector3::zeros();
    }
    points.iter().map(|p| p.coords).sum::<Vector3<f64>>() / points.len() as f64
}
