use serde::{Deserialize, Serialize};

/// Guard added to the L2 norm before dividing, so a zero vector stays zero.
pub const NORM_EPSILON: f32 = 1e-8;

/// A dense embedding vector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    #[inline]
    #[must_use]
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Vec<f32> {
        self.data
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

/// Row normalization shared by index rows and query vectors.
#[inline]
pub fn normalize_in_place(data: &mut [f32]) {
    let inv_norm = 1.0 / (crate::simd::norm_simd(data) + NORM_EPSILON);
    for x in data.iter_mut() {
        *x *= inv_norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize_in_place(&mut v);
        assert!((crate::simd::norm_simd(&v) - 1.0).abs() < 1e-5);
        assert!((v[0] - 0.6).abs() < 1e-5);
    }

    #[test]
    fn test_normalize_zero_vector_stays_zero() {
        let mut v = vec![0.0, 0.0, 0.0];
        normalize_in_place(&mut v);
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
