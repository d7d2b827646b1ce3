use thiserror::Error;

/// TupleRange represents a closed-closed range [a, b].
///
/// It ensures that the first element is always less than or equal to the second,
/// so an inverted range fails at construction instead of silently matching nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TupleRange<T: Copy + PartialOrd>(T, T);

#[derive(Error, Debug)]
pub enum TupleRangeError<T: Copy + PartialOrd + std::fmt::Debug> {
    #[error(
        "Expected the first element to be less than or equal to the second, got ({0:?}, {1:?})"
    )]
    ExpectedOrderedRange(T, T),
}

impl<T: Copy + PartialOrd + std::fmt::Debug> TupleRange<T> {
    pub fn try_new(left: T, right: T) -> Result<Self, TupleRangeError<T>> {
        // NaN bounds fail here too, `left <= right` is false for them.
        if left <= right {
            Ok(Self(left, right))
        } else {
            Err(TupleRangeError::ExpectedOrderedRange(left, right))
        }
    }

    pub fn contains(&self, x: T) -> bool {
        self.0 <= x && x <= self.1
    }

    pub fn start(&self) -> T {
        self.0
    }

    pub fn end(&self) -> T {
        self.1
    }
}

/// A value that can either be restricted to a specific value or be unrestricted.
///
/// Same as `Option<T>` but with different semantics, since `None` could mean
/// either "no restriction" or "nothing allowed".
#[derive(Debug, Clone, Copy)]
pub enum OptionallyRestricted<T: Copy> {
    Restricted(T),
    Unrestricted,
}

/// Median of the finite values in the slice.
///
/// Reorders the slice. Returns `None` when there is no finite value.
///
/// ```
/// use flashlfq::utils::median;
///
/// let mut vals = vec![3.0, 1.0, f64::NAN, 2.0, 10.0];
/// assert_eq!(median(&mut vals), Some(2.5));
/// assert_eq!(median(&mut Vec::<f64>::new()), None);
/// ```
pub fn median(values: &mut [f64]) -> Option<f64> {
    let mut n = 0;
    for i in 0..values.len() {
        if values[i].is_finite() {
            values.swap(n, i);
            n += 1;
        }
    }
    let finite = &mut values[..n];
    if finite.is_empty() {
        return None;
    }
    finite.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = finite.len() / 2;
    if finite.len() % 2 == 0 {
        Some((finite[mid - 1] + finite[mid]) / 2.0)
    } else {
        Some(finite[mid])
    }
}

/// Median absolute deviation around a given center.
pub fn median_absolute_deviation(values: &[f64], center: f64) -> Option<f64> {
    let mut deviations: Vec<f64> = values.iter().map(|x| (x - center).abs()).collect();
    median(&mut deviations)
}

/// Mass of a proton in daltons.
pub const PROTON_MASS: f64 = 1.007_276_466_812;

pub fn mass_to_mz(mass: f64, charge: i32) -> f64 {
    let z = charge as f64;
    (mass + z * PROTON_MASS) / z.abs()
}

pub fn ppm_error(experimental: f64, theoretical: f64) -> f64 {
    (experimental - theoretical) / theoretical * 1e6
}
