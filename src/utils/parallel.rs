//! Parallel iteration that degrades to plain iterators.
//!
//! With the `parallel` feature (on by default) the names below are Rayon's. Without it they
//! are aliases and blanket shims over `std::iter`, so call sites such as
//! `items.par_iter().map(..).collect()` compile unchanged and run serially. Only the subset
//! the crate uses is exported.

#[cfg(feature = "parallel")]
pub use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

#[cfg(not(feature = "parallel"))]
pub use self::serial::*;

#[cfg(not(feature = "parallel"))]
mod serial {
    pub use std::iter::Iterator as ParallelIterator;

    /// Provides `par_iter()` for anything iterable by shared reference.
    pub trait IntoParallelRefIterator<'data> {
        type Item;
        type Iter: Iterator<Item = Self::Item>;
        fn par_iter(&'data self) -> Self::Iter;
    }

    impl<'data, I: 'data + ?Sized> IntoParallelRefIterator<'data> for I
    where
        &'data I: IntoIterator,
    {
        type Item = <&'data I as IntoIterator>::Item;
        type Iter = <&'data I as IntoIterator>::IntoIter;
        fn par_iter(&'data self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn par_iter_preserves_order() {
        let values = vec![3, 1, 4, 1, 5, 9, 2, 6];
        let doubled: Vec<i32> = values.par_iter().map(|v| v * 2).collect();
        assert_eq!(doubled, vec![6, 2, 8, 2, 10, 18, 4, 12]);
    }

    #[test]
    fn fallible_collect_stops_at_error() {
        let values = vec![1, 2, -3, 4];
        let checked: Result<Vec<i32>, String> = values
            .par_iter()
            .map(|&v| if v < 0 { Err(format!("negative {}", v)) } else { Ok(v) })
            .collect();
        assert_eq!(checked.unwrap_err(), "negative -3");
    }
}
