//! Error policy
//!
//! Firmware often treats every configuration error as fatal. [`Policy`]
//! makes that a choice instead of a habit.

use crate::Result;

/// What to do with a failed build, link or start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// Log the error, then panic
    ///
    /// Pair this with a panic handler that signals the failure, like
    /// blinking an LED.
    FailFast,
    /// Hand the error back to the caller
    #[default]
    Propagate,
}

impl Policy {
    /// Apply the policy to `result`
    ///
    /// ```
    /// use stm32_lpbam::{Error, Policy};
    ///
    /// let result: Result<(), _> = Err(Error::PoolExhausted);
    /// assert_eq!(Policy::Propagate.check(result), Err(Error::PoolExhausted));
    /// ```
    ///
    /// # Panics
    ///
    /// Panics on an error under [`Policy::FailFast`].
    #[track_caller]
    pub fn check<T>(self, result: Result<T>) -> Result<T> {
        match (self, result) {
            (Policy::FailFast, Err(error)) => {
                log::error!("LPBAM failure: {}", error);
                panic!("LPBAM failure: {}", error);
            }
            (_, result) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Policy;
    use crate::Error;

    #[test]
    fn propagate_passes_through() {
        assert_eq!(Policy::Propagate.check(Ok(7)), Ok(7));
        assert_eq!(
            Policy::Propagate.check::<()>(Err(Error::EmptyQueue)),
            Err(Error::EmptyQueue)
        );
        assert_eq!(Policy::FailFast.check(Ok(())), Ok(()));
    }

    #[test]
    #[should_panic(expected = "node pool exhausted")]
    fn fail_fast_panics() {
        let _ = Policy::FailFast.check::<()>(Err(Error::PoolExhausted));
    }
}
