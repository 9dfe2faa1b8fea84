//! Assertions that fail a scenario with `HarnessError::Assertion` instead of panicking

use crate::error::{HarnessError, HarnessResult};

/// Return an assertion error unless the condition holds
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::HarnessError::Assertion(format!($($arg)+)));
        }
    };
    ($cond:expr $(,)?) => {
        $crate::ensure!($cond, "{}", stringify!($cond))
    };
}

/// Return an assertion error unless both sides are equal
#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr $(,)?) => {
        match (&$left, &$right) {
            (left, right) => {
                if !(*left == *right) {
                    return Err($crate::error::HarnessError::Assertion(format!(
                        "{} != {}\n  left: {:?}\n right: {:?}",
                        stringify!($left),
                        stringify!($right),
                        left,
                        right
                    )));
                }
            }
        }
    };
}

/// Return an assertion error unless `haystack` contains `needle`
#[macro_export]
macro_rules! ensure_contains {
    ($haystack:expr, $needle:expr $(,)?) => {
        match (&$haystack, &$needle) {
            (haystack, needle) => {
                if !haystack.contains(*needle) {
                    return Err($crate::error::HarnessError::Assertion(format!(
                        "{:?} does not contain {:?}",
                        haystack, needle
                    )));
                }
            }
        }
    };
}

/// Collects the outcome of named sub-steps so later steps still run after a failure
#[derive(Debug, Default)]
pub struct Subtests {
    failures: Vec<(String, HarnessError)>,
}

impl Subtests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: &str, result: HarnessResult<()>) {
        match result {
            Ok(()) => tracing::debug!("Subtest '{}' passed", name),
            Err(e) => {
                tracing::warn!("Subtest '{}' failed: {}", name, e);
                self.failures.push((name.to_string(), e));
            }
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// A single failure is returned as is; several are folded into one assertion error
    pub fn finish(mut self) -> HarnessResult<()> {
        match self.failures.len() {
            0 => Ok(()),
            1 => {
                let (name, error) = self.failures.remove(0);
                Err(error.context(&name))
            }
            _ => Err(HarnessError::Assertion(
                self.failures
                    .iter()
                    .map(|(name, e)| format!("[{}] {}", name, e))
                    .collect::<Vec<_>>()
                    .join("\n"),
            )),
        }
    }
}
