//! Utility macros used across the crate.

/// Returns early with an error if a condition is not met.
///
/// This is the `Result` counterpart of `assert!`: validation code reads as a list of
/// preconditions instead of nested `if` blocks.
///
/// # Arguments
///
/// * `$predicate` - A boolean expression that should evaluate to true
/// * `$error` - The error value to return if the predicate is false
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
