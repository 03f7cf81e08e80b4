//! Remove host compiler flags that `nvcc` cannot accept.

use crate::environment::Value;

/// Flags from the C compiler configuration that break `nvcc`.
pub const BAD_FLAGS: &[&str] = &["-malign-double"];

/// Filter a list of flags, keeping their order.
#[must_use]
pub fn strip_flag_list<S: AsRef<str>>(flags: &[S]) -> Vec<String> {
    flags
        .iter()
        .map(AsRef::as_ref)
        .filter(|flag| !BAD_FLAGS.contains(flag))
        .map(str::to_string)
        .collect()
}

/// Filter the `CCFLAGS` value of an environment.
///
/// A list is the usual form. A single string is accepted for older configurations
/// and is split into arguments before filtering.
#[must_use]
pub fn strip_flags(flags: &Value) -> Vec<String> {
    strip_flag_list(&flags.to_args())
}
