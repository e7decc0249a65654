//! Fail-fast contract checks
//!
//! A contract violation (foreign snapshot, cursor outside the owning buffer,
//! oversized pool request) means allocator state can no longer be trusted.
//! These macros log the violation and panic with the call site and the
//! violated condition. Release builds use `panic = "abort"`, so the process
//! terminates.

/// Report a contract violation and panic.
///
/// ```should_panic
/// sl_memory::contract_violation!("cursor {} past end {}", 80, 64);
/// ```
#[macro_export]
macro_rules! contract_violation {
    ($($arg:tt)+) => {
        $crate::macros::report_violation(
            ::core::file!(),
            ::core::line!(),
            ::core::format_args!($($arg)+),
        )
    };
}

/// Check a contract condition, panicking through [`contract_violation!`] when
/// it does not hold.
#[macro_export]
macro_rules! ensure_contract {
    ($cond:expr, $($arg:tt)+) => {
        if !($cond) {
            $crate::contract_violation!(
                "`{}` failed: {}",
                ::core::stringify!($cond),
                ::core::format_args!($($arg)+)
            );
        }
    };
}

/// [`ensure_contract!`] for hot-path checks, compiled out without
/// `debug_assertions`.
#[macro_export]
macro_rules! debug_ensure_contract {
    ($cond:expr, $($arg:tt)+) => {
        if ::core::cfg!(debug_assertions) {
            $crate::ensure_contract!($cond, $($arg)+);
        }
    };
}

#[doc(hidden)]
#[cold]
#[inline(never)]
pub fn report_violation(file: &'static str, line: u32, message: core::fmt::Arguments<'_>) -> ! {
    #[cfg(feature = "logging")]
    sl_log::error!(file, line, "contract violation: {message}");

    panic!("contract violation at {file}:{line}: {message}")
}
