//! General purpose macros for diagnostic output.
//!
//! Generalized from a console-output macro set: same shape (an optional
//! context tag as the first argument), writing to `stdout`/`stderr` instead
//! of a framebuffer.

/// Prints a standard information message.
///
/// You can specify a 'context' as the first argument when calling the
/// macro, which will be inserted at the beginning of the message.
///
/// # Examples
///
/// ```
/// use sfs::info;
///
/// info!("mount", "filesystem mounted fresh");
/// ```
#[macro_export]
macro_rules! info {
    ($ctx: literal, $($arg: tt)*) => {
        println!("[info] {} : {}", $ctx, format_args!($($arg)*))
    };
    ($($arg: tt)*) => {
        println!("[info] {}", format_args!($($arg)*))
    };
}

/// Prints a standard warning message.
///
/// # Examples
///
/// ```
/// use sfs::warn;
///
/// warn!("allocator", "bitmap nearly full");
/// ```
#[macro_export]
macro_rules! warn {
    ($ctx: literal, $($arg: tt)*) => {
        eprintln!("[warn] {} : {}", $ctx, format_args!($($arg)*))
    };
    ($($arg: tt)*) => {
        eprintln!("[warn] {}", format_args!($($arg)*))
    };
}

/// Prints a standard error message.
///
/// Used sparingly, and only for the catastrophic cases worth a diagnostic
/// print: allocator exhaustion and disk-layer failures that leave
/// in-memory and on-disk state potentially diverged.
///
/// # Examples
///
/// ```
/// use sfs::error;
///
/// error!("alloc", "no free block available, write short-returning");
/// ```
#[macro_export]
macro_rules! error {
    ($ctx: literal, $($arg: tt)*) => {
        eprintln!("[error] {} : {}", $ctx, format_args!($($arg)*))
    };
    ($($arg: tt)*) => {
        eprintln!("[error] {}", format_args!($($arg)*))
    };
}
