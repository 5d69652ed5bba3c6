//! Reporting of allocator contract violations.
//!
//! Allocation failures are ordinary results (a null [`MemoryBlock`]). Misuse,
//! such as freeing a stack block out of order or asking for an alignment that
//! is not a power of two, is a contract violation instead. Allocators that can
//! detect misuse carry a [`FailureHandler`] which decides what happens next.
//!
//! [`MemoryBlock`]: crate::MemoryBlock

use crate::alloc::Error;
use std::{fmt, panic, process};

/// A detected contract violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    condition: &'static str,
    message: String,
    file: &'static str,
    line: u32,
}

impl Violation {
    pub fn new(condition: &'static str, message: String, file: &'static str, line: u32) -> Self {
        Violation {
            condition,
            message,
            file,
            line,
        }
    }

    /// The source text of the condition that did not hold.
    pub fn condition(&self) -> &'static str {
        self.condition
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}({})] contract violation ({}): {}",
            self.file, self.line, self.condition, self.message
        )
    }
}

/// What to do about a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Stop at the violation site by panicking with the violation text.
    Halt,
    /// Skip the offending operation and carry on. The allocator's state is
    /// left as it was before the call.
    Continue,
    /// Unwind with an [`Error::ContractViolation`] payload, which can be
    /// recovered with [`std::panic::catch_unwind`].
    Raise,
    /// Abort the process.
    Terminate,
}

/// Decides how a contract violation is handled.
pub trait FailureHandler {
    fn handle(&self, violation: &Violation) -> Response;
}

/// Logs the violation and halts.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHandler;

impl FailureHandler for DefaultHandler {
    fn handle(&self, violation: &Violation) -> Response {
        log::error!("{}", violation);
        Response::Halt
    }
}

/// Logs the violation and lets the program continue.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContinueHandler;

impl FailureHandler for ContinueHandler {
    fn handle(&self, violation: &Violation) -> Response {
        log::warn!("{}", violation);
        Response::Continue
    }
}

/// Turns every violation into a recoverable unwind.
#[derive(Debug, Default, Clone, Copy)]
pub struct RaiseHandler;

impl FailureHandler for RaiseHandler {
    fn handle(&self, _violation: &Violation) -> Response {
        Response::Raise
    }
}

impl FailureHandler for fn(&Violation) -> Response {
    fn handle(&self, violation: &Violation) -> Response {
        self(violation)
    }
}

impl<H: FailureHandler + ?Sized> FailureHandler for &H {
    fn handle(&self, violation: &Violation) -> Response {
        H::handle(self, violation)
    }
}

/// Hands `violation` to `handler` and carries out its decision.
///
/// Returns only when the handler asks to continue.
#[cold]
#[inline(never)]
pub fn report<H: FailureHandler + ?Sized>(handler: &H, violation: Violation) {
    match handler.handle(&violation) {
        Response::Continue => {}
        Response::Halt => panic!("{}", violation),
        Response::Raise => panic::panic_any(Error::ContractViolation { violation }),
        Response::Terminate => process::abort(),
    }
}

/// Reports the violation built by `violation` unless `held` is true.
/// Returns `held`.
#[inline]
pub fn check<H, F>(handler: &H, held: bool, violation: F) -> bool
where
    H: FailureHandler + ?Sized,
    F: FnOnce() -> Violation,
{
    if !held {
        report(handler, violation());
    }
    held
}

/// Checks a contract condition, reporting a violation through the handler
/// when it does not hold. Evaluates to whether the condition held.
macro_rules! contract {
    ($handler:expr, $cond:expr, $($msg:tt)+) => {
        $crate::contract::check(&$handler, $cond, || {
            $crate::contract::Violation::new(
                stringify!($cond),
                format!($($msg)+),
                file!(),
                line!(),
            )
        })
    };
}

#[cfg(test)]
mod test {
    use super::*;

    fn violation() -> Violation {
        Violation::new("a == b", "values differ".to_string(), "somewhere.rs", 7)
    }

    #[test]
    fn display() {
        assert_eq!(
            violation().to_string(),
            "[somewhere.rs(7)] contract violation (a == b): values differ"
        );
    }

    #[test]
    fn continue_returns() {
        report(&ContinueHandler, violation());
    }

    #[test]
    #[should_panic(expected = "values differ")]
    fn default_halts() {
        report(&DefaultHandler, violation());
    }

    #[test]
    fn raise_unwinds_with_error() {
        let payload = panic::catch_unwind(|| report(&RaiseHandler, violation())).unwrap_err();
        match payload.downcast::<Error>() {
            Ok(err) => match *err {
                Error::ContractViolation { violation: v } => assert_eq!(v, violation()),
                other => panic!("unexpected error {}", other),
            },
            Err(_) => panic!("unexpected panic payload"),
        }
    }

    #[test]
    fn function_handler() {
        fn decide(v: &Violation) -> Response {
            assert_eq!(v.line(), 7);
            Response::Continue
        }
        let handler: fn(&Violation) -> Response = decide;
        report(&handler, violation());
    }

    #[test]
    fn macro_reports_condition() {
        let held = contract!(ContinueHandler, 1 + 1 == 2, "math");
        assert!(held);
        let held = contract!(ContinueHandler, 1 + 1 == 3, "math is {}", "broken");
        assert!(!held);
    }
}
