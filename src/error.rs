use thiserror::Error;

use crate::metadata::ValueKind;

macro_rules! invariant_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::InternalInvariantViolation {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::InternalInvariantViolation {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant is terminal for the build that produced it. The builder never retries and
/// never hands out partially constructed IR: when `HirBuilder::build` fails, whatever it had
/// constructed so far is dropped together with the builder.
///
/// # Error Categories
///
/// ## Bailouts
/// - [`Error::UnsupportedConstruct`] - Legacy operations the builder refuses to translate
/// - [`Error::TypeMismatch`] - Kind disagreement at a join or a loop back edge
/// - [`Error::UnresolvedConstant`] - A constant pool entry that cannot be loaded as a value
/// - [`Error::InternalInvariantViolation`] - Decoder, block map and builder disagree
///
/// ## Collaborator Errors
/// - [`Error::Metadata`] - The metadata resolver could not answer a lookup
/// - [`Error::Assembly`] - Label or encoding problems while assembling a method body
///
/// # Examples
///
/// ```rust,ignore
/// use hirforge::{Error, hir::HirBuilder};
///
/// match HirBuilder::new(&code, &blocks, &resolver).build() {
///     Ok(graph) => println!("{graph}"),
///     Err(Error::UnsupportedConstruct { op, offset }) => {
///         eprintln!("cannot compile {op} at {offset}");
///     }
///     Err(Error::InternalInvariantViolation { message, file, line }) => {
///         eprintln!("bug: {message} ({file}:{line})");
///     }
///     Err(e) => eprintln!("bailout: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The method uses an operation that the builder does not translate.
    ///
    /// Raised for the retired subroutine operations (`jsr`, `jsr_w`, `ret`). These are
    /// recognized by the decoder but have no IR counterpart.
    #[error("Unsupported construct '{op}' at offset {offset}")]
    UnsupportedConstruct {
        /// Mnemonic of the rejected operation
        op: &'static str,
        /// Bytecode offset of the rejected operation
        offset: u32,
    },

    /// Two values that must share a kind do not.
    ///
    /// Raised when a stack slot disagrees in kind across predecessors, when a loop back
    /// edge changes or removes a value the loop header already fixed in a phi, or when an
    /// operation receives an operand of the wrong kind.
    #[error("Type mismatch at {location}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Kind fixed by the first definition
        expected: ValueKind,
        /// Kind that arrived later
        found: ValueKind,
        /// Human readable position, e.g. `B3 local 2`
        location: String,
    },

    /// A constant pool entry was requested as a value but is not a loadable constant.
    #[error("Constant pool entry {index} cannot be loaded as a value")]
    UnresolvedConstant {
        /// The constant pool index that was requested
        index: u16,
    },

    /// The builder detected an impossible state.
    ///
    /// This error indicates a disagreement between the decoded operations, the block map and
    /// the builder's own bookkeeping, e.g. a stack underflow, an unknown opcode or a jump
    /// into the middle of nowhere. The error includes the source location where the
    /// violation was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what went wrong
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Invariant violation - {file}:{line}: {message}")]
    InternalInvariantViolation {
        /// The message to be printed for the violation
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The metadata resolver failed to answer a lookup.
    #[error("Metadata - {0}")]
    Metadata(String),

    /// Assembling a method body failed (undefined label, duplicate label, bad operand).
    #[error("Assembly - {0}")]
    Assembly(String),
}

impl Error {
    /// Returns `true` if this error is a bailout of the build itself rather than a failure
    /// of one of its collaborators.
    #[must_use]
    pub fn is_bailout(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedConstruct { .. }
                | Error::TypeMismatch { .. }
                | Error::UnresolvedConstant { .. }
                | Error::InternalInvariantViolation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_error_carries_location() {
        let err = invariant_error!("stack underflow at {}", 7);
        match err {
            Error::InternalInvariantViolation {
                message,
                file,
                line,
            } => {
                assert_eq!(message, "stack underflow at 7");
                assert!(file.ends_with("error.rs"));
                assert!(line > 0);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_display_messages() {
        let err = Error::UnsupportedConstruct {
            op: "jsr",
            offset: 4,
        };
        assert_eq!(err.to_string(), "Unsupported construct 'jsr' at offset 4");

        let err = Error::TypeMismatch {
            expected: ValueKind::Int,
            found: ValueKind::Float,
            location: "B1 local 2".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Type mismatch at B1 local 2: expected int, found float"
        );
    }

    #[test]
    fn test_is_bailout() {
        assert!(Error::UnresolvedConstant { index: 3 }.is_bailout());
        assert!(!Error::Metadata("missing".into()).is_bailout());
        assert!(!Error::Assembly("label".into()).is_bailout());
    }
}
