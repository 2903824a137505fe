//! Error taxonomy for the assembler. The VM itself never returns `Result`;
//! runtime failures are sticky flags on `Vm` (see `vm::ErrorState`).

use thiserror::Error;

/// Errors raised while tokenizing and classifying a single source line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("invalid character in token '{token}'")]
    InvalidChar { token: String },

    #[error("label '{0}' may not begin with a digit")]
    LabelStartsWithDigit(String),

    #[error("unknown mnemonic '{0}'")]
    UnknownMnemonic(String),

    #[error("parameter block '{0}' has more than three parameters")]
    TooManyParameters(String),

    #[error("unrecognized parameter '{0}'")]
    InvalidParameter(String),

    #[error("unexpected token '{0}' after parameter block")]
    TrailingTokens(String),
}

/// Errors raised by the two assembler passes or the emitter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssembleError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("label '{0}' already defined")]
    DuplicateLabel(String),

    #[error("undefined label '{0}'")]
    UndefinedLabel(String),

    #[error("no (mnemonic, shape) match for '{mnemonic}' with operands '{operands}'")]
    NoMatchingShape { mnemonic: String, operands: String },

    #[error("emit rejected for mnemonic '{0}': shape not encodable")]
    EmitRejected(String),

    #[error(
        "pass 2 advanced ROM by {actual} bytes but pass 1 simulated {expected} for this record"
    )]
    RwpMismatch { expected: usize, actual: usize },

    #[error("ROM overflow: cannot burn {len} bytes at RWP {rwp}, ROM is {capacity} bytes")]
    RomOverflow {
        rwp: usize,
        len: usize,
        capacity: usize,
    },
}
