use std::path::PathBuf;
use thiserror::Error;

/// A malformed object-serialization stream
///
/// Always names the opcode being executed and the byte offset it started at.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} (opcode {opcode} at offset {offset})")]
pub struct FormatError {
    pub offset: usize,
    pub opcode: &'static str,
    pub kind: FormatErrorKind,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatErrorKind {
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    #[error("unsupported opcode: {0}")]
    Unsupported(&'static str),

    #[error("stack underflow")]
    StackUnderflow,

    #[error("no mark on the stack")]
    MissingMark,

    #[error("truncated stream: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("memo id {0} is not defined")]
    UndefinedMemo(u64),

    #[error("invalid operand: {0}")]
    InvalidOperand(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("unhashable key of type {0}")]
    UnhashableKey(&'static str),

    #[error("stream stopped with {depth} values and {marks} open marks on the stack")]
    TerminalStack { depth: usize, marks: usize },
}

/// The decoded graph lacks what the sphere report needs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReportError {
    #[error("decoded data has no '{0}' section")]
    MissingSection(&'static str),

    #[error("section '{section}' is malformed: {detail}")]
    InvalidSection {
        section: &'static str,
        detail: String,
    },
}

/// Failure of one stage of the archive pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("file is empty: {}", .0.display())]
    EmptyInput(PathBuf),

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("decompression failed ({inflate}); reading the input as an uncompressed stream also failed: {fallback}")]
    Decompression {
        inflate: std::io::Error,
        fallback: FormatError,
    },

    #[error("decoding failed: {0}")]
    Format(#[from] FormatError),

    #[error("report generation failed: {0}")]
    Report(#[from] ReportError),
}

impl PipelineError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::FileNotFound(_) => 2,
            PipelineError::EmptyInput(_) => 3,
            PipelineError::Decompression { .. } => 4,
            PipelineError::Format(_) => 5,
            PipelineError::Report(_) => 6,
            PipelineError::Io { .. } => 7,
        }
    }

    /// Short name of the pipeline stage that failed
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::FileNotFound(_) | PipelineError::EmptyInput(_) | PipelineError::Io { .. } => {
                "read"
            }
            PipelineError::Decompression { .. } => "decompress",
            PipelineError::Format(_) => "decode",
            PipelineError::Report(_) => "report",
        }
    }
}
