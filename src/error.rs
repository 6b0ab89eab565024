use thiserror::Error;

pub type C8Result<T> = Result<T, C8Error>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum C8Error {
    #[error("stack overflow: call at {pc:#06x} exceeds the call depth")]
    StackOverflow { pc: u16 },

    #[error("stack underflow: return at {pc:#06x} with an empty call stack")]
    StackUnderflow { pc: u16 },

    #[error("ROM size {size:#x} exceeds available memory space ({max:#x} bytes)")]
    RomTooLarge { size: usize, max: usize },

    #[error("{context}\nerror:\n{detail}")]
    Host { context: String, detail: String },
}
