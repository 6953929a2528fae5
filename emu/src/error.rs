use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    #[error("no device mapped at {0:#x}")]
    Unmapped(u64),

    #[error("region {base:#x}..{end:#x} overlaps an existing mapping")]
    Overlap { base: u64, end: u64 },

    #[error("region at {base:#x} with length {len:#x} wraps the address space")]
    Wraps { base: u64, len: u64 },

    #[error("region at {0:#x} is empty")]
    EmptyRegion(u64),
}
