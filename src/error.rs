use thiserror::Error;

/// Why an allocation request could not be served.
///
/// Every failure leaves the heap exactly as it was before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
  #[error("zero-sized allocation request")]
  ZeroSize,

  #[error("allocation size overflows usize")]
  Overflow,

  #[error("break could not be extended by {requested} bytes")]
  Exhausted { requested: usize },
}

pub type Result<T> = std::result::Result<T, AllocError>;
