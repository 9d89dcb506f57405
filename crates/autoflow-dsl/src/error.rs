use thiserror::Error;

/// A signature string that cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
  #[error("signature '{signature}' has no '->' separating inputs from outputs")]
  MissingArrow { signature: String },

  #[error("signature '{signature}' has an unterminated quote")]
  UnterminatedQuote { signature: String },

  #[error("signature '{signature}' has an empty name")]
  EmptyName { signature: String },

  #[error("signature '{signature}' returns more than one value")]
  MultipleReturns { signature: String },

  #[error("signature '{signature}' mixes callback and returns styles")]
  ConflictingStyles { signature: String },
}
