pub mod oracle;
pub mod sequoia_oracle;

pub use oracle::{CryptoError, DecomposedKey, KeyOracle};
pub use sequoia_oracle::SequoiaKeyOracle;
