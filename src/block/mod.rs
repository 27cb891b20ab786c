mod applier;
mod builder;
mod validator;

pub use applier::BlockApplier;
pub use builder::{identity_filter, BlockBuilder, NewcomerFilter};
pub use validator::{BlockValidation, BlockValidator};
