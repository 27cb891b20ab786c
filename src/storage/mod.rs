mod memory;
mod traits;

pub use memory::{
    MemoryBlockStore, MemoryLinkStore, MemoryMemberIndex, MemoryMembershipPoolStore,
    MemoryTrustedKeyStore,
};
pub use traits::{BlockStore, LinkStore, MemberIndex, MembershipPoolStore, TrustedKeyStore};
