mod pool;

pub use pool::MembershipPool;
