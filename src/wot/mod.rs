mod distancing;
mod graph;
mod merkle;
mod udid2;

pub use distancing::{recompute_kicks, retain_current_links};
pub use graph::{ExtraLinks, WotGraph};
pub use merkle::members_root;
pub use udid2::is_valid_udid2;
