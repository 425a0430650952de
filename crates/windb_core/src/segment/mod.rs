//! Time segments and their lifecycle.
//!
//! Time is cut into fixed-width segments; each segment is one physical
//! engine in its own directory. [`SegmentRing`] bounds how many segments
//! are open at once and destroys those that fall out of retention.

mod naming;
mod ring;
mod store;

pub use naming::SegmentNamer;
pub use ring::{RecoveryStats, SegmentRing};
pub use store::Segment;
