//! `predict_shared`
//!
//! Shared libraries used by the predicting client and the authoritative world.
//!
//! Design goals:
//! - Deterministic where it matters: trajectory math is plain scalar `f32`.
//! - Clear separation of concerns (math, tuning, collision, snapshots, config).
//! - Traits at the collaborator seams (collision, effects) for injection.
//! - No `unsafe`.

pub mod collision;
pub mod config;
pub mod event;
pub mod ids;
pub mod log;
pub mod math;
pub mod snapshot;
pub mod tuning;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::collision::*;
    pub use crate::config::*;
    pub use crate::event::*;
    pub use crate::ids::*;
    pub use crate::log::*;
    pub use crate::math::*;
    pub use crate::snapshot::*;
    pub use crate::tuning::*;
}
