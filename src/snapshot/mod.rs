//! Durable, flat snapshots of a live run and the conversions between the
//! two representations. Pure data, no I/O.

mod action;
mod info;
mod matrix;
mod step;

pub use action::{ActionSnapshot, ResultSnapshot};
pub use info::{RunInfo, RunObjects, RunSnapshot};
pub use matrix::MatrixSnapshot;
pub use step::StepSnapshot;
