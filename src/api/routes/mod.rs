//! Route handlers for the control API

mod control;
mod system;

pub use control::{ControlRequest, control, status};
pub use system::health_check;
