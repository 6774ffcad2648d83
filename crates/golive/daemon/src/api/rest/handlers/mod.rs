//! API request handlers

mod audit;
mod capabilities;
mod health;
mod plans;
mod readiness;
mod simulation;

pub use audit::*;
pub use capabilities::*;
pub use health::*;
pub use plans::*;
pub use readiness::*;
pub use simulation::*;

/// Actor recorded when a request does not name one.
pub(crate) fn default_actor() -> String {
    "api".to_string()
}
