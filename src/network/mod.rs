//! Network and request model: sections, train requests and the validated
//! [`Instance`] built from them.

mod error;
mod instance;
mod section;
mod topology;
mod train;
mod window;

pub use error::InputError;
pub use instance::{Fixed, FixedObligation, Instance, Leg, LegRef, TrainPlan};
pub use section::Section;
pub use topology::{Clearance, ClearanceSource, Network};
pub use train::TrainRequest;
pub use window::{BlockPolicy, BlockWindows, TimeWindow};
