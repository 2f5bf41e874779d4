//! Time representation and unit conversion.
//!
//! All scheduling arithmetic runs on whole seconds ([`Time`]) so that
//! precedence, headway and clearance comparisons are exact. Quantities that
//! cross the crate boundary in other units (predicted delays in minutes,
//! KPI averages) are converted here through `qtty`, which checks at compile
//! time that both sides share the time dimension.

use qtty::{Minute, Quantity, Second, Unit};

/// A point in time or a duration, in whole seconds.
pub type Time = i64;

/// Marker trait for units that share the same physical dimension.
///
/// Implemented for every pair of units where `From::Dim == To::Dim`, so a
/// conversion between, say, minutes and metres fails to compile.
pub trait SameDim<To: Unit>: Unit<Dim = To::Dim> {}

impl<From, To> SameDim<To> for From
where
    From: Unit,
    To: Unit<Dim = From::Dim>,
{
}

/// Converts a time quantity of any unit to whole seconds, rounding to the
/// nearest second.
///
/// ```
/// use qtty::{Minute, Quantity};
/// use railsched::units::to_time;
///
/// assert_eq!(to_time(Quantity::<Minute>::new(1.5)), 90);
/// ```
pub fn to_time<U>(q: Quantity<U>) -> Time
where
    U: SameDim<Second>,
{
    q.to::<Second>().value().round() as Time
}

/// Converts a delay expressed in minutes to whole seconds.
pub fn minutes_to_time(minutes: f64) -> Time {
    to_time(Quantity::<Minute>::new(minutes))
}

/// Expresses a number of seconds as a minute quantity.
pub fn time_to_minutes(seconds: f64) -> Quantity<Minute> {
    Quantity::<Second>::new(seconds).to::<Minute>()
}
