use metrics_model::Observation;
use std::convert::Infallible;

/// Destination for derived observations.
///
/// Errors are returned to the caller of the aggregation unchanged; the first
/// failure stops emission.
pub trait ObservationSink {
    type Error;

    fn store_observation(&mut self, observation: Observation) -> Result<(), Self::Error>;
}

/// Collects observations in memory.
impl ObservationSink for Vec<Observation> {
    type Error = Infallible;

    fn store_observation(&mut self, observation: Observation) -> Result<(), Self::Error> {
        self.push(observation);
        Ok(())
    }
}

impl<S: ObservationSink + ?Sized> ObservationSink for &mut S {
    type Error = S::Error;

    fn store_observation(&mut self, observation: Observation) -> Result<(), Self::Error> {
        (**self).store_observation(observation)
    }
}
