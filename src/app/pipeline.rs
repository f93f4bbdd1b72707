//! Shared calculation pipeline used by the HTTP endpoint, the CLI and the
//! in-process scheduler boundary.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! raw input -> request list -> per-metric API calls (parallel) -> aggregate result

use rayon::prelude::*;

use crate::data::GrowthApi;
use crate::domain::{AggregateResult, CentileValues, MeasurementOutcome, MeasurementRequest, Metric, RawInput};
use crate::error::CentileError;
use crate::request::RequestBuilder;

/// Anything that can run a full calculation cycle.
pub trait CentileCalculator: Send + Sync {
    /// Builder-stage failures abort the cycle; API failures are per metric.
    fn calculate(&self, input: &RawInput) -> Result<AggregateResult, CentileError>;
}

pub struct CentileOrchestrator<A> {
    builder: RequestBuilder,
    api: A,
}

impl<A: GrowthApi> CentileOrchestrator<A> {
    pub fn new(builder: RequestBuilder, api: A) -> Self {
        Self { builder, api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    fn dispatch(&self, request: &MeasurementRequest) -> (Metric, MeasurementOutcome) {
        tracing::debug!(
            metric = %request.metric,
            method = %request.measurement_method,
            value = request.value,
            "dispatching growth calculation"
        );
        let outcome = match self.api.send(request) {
            Ok(payload) => MeasurementOutcome::Calculated(CentileValues::from(payload)),
            Err(e) => {
                tracing::warn!(metric = %request.metric, error = %e, "growth calculation failed");
                MeasurementOutcome::Failed { error: e.to_string() }
            }
        };
        (request.metric, outcome)
    }
}

impl<A: GrowthApi> CentileCalculator for CentileOrchestrator<A> {
    fn calculate(&self, input: &RawInput) -> Result<AggregateResult, CentileError> {
        let requests = self.builder.build(input)?;

        // Metrics are independent: one failing call never blocks the others.
        let outcomes: Vec<(Metric, MeasurementOutcome)> =
            requests.par_iter().map(|r| self.dispatch(r)).collect();
        let result: AggregateResult = outcomes.into_iter().collect();

        tracing::info!(
            metrics = result.len(),
            failed = result.iter().filter(|(_, o)| o.error().is_some()).count(),
            "calculation cycle complete"
        );
        Ok(result)
    }
}
