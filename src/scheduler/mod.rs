//! Reactive recomputation of centile fields on a data-entry form.
//!
//! One `FieldScheduler` is attached per rendered form instance. It is driven
//! entirely by the host and never reads the clock itself:
//!
//! - field events go in through `handle_event`
//! - timers fire through `poll`, which may hand back a `Dispatch`
//! - the remote response comes back through `complete`
//!
//! ```text
//! Idle -> Pending -> InFlight -> (Applied | Failed) -> Idle
//! ```
//!
//! Only one cycle is in flight at a time. Edits that arrive while a cycle is
//! in flight are coalesced into a single follow-up cycle. Every dispatch
//! carries a sequence stamp, and a response whose stamp is not the current
//! in-flight cycle is discarded without touching the form.

use std::time::{Duration, Instant};

use crate::config::TargetInstruments;
use crate::domain::{AggregateResult, CalculationResponse, FormatHint, MeasurementOutcome, Metric, NumericField, RawInput};
use crate::error::ApiError;
use crate::report::{centile_summary, field_value, round_centile, round_sds};

pub mod bindings;
pub mod form;
pub mod remote;

pub use bindings::*;
pub use form::*;
pub use remote::*;

/// Quiescence required after the last edit before a cycle starts.
pub const DEBOUNCE: Duration = Duration::from_secs(1);
/// Delay before the automatic pass on form load.
pub const INITIAL_DELAY: Duration = Duration::from_millis(500);
/// A cycle still in flight after this long is treated as failed.
pub const IN_FLIGHT_TIMEOUT: Duration = Duration::from_secs(35);

const WATCHED_ROLES: [FieldRole; 3] = [FieldRole::Weight, FieldRole::Height, FieldRole::MeasurementDate];

const RESULT_FIELDS: [(Metric, FieldRole, FieldRole); 3] = [
    (Metric::Weight, FieldRole::WeightCentile, FieldRole::WeightSds),
    (Metric::Height, FieldRole::HeightCentile, FieldRole::HeightSds),
    (Metric::Bmi, FieldRole::BmiCentile, FieldRole::BmiSds),
];

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub debounce: Duration,
    pub initial_delay: Duration,
    pub in_flight_timeout: Duration,
    /// Render inline status next to the source fields.
    pub show_status: bool,
    /// Field next to which the BMI summary is shown, when the form has one.
    pub bmi_display_field: Option<String>,
    /// Date layout configured on the form, forwarded with each snapshot.
    pub date_format: Option<FormatHint>,
    pub measurement_method: String,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            debounce: DEBOUNCE,
            initial_delay: INITIAL_DELAY,
            in_flight_timeout: IN_FLIGHT_TIMEOUT,
            show_status: false,
            bmi_display_field: None,
            date_format: None,
            measurement_method: "height".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Pending,
    InFlight,
}

#[derive(Debug, Clone, PartialEq)]
enum State {
    Idle,
    Pending {
        due: Instant,
    },
    InFlight {
        cycle: u64,
        started: Instant,
        /// Source fields that had a value when the cycle was dispatched.
        sources: Vec<FieldRole>,
    },
}

/// A calculation the host must send across the remote boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub cycle: u64,
    pub snapshot: RawInput,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Results written; `written` lists the field names that were set.
    Applied { written: Vec<String> },
    /// Nothing written; the reason is logged and optionally displayed.
    Failed { reason: String },
    /// The response belonged to a superseded cycle.
    Discarded,
}

pub struct FieldScheduler {
    bindings: FieldBindings,
    options: SchedulerOptions,
    state: State,
    last_cycle: u64,
    rerun_due: Option<Instant>,
}

impl FieldScheduler {
    /// Subscribe to the watched fields and schedule the on-load pass.
    pub fn attach<F: FormFields>(form: &mut F, bindings: FieldBindings, options: SchedulerOptions, now: Instant) -> Self {
        for role in WATCHED_ROLES {
            form.subscribe(bindings.name(role), FieldEventKind::Change);
            form.subscribe(bindings.name(role), FieldEventKind::Blur);
        }
        form.subscribe(bindings.name(FieldRole::Sex), FieldEventKind::Change);

        let due = now + options.initial_delay;
        Self {
            bindings,
            options,
            state: State::Pending { due },
            last_cycle: 0,
            rerun_due: None,
        }
    }

    /// Attach only when `instrument` is on the allow-list.
    pub fn attach_for_instrument<F: FormFields>(
        instrument: &str,
        targets: &TargetInstruments,
        form: &mut F,
        bindings: FieldBindings,
        options: SchedulerOptions,
        now: Instant,
    ) -> Option<Self> {
        if !targets.contains(instrument) {
            tracing::debug!(instrument, "instrument not targeted; scheduler not attached");
            return None;
        }
        Some(Self::attach(form, bindings, options, now))
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Idle => Phase::Idle,
            State::Pending { .. } => Phase::Pending,
            State::InFlight { .. } => Phase::InFlight,
        }
    }

    /// Stamp of the most recently dispatched cycle (0 before the first).
    pub fn current_cycle(&self) -> u64 {
        self.last_cycle
    }

    /// When the host should call `poll` next.
    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.state {
            State::Idle => None,
            State::Pending { due } => Some(*due),
            State::InFlight { started, .. } => Some(*started + self.options.in_flight_timeout),
        }
    }

    /// Feed a host field event. Returns whether the event is watched.
    pub fn handle_event(&mut self, event: &FieldEvent, now: Instant) -> bool {
        if !self.watches(event) {
            return false;
        }

        let due = now + self.options.debounce;
        match self.state {
            State::InFlight { .. } => self.rerun_due = Some(due),
            // Restarts the window when already pending.
            State::Idle | State::Pending { .. } => self.state = State::Pending { due },
        }
        true
    }

    /// Advance timers. Returns a dispatch when a cycle should start now.
    pub fn poll<F: FormFields>(&mut self, form: &mut F, now: Instant) -> Option<Dispatch> {
        let timed_out = match &self.state {
            State::InFlight { started, .. } => now.saturating_duration_since(*started) >= self.options.in_flight_timeout,
            _ => false,
        };
        if timed_out {
            if let State::InFlight { cycle, sources, .. } = std::mem::replace(&mut self.state, State::Idle) {
                tracing::warn!(cycle, "centile calculation timed out");
                self.show_failure(form, &sources, "Calculation timed out");
                self.settle(now);
            }
        }

        let State::Pending { due } = self.state else {
            return None;
        };
        if now < due {
            return None;
        }

        let Some(snapshot) = self.snapshot(form) else {
            tracing::debug!("required fields missing; calculation skipped");
            self.state = State::Idle;
            return None;
        };

        self.last_cycle += 1;
        let cycle = self.last_cycle;

        let sources: Vec<FieldRole> = [FieldRole::Weight, FieldRole::Height]
            .into_iter()
            .filter(|role| !form.read_field(self.bindings.name(*role)).trim().is_empty())
            .collect();
        if self.options.show_status {
            for role in &sources {
                redraw(form, self.bindings.name(*role), StatusDisplay::Calculating);
            }
        }

        tracing::debug!(cycle, "dispatching centile calculation");
        self.state = State::InFlight {
            cycle,
            started: now,
            sources,
        };
        Some(Dispatch { cycle, snapshot })
    }

    /// Resolve the in-flight cycle `cycle` with the remote response.
    pub fn complete<F: FormFields>(
        &mut self,
        cycle: u64,
        response: Result<CalculationResponse, ApiError>,
        form: &mut F,
        now: Instant,
    ) -> Completion {
        let is_current = matches!(&self.state, State::InFlight { cycle: current, .. } if *current == cycle);
        if !is_current {
            tracing::debug!(cycle, current = self.last_cycle, "discarding superseded calculation response");
            return Completion::Discarded;
        }
        let sources = match std::mem::replace(&mut self.state, State::Idle) {
            State::InFlight { sources, .. } => sources,
            _ => Vec::new(),
        };

        let completion = match response {
            Ok(resp) if resp.success => {
                let results = resp.results.unwrap_or_default();
                let written = self.apply(form, &results, &sources);
                tracing::info!(cycle, fields = written.len(), "centile results applied");
                Completion::Applied { written }
            }
            Ok(resp) => {
                let reason = resp.error.unwrap_or_else(|| "Unknown error".to_string());
                tracing::warn!(cycle, error = %reason, "centile calculation error");
                self.show_failure(form, &sources, &reason);
                Completion::Failed { reason }
            }
            Err(e) => {
                tracing::warn!(cycle, error = %e, "centile calculation failed");
                let reason = e.to_string();
                self.show_failure(form, &sources, &reason);
                Completion::Failed { reason }
            }
        };

        self.settle(now);
        completion
    }

    /// `poll` + a synchronous remote call + `complete`, for hosts without
    /// their own async plumbing.
    pub fn run_due<F: FormFields, R: RemoteCalculator + ?Sized>(
        &mut self,
        form: &mut F,
        remote: &R,
        now: Instant,
    ) -> Option<Completion> {
        let dispatch = self.poll(form, now)?;
        let response = remote.calculate(&dispatch.snapshot);
        Some(self.complete(dispatch.cycle, response, form, now))
    }

    fn watches(&self, event: &FieldEvent) -> bool {
        match self.bindings.role_of(&event.field) {
            Some(FieldRole::Weight | FieldRole::Height | FieldRole::MeasurementDate) => true,
            Some(FieldRole::Sex) => event.kind == FieldEventKind::Change,
            _ => false,
        }
    }

    // Edits received while in flight become the next pending cycle.
    fn settle(&mut self, now: Instant) {
        self.state = match self.rerun_due.take() {
            Some(due) => State::Pending { due: due.max(now) },
            None => State::Idle,
        };
    }

    fn snapshot<F: FormFields>(&self, form: &F) -> Option<RawInput> {
        let read = |role: FieldRole| form.read_field(self.bindings.name(role)).trim().to_string();

        let dob = read(FieldRole::Dob);
        let measurement_date = read(FieldRole::MeasurementDate);
        let sex = form
            .read_checked_choice(self.bindings.name(FieldRole::Sex))
            .trim()
            .to_string();
        let weight = read(FieldRole::Weight);
        let height = read(FieldRole::Height);

        if dob.is_empty() || sex.is_empty() || measurement_date.is_empty() {
            return None;
        }
        if weight.is_empty() && height.is_empty() {
            return None;
        }

        let optional = |v: String| (!v.is_empty()).then_some(NumericField::Text(v));

        Some(RawInput {
            birth_date: Some(dob),
            measurement_date: Some(measurement_date),
            weight: optional(weight),
            height: optional(height),
            ofc: None,
            sex: Some(sex),
            gestation_weeks: optional(read(FieldRole::GestationWeeks)),
            gestation_days: optional(read(FieldRole::GestationDays)),
            measurement_method: Some(self.options.measurement_method.clone()),
            date_format: self.options.date_format.map(|h| h.as_str().to_string()),
        })
    }

    fn apply<F: FormFields>(&self, form: &mut F, results: &AggregateResult, sources: &[FieldRole]) -> Vec<String> {
        let mut written = Vec::new();

        for (metric, centile_role, sds_role) in RESULT_FIELDS {
            let Some(outcome) = results.get(metric) else {
                continue;
            };
            let anchor = self.anchor_for(metric);

            match outcome {
                MeasurementOutcome::Calculated(values) => {
                    if let Some(centile) = values.centile {
                        let name = self.bindings.name(centile_role);
                        form.write_field(name, &field_value(round_centile(centile)));
                        written.push(name.to_string());
                    }
                    if let Some(sds) = values.sds {
                        let name = self.bindings.name(sds_role);
                        form.write_field(name, &field_value(round_sds(sds)));
                        written.push(name.to_string());
                    }
                    if let (true, Some(anchor)) = (self.options.show_status, anchor) {
                        let status = match centile_summary(values) {
                            Some(text) if metric == Metric::Bmi => StatusDisplay::Result(format!("BMI: {text}")),
                            Some(text) => StatusDisplay::Result(text),
                            None => StatusDisplay::Error("No centile returned".to_string()),
                        };
                        redraw(form, anchor, status);
                    }
                }
                MeasurementOutcome::Failed { error } => {
                    tracing::warn!(metric = %metric, error = %error, "metric calculation failed");
                    if let (true, Some(anchor)) = (self.options.show_status, anchor) {
                        redraw(form, anchor, StatusDisplay::Error(error.clone()));
                    }
                }
            }
        }

        // A source that produced no outcome (e.g. non-numeric text) must not
        // be left showing "Calculating...".
        if self.options.show_status {
            for role in sources {
                let metric = match role {
                    FieldRole::Weight => Metric::Weight,
                    FieldRole::Height => Metric::Height,
                    _ => continue,
                };
                if results.get(metric).is_none() {
                    form.clear_status(self.bindings.name(*role));
                }
            }
        }

        written
    }

    fn anchor_for(&self, metric: Metric) -> Option<&str> {
        match metric {
            Metric::Weight => Some(self.bindings.name(FieldRole::Weight)),
            Metric::Height => Some(self.bindings.name(FieldRole::Height)),
            Metric::Bmi => self.options.bmi_display_field.as_deref(),
            Metric::Ofc => None,
        }
    }

    fn show_failure<F: FormFields>(&self, form: &mut F, sources: &[FieldRole], reason: &str) {
        if !self.options.show_status {
            return;
        }
        for role in sources {
            redraw(form, self.bindings.name(*role), StatusDisplay::Error(reason.to_string()));
        }
    }
}

// Replace, never stack: at most one display per anchor.
fn redraw<F: FormFields>(form: &mut F, anchor: &str, status: StatusDisplay) {
    form.clear_status(anchor);
    form.append_status(anchor, &status);
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;
    use crate::domain::CentileValues;

    #[derive(Default)]
    struct FakeForm {
        values: HashMap<String, String>,
        choices: HashMap<String, String>,
        writes: Vec<(String, String)>,
        subscriptions: Vec<(String, FieldEventKind)>,
        statuses: HashMap<String, Vec<StatusDisplay>>,
    }

    impl FakeForm {
        fn prefilled() -> Self {
            let mut form = FakeForm::default();
            form.set("date_of_birth", "2019-04-02");
            form.set("measurement_date", "02/10/2021");
            form.set("weight_kg", "12.1");
            form.set("height_cm", "88");
            form.choices.insert("sex".to_string(), "1".to_string());
            form
        }

        fn set(&mut self, name: &str, value: &str) {
            self.values.insert(name.to_string(), value.to_string());
        }

        fn status(&self, anchor: &str) -> &[StatusDisplay] {
            self.statuses.get(anchor).map(Vec::as_slice).unwrap_or(&[])
        }
    }

    impl FormFields for FakeForm {
        fn read_field(&self, name: &str) -> String {
            self.values.get(name).cloned().unwrap_or_default()
        }

        fn read_checked_choice(&self, group: &str) -> String {
            self.choices.get(group).cloned().unwrap_or_default()
        }

        fn write_field(&mut self, name: &str, value: &str) {
            self.values.insert(name.to_string(), value.to_string());
            self.writes.push((name.to_string(), value.to_string()));
        }

        fn subscribe(&mut self, name: &str, kind: FieldEventKind) {
            self.subscriptions.push((name.to_string(), kind));
        }

        fn clear_status(&mut self, anchor: &str) {
            self.statuses.remove(anchor);
        }

        fn append_status(&mut self, anchor: &str, status: &StatusDisplay) {
            self.statuses.entry(anchor.to_string()).or_default().push(status.clone());
        }
    }

    /// Records snapshots and answers with a canned response.
    struct FakeRemote {
        calls: RefCell<Vec<RawInput>>,
        response: Result<CalculationResponse, ApiError>,
    }

    impl FakeRemote {
        fn answering(response: Result<CalculationResponse, ApiError>) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                response,
            }
        }
    }

    impl RemoteCalculator for FakeRemote {
        fn calculate(&self, snapshot: &RawInput) -> Result<CalculationResponse, ApiError> {
            self.calls.borrow_mut().push(snapshot.clone());
            self.response.clone()
        }
    }

    fn values(centile: f64, sds: f64) -> MeasurementOutcome {
        MeasurementOutcome::Calculated(CentileValues {
            centile: Some(centile),
            sds: Some(sds),
            ..CentileValues::default()
        })
    }

    fn full_results() -> CalculationResponse {
        let mut results = AggregateResult::default();
        results.insert(Metric::Weight, values(87.46, 1.234));
        results.insert(Metric::Height, values(12.04, -1.176));
        results.insert(Metric::Bmi, values(99.61, 2.666));
        CalculationResponse::success(results)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn attach_subscribes_watched_fields() {
        let mut form = FakeForm::default();
        FieldScheduler::attach(&mut form, FieldBindings::default(), SchedulerOptions::default(), Instant::now());

        assert_eq!(form.subscriptions.len(), 7);
        assert!(form.subscriptions.contains(&("weight_kg".to_string(), FieldEventKind::Blur)));
        assert!(form.subscriptions.contains(&("measurement_date".to_string(), FieldEventKind::Change)));
        assert!(form.subscriptions.contains(&("sex".to_string(), FieldEventKind::Change)));
        assert!(!form.subscriptions.contains(&("sex".to_string(), FieldEventKind::Blur)));
    }

    #[test]
    fn attaches_only_to_targeted_instruments() {
        let targets = TargetInstruments::parse("growth, clinic_visit");
        let mut form = FakeForm::default();
        let now = Instant::now();

        assert!(FieldScheduler::attach_for_instrument(
            "demographics",
            &targets,
            &mut form,
            FieldBindings::default(),
            SchedulerOptions::default(),
            now
        )
        .is_none());
        assert!(form.subscriptions.is_empty());

        assert!(FieldScheduler::attach_for_instrument(
            "clinic_visit",
            &targets,
            &mut form,
            FieldBindings::default(),
            SchedulerOptions::default(),
            now
        )
        .is_some());
    }

    #[test]
    fn initial_pass_runs_after_load_delay() {
        let t0 = Instant::now();
        let mut form = FakeForm::prefilled();
        let mut scheduler =
            FieldScheduler::attach(&mut form, FieldBindings::default(), SchedulerOptions::default(), t0);

        assert_eq!(scheduler.next_deadline(), Some(t0 + ms(500)));
        assert!(scheduler.poll(&mut form, t0 + ms(400)).is_none());

        let dispatch = scheduler.poll(&mut form, t0 + ms(500)).unwrap();
        assert_eq!(dispatch.cycle, 1);
        assert_eq!(dispatch.snapshot.birth_date.as_deref(), Some("2019-04-02"));
        assert_eq!(dispatch.snapshot.weight, Some(NumericField::Text("12.1".to_string())));
        assert_eq!(dispatch.snapshot.measurement_method.as_deref(), Some("height"));
        assert_eq!(scheduler.phase(), Phase::InFlight);
    }

    #[test]
    fn guard_failure_returns_to_idle_without_dispatch() {
        let t0 = Instant::now();
        let mut form = FakeForm::prefilled();
        form.choices.clear();
        let remote = FakeRemote::answering(Ok(full_results()));
        let mut scheduler =
            FieldScheduler::attach(&mut form, FieldBindings::default(), SchedulerOptions::default(), t0);

        assert!(scheduler.run_due(&mut form, &remote, t0 + ms(600)).is_none());
        assert_eq!(scheduler.phase(), Phase::Idle);

        form.set("weight_kg", "");
        form.set("height_cm", "");
        form.choices.insert("sex".to_string(), "2".to_string());
        assert!(scheduler.handle_event(&FieldEvent::change("weight_kg"), t0 + ms(700)));
        assert!(scheduler.run_due(&mut form, &remote, t0 + ms(1700)).is_none());
        assert_eq!(scheduler.phase(), Phase::Idle);
        assert!(remote.calls.borrow().is_empty());
    }

    #[test]
    fn rapid_edits_coalesce_into_one_call_with_final_values() {
        let t0 = Instant::now();
        let mut form = FakeForm::prefilled();
        let remote = FakeRemote::answering(Ok(full_results()));
        let mut scheduler =
            FieldScheduler::attach(&mut form, FieldBindings::default(), SchedulerOptions::default(), t0);

        form.set("weight_kg", "12");
        scheduler.handle_event(&FieldEvent::change("weight_kg"), t0 + ms(100));
        form.set("weight_kg", "12.4");
        scheduler.handle_event(&FieldEvent::blur("weight_kg"), t0 + ms(600));

        assert!(scheduler.run_due(&mut form, &remote, t0 + ms(1200)).is_none());
        let completion = scheduler.run_due(&mut form, &remote, t0 + ms(1600)).unwrap();

        assert!(matches!(completion, Completion::Applied { .. }));
        let calls = remote.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].weight, Some(NumericField::Text("12.4".to_string())));
    }

    #[test]
    fn unwatched_events_are_ignored() {
        let t0 = Instant::now();
        let mut form = FakeForm::default();
        let mut scheduler =
            FieldScheduler::attach(&mut form, FieldBindings::default(), SchedulerOptions::default(), t0);

        assert!(!scheduler.handle_event(&FieldEvent::change("notes"), t0));
        assert!(!scheduler.handle_event(&FieldEvent::blur("sex"), t0));
        assert!(!scheduler.handle_event(&FieldEvent::change("weight_centile"), t0));
        assert!(scheduler.handle_event(&FieldEvent::change("sex"), t0));
    }

    #[test]
    fn applied_results_are_rounded_and_written() {
        let t0 = Instant::now();
        let mut form = FakeForm::prefilled();
        let remote = FakeRemote::answering(Ok(full_results()));
        let mut scheduler =
            FieldScheduler::attach(&mut form, FieldBindings::default(), SchedulerOptions::default(), t0);

        let completion = scheduler.run_due(&mut form, &remote, t0 + ms(500)).unwrap();

        let Completion::Applied { written } = completion else {
            panic!("expected applied results");
        };
        assert_eq!(written.len(), 6);
        assert_eq!(form.read_field("weight_centile"), "87.5");
        assert_eq!(form.read_field("weight_sds"), "1.23");
        assert_eq!(form.read_field("height_centile"), "12");
        assert_eq!(form.read_field("height_sds"), "-1.18");
        assert_eq!(form.read_field("bmi_centile"), "99.6");
        assert_eq!(form.read_field("bmi_sds"), "2.67");
        assert_eq!(scheduler.phase(), Phase::Idle);
    }

    #[test]
    fn metric_errors_are_never_written() {
        let t0 = Instant::now();
        let mut form = FakeForm::prefilled();
        form.set("weight_centile", "50");

        let mut results = AggregateResult::default();
        results.insert(
            Metric::Weight,
            MeasurementOutcome::Failed {
                error: "weight out of range".to_string(),
            },
        );
        results.insert(Metric::Height, values(40.0, -0.25));
        let remote = FakeRemote::answering(Ok(CalculationResponse::success(results)));
        let options = SchedulerOptions {
            show_status: true,
            ..SchedulerOptions::default()
        };
        let mut scheduler = FieldScheduler::attach(&mut form, FieldBindings::default(), options, t0);

        scheduler.run_due(&mut form, &remote, t0 + ms(500)).unwrap();

        assert_eq!(form.read_field("weight_centile"), "50");
        assert_eq!(form.read_field("height_centile"), "40");
        assert_eq!(
            form.status("weight_kg"),
            &[StatusDisplay::Error("weight out of range".to_string())]
        );
        assert_eq!(
            form.status("height_cm"),
            &[StatusDisplay::Result("40th centile (SDS: -0.25)".to_string())]
        );
    }

    #[test]
    fn failed_cycles_leave_prior_values_untouched() {
        for response in [
            Ok(CalculationResponse::failure("Invalid date format: 32/01/2020 (hint: none)")),
            Err(ApiError::Transport {
                message: "connection refused".to_string(),
            }),
        ] {
            let t0 = Instant::now();
            let mut form = FakeForm::prefilled();
            form.set("weight_centile", "75");
            form.set("weight_sds", "0.67");
            let remote = FakeRemote::answering(response);
            let options = SchedulerOptions {
                show_status: true,
                ..SchedulerOptions::default()
            };
            let mut scheduler = FieldScheduler::attach(&mut form, FieldBindings::default(), options, t0);

            let completion = scheduler.run_due(&mut form, &remote, t0 + ms(500)).unwrap();

            assert!(matches!(completion, Completion::Failed { .. }));
            assert!(form.writes.is_empty());
            assert_eq!(form.read_field("weight_centile"), "75");
            assert_eq!(form.read_field("weight_sds"), "0.67");
            assert!(form.status("weight_kg")[0].is_error());
            assert_eq!(scheduler.phase(), Phase::Idle);
        }
    }

    #[test]
    fn edits_during_flight_wait_and_then_rerun() {
        let t0 = Instant::now();
        let mut form = FakeForm::prefilled();
        let mut scheduler =
            FieldScheduler::attach(&mut form, FieldBindings::default(), SchedulerOptions::default(), t0);

        let first = scheduler.poll(&mut form, t0 + ms(500)).unwrap();

        form.set("height_cm", "90");
        scheduler.handle_event(&FieldEvent::change("height_cm"), t0 + ms(600));
        form.set("height_cm", "91");
        scheduler.handle_event(&FieldEvent::change("height_cm"), t0 + ms(700));

        // No second concurrent call, even once the debounce window has passed.
        assert!(scheduler.poll(&mut form, t0 + ms(2000)).is_none());
        assert_eq!(scheduler.phase(), Phase::InFlight);

        scheduler.complete(first.cycle, Ok(full_results()), &mut form, t0 + ms(2100));
        assert_eq!(scheduler.phase(), Phase::Pending);

        let second = scheduler.poll(&mut form, t0 + ms(2100)).unwrap();
        assert_eq!(second.cycle, first.cycle + 1);
        assert_eq!(second.snapshot.height, Some(NumericField::Text("91".to_string())));
    }

    #[test]
    fn superseded_response_is_discarded() {
        let t0 = Instant::now();
        let mut form = FakeForm::prefilled();
        let mut scheduler =
            FieldScheduler::attach(&mut form, FieldBindings::default(), SchedulerOptions::default(), t0);

        let stale = scheduler.poll(&mut form, t0 + ms(500)).unwrap();

        // The first cycle never answers in time; a later edit starts a new one.
        let expired = t0 + ms(500) + IN_FLIGHT_TIMEOUT;
        assert!(scheduler.poll(&mut form, expired).is_none());
        assert_eq!(scheduler.phase(), Phase::Idle);
        scheduler.handle_event(&FieldEvent::change("weight_kg"), expired);
        let current = scheduler.poll(&mut form, expired + ms(1000)).unwrap();
        assert!(current.cycle > stale.cycle);

        let late = scheduler.complete(stale.cycle, Ok(full_results()), &mut form, expired + ms(1100));
        assert_eq!(late, Completion::Discarded);
        assert!(form.writes.is_empty());
        assert_eq!(scheduler.phase(), Phase::InFlight);

        let applied = scheduler.complete(current.cycle, Ok(full_results()), &mut form, expired + ms(1200));
        assert!(matches!(applied, Completion::Applied { .. }));
        assert_eq!(form.read_field("weight_centile"), "87.5");
    }

    #[test]
    fn status_displays_are_replaced_not_stacked() {
        let t0 = Instant::now();
        let mut form = FakeForm::prefilled();
        let remote = FakeRemote::answering(Ok(full_results()));
        let options = SchedulerOptions {
            show_status: true,
            bmi_display_field: Some("bmi_calculated".to_string()),
            ..SchedulerOptions::default()
        };
        let mut scheduler = FieldScheduler::attach(&mut form, FieldBindings::default(), options, t0);

        let dispatch = scheduler.poll(&mut form, t0 + ms(500)).unwrap();
        assert_eq!(form.status("weight_kg"), &[StatusDisplay::Calculating]);

        scheduler.complete(dispatch.cycle, remote.calculate(&dispatch.snapshot), &mut form, t0 + ms(600));
        scheduler.handle_event(&FieldEvent::change("weight_kg"), t0 + ms(700));
        scheduler.run_due(&mut form, &remote, t0 + ms(1700)).unwrap();

        assert_eq!(
            form.status("weight_kg"),
            &[StatusDisplay::Result("87.5th centile (SDS: 1.23)".to_string())]
        );
        assert_eq!(form.status("height_cm").len(), 1);
        assert_eq!(
            form.status("bmi_calculated"),
            &[StatusDisplay::Result("BMI: 99.6th centile (SDS: 2.67)".to_string())]
        );
    }

    #[test]
    fn source_without_outcome_drops_calculating_display() {
        let t0 = Instant::now();
        let mut form = FakeForm::prefilled();
        form.set("weight_kg", "n/a");
        let mut results = AggregateResult::default();
        results.insert(Metric::Height, values(60.0, 0.25));
        let remote = FakeRemote::answering(Ok(CalculationResponse::success(results)));
        let options = SchedulerOptions {
            show_status: true,
            ..SchedulerOptions::default()
        };
        let mut scheduler = FieldScheduler::attach(&mut form, FieldBindings::default(), options, t0);

        scheduler.run_due(&mut form, &remote, t0 + ms(500)).unwrap();

        assert!(form.status("weight_kg").is_empty());
        assert_eq!(form.status("height_cm").len(), 1);
    }
}
