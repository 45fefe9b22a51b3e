//! The analysis orchestrator.
//!
//! A [`Loadshape`] owns the training load series (plus optional temperature
//! series, tariff, and floor area), drives the baseline model through its
//! port, and derives performance analytics from the results:
//!
//! - [`Loadshape::baseline`]: fit and store the counterfactual baseline
//! - [`Loadshape::diff`]: actual-vs-baseline power and cumulative energy
//! - [`Loadshape::event_performance`]: demand-response event statistics
//! - [`Loadshape::cumulative_sum`]: running energy difference as a series
//! - [`Loadshape::cost`]: tariff-based cost of a load over a window
//!
//! Derived state (`baseline_series`, `error_stats`) is reset at the start of
//! every `baseline()` call and never left stale. The analytics methods
//! require a baseline and will transparently compute one with default
//! parameters when none exists yet.

use std::collections::BTreeMap;

use chrono_tz::Tz;
use tracing::debug;

use crate::calendar::CalendarSet;
use crate::error::{Error, Result};
use crate::model::{BaselineModel, ModelRequest, RegressionModel};
use crate::series::{DataQuery, Series, SeriesPoint, interp, round2};
use crate::tariff::Tariff;
use crate::time::{self, TimeInput, Timestamp};

/// Parameters for [`Loadshape::baseline`]. Defaults: the training series'
/// full span, 14-day weighting, 900 s modeling interval and prediction step.
#[derive(Debug, Clone)]
pub struct BaselineOptions {
    pub start_at: Option<TimeInput>,
    pub end_at: Option<TimeInput>,
    /// Recency-weighting window, days.
    pub weighting_days: u32,
    /// Modeling interval, seconds (sent to the model as minutes).
    pub modeling_interval: i64,
    /// Prediction grid step, seconds.
    pub step_size: i64,
}

impl Default for BaselineOptions {
    fn default() -> Self {
        Self {
            start_at: None,
            end_at: None,
            weighting_days: 14,
            modeling_interval: 900,
            step_size: 900,
        }
    }
}

/// Parameters for [`Loadshape::diff`] and [`Loadshape::cumulative_sum`].
/// `step_count`, when set, divides the span into exactly that many equal
/// steps and overrides `step_size`; `step_count = 1` produces the
/// single-aggregate snapshot used by `event_performance`.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    pub start_at: Option<TimeInput>,
    pub end_at: Option<TimeInput>,
    pub step_size: i64,
    pub step_count: Option<u32>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            start_at: None,
            end_at: None,
            step_size: 900,
            step_count: None,
        }
    }
}

/// Parameters for [`Loadshape::cost`]; the grid step is fixed at 900 s
/// unless `step_count` overrides it.
#[derive(Debug, Clone, Default)]
pub struct CostOptions {
    pub start_at: Option<TimeInput>,
    pub end_at: Option<TimeInput>,
    pub step_count: Option<u32>,
}

/// Output of [`Loadshape::diff`]: actual-minus-baseline power, baseline
/// power, and their running energy integrals, all on one shared grid.
///
/// The value at each grid point after the first is the average over the
/// preceding interval (trapezoid rule), so a one-step grid yields the
/// window's aggregate figures directly.
#[derive(Debug, Clone)]
pub struct DiffOutput {
    pub kw_diff: Series,
    pub kw_base: Series,
    pub cumulative_kwh_diff: Series,
    pub cumulative_kwh_base: Series,
}

pub struct Loadshape {
    timezone: Tz,
    training_load: Series,
    training_temperature: Option<Series>,
    forecast_temperature: Option<Series>,
    tariff: Option<Tariff>,
    sq_ft: Option<f64>,
    model: Box<dyn BaselineModel>,
    baseline_series: Option<Series>,
    error_stats: Option<BTreeMap<String, f64>>,
}

impl Loadshape {
    /// Build an orchestrator around a training load series, using the
    /// in-process regression model by default.
    pub fn new(training_load: Series) -> Self {
        Self {
            timezone: training_load.timezone(),
            training_load,
            training_temperature: None,
            forecast_temperature: None,
            tariff: None,
            sq_ft: None,
            model: Box::new(RegressionModel::new()),
            baseline_series: None,
            error_stats: None,
        }
    }

    pub fn with_temperature(mut self, series: Series) -> Self {
        self.training_temperature = Some(series);
        self
    }

    pub fn with_forecast_temperature(mut self, series: Series) -> Self {
        self.forecast_temperature = Some(series);
        self
    }

    pub fn with_tariff(mut self, tariff: Tariff) -> Self {
        self.tariff = Some(tariff);
        self
    }

    pub fn with_sq_ft(mut self, sq_ft: f64) -> Self {
        self.sq_ft = Some(sq_ft);
        self
    }

    pub fn with_model(mut self, model: Box<dyn BaselineModel>) -> Self {
        self.model = model;
        self
    }

    /// Replace the baseline model. Existing derived state is reset since it
    /// no longer reflects the configured model.
    pub fn set_model(&mut self, model: Box<dyn BaselineModel>) {
        self.model = model;
        self.reset_derived();
    }

    /// Add or replace the tariff.
    pub fn set_tariff(&mut self, tariff: Tariff) {
        self.tariff = Some(tariff);
    }

    pub fn training_load(&self) -> &Series {
        &self.training_load
    }

    /// The most recent baseline, if one has been computed.
    pub fn baseline_series(&self) -> Option<&Series> {
        self.baseline_series.as_ref()
    }

    /// Error statistics from the most recent baseline run.
    pub fn error_stats(&self) -> Option<&BTreeMap<String, f64>> {
        self.error_stats.as_ref()
    }

    // --- exclusion proxies (forwarded to the training load series) --- //

    pub fn add_exclusion(
        &mut self,
        start_at: impl Into<TimeInput>,
        end_at: impl Into<TimeInput>,
    ) -> Result<()> {
        self.training_load.add_exclusion(start_at, end_at)
    }

    pub fn add_named_exclusion(&mut self, name: &str, calendars: &CalendarSet) -> Result<()> {
        self.training_load.add_named_exclusion(name, calendars)
    }

    pub fn clear_exclusions(&mut self) {
        self.training_load.clear_exclusions();
    }

    // --- derived data generators --- //

    /// Fit and store the baseline.
    ///
    /// Builds the prediction grid (the training span by default), assembles
    /// the model request, and stores the predicted series plus the model's
    /// error statistics. Prior derived state is reset first, so a failed run
    /// leaves the instance unbaselined rather than stale.
    ///
    /// Temperature handling: when no training temperature is configured the
    /// request omits temperature entirely; forecast temperature is only sent
    /// alongside training temperature. The model ignores temperature for
    /// predictions lacking matching forecast data.
    pub fn baseline(&mut self, opts: &BaselineOptions) -> Result<&Series> {
        self.reset_derived();

        if opts.modeling_interval < 60 {
            return Err(Error::Validation(format!(
                "modeling_interval must be at least 60 seconds, got {}",
                opts.modeling_interval
            )));
        }

        let prediction_times =
            self.output_times(opts.start_at.as_ref(), opts.end_at.as_ref(), opts.step_size, None)?;
        debug!(
            steps = prediction_times.len(),
            weighting_days = opts.weighting_days,
            "requesting baseline"
        );

        let temperature = match &self.training_temperature {
            Some(series) => Some(series.data(&DataQuery::new())?),
            None => None,
        };
        let forecast_temperature = match (&temperature, &self.forecast_temperature) {
            (Some(_), Some(series)) => Some(series.data(&DataQuery::new())?),
            _ => None,
        };
        let fahrenheit = self
            .training_temperature
            .as_ref()
            .map(Series::is_fahrenheit)
            .unwrap_or(true);

        let request = ModelRequest {
            load: self.training_load.data(&DataQuery::new())?,
            prediction_times,
            temperature,
            forecast_temperature,
            fahrenheit,
            weighting_days: opts.weighting_days,
            interval_minutes: (opts.modeling_interval / 60) as u32,
            timezone: self.timezone,
        };

        let response = self.model.predict(&request)?;
        self.error_stats = Some(response.error_stats);
        Ok(&*self
            .baseline_series
            .insert(Series::from_points(response.predictions, self.timezone)))
    }

    /// Actual-vs-baseline comparison over a shared timestamp grid.
    ///
    /// Computes a baseline with default parameters first if none exists.
    /// The training load is read raw here (exclusions are a training-time
    /// concern; the comparison covers the real, unfiltered load).
    pub fn diff(&mut self, opts: &DiffOptions) -> Result<DiffOutput> {
        if self.baseline_series.is_none() {
            self.baseline(&BaselineOptions::default())?;
        }

        let times = self.output_times(
            opts.start_at.as_ref(),
            opts.end_at.as_ref(),
            opts.step_size,
            opts.step_count,
        )?;

        let load = self.training_load.points();
        if load.len() < 2 {
            return Err(Error::InsufficientData(load.len()));
        }
        let base_series = self
            .baseline_series
            .as_ref()
            .ok_or_else(|| Error::Validation("baseline has not been computed".into()))?;
        let base = base_series.points();
        if base.len() < 2 {
            return Err(Error::InsufficientData(base.len()));
        }

        let mut kw_diff = Vec::with_capacity(times.len());
        let mut kw_base = Vec::with_capacity(times.len());
        let mut cum_diff = Vec::with_capacity(times.len());
        let mut cum_base = Vec::with_capacity(times.len());

        let mut prev_load = 0.0;
        let mut prev_base = 0.0;
        let mut running_diff = 0.0;
        let mut running_base = 0.0;

        for (i, &t) in times.iter().enumerate() {
            let load_now = interp(load, t);
            let base_now = interp(base, t);
            let (diff_kw, base_kw) = if i == 0 {
                (load_now - base_now, base_now)
            } else {
                // Average over the preceding interval (trapezoid rule).
                let hours = (t - times[i - 1]) as f64 / 3600.0;
                let avg_load = (prev_load + load_now) / 2.0;
                let avg_base = (prev_base + base_now) / 2.0;
                running_diff += (avg_load - avg_base) * hours;
                running_base += avg_base * hours;
                (avg_load - avg_base, avg_base)
            };
            kw_diff.push(SeriesPoint::new(t, round2(diff_kw)));
            kw_base.push(SeriesPoint::new(t, round2(base_kw)));
            cum_diff.push(SeriesPoint::new(t, round2(running_diff)));
            cum_base.push(SeriesPoint::new(t, round2(running_base)));
            prev_load = load_now;
            prev_base = base_now;
        }

        Ok(DiffOutput {
            kw_diff: Series::from_points(kw_diff, self.timezone),
            kw_base: Series::from_points(kw_base, self.timezone),
            cumulative_kwh_diff: Series::from_points(cum_diff, self.timezone),
            cumulative_kwh_base: Series::from_points(cum_base, self.timezone),
        })
    }

    /// Demand-response event statistics for a window.
    ///
    /// Runs a one-step `diff` over the window and reports shed/reduction
    /// figures, plus W/sq-ft when floor area is configured and dollar
    /// savings when a tariff is. All values are rounded to 2 decimals. A
    /// zero baseline denominator is an explicit error, not a NaN.
    pub fn event_performance(
        &mut self,
        start_at: impl Into<TimeInput>,
        end_at: impl Into<TimeInput>,
    ) -> Result<BTreeMap<String, f64>> {
        let start_at = time::normalize(start_at, self.timezone)?;
        let end_at = time::normalize(end_at, self.timezone)?;

        let diff = self.diff(&DiffOptions {
            start_at: Some(start_at.into()),
            end_at: Some(end_at.into()),
            step_count: Some(1),
            ..DiffOptions::default()
        })?;

        let avg_kw_shed = -last_value(&diff.kw_diff)?;
        let avg_kw_base = last_value(&diff.kw_base)?;
        if avg_kw_base == 0.0 {
            return Err(Error::ZeroDenominator {
                metric: "avg_percent_kw_shed",
            });
        }
        let kwh_reduction = -last_value(&diff.cumulative_kwh_diff)?;
        let kwh_base = last_value(&diff.cumulative_kwh_base)?;
        if kwh_base == 0.0 {
            return Err(Error::ZeroDenominator {
                metric: "percent_kwh_reduction",
            });
        }

        let mut ep = BTreeMap::new();
        ep.insert("avg_kw_shed".to_owned(), avg_kw_shed);
        ep.insert(
            "avg_percent_kw_shed".to_owned(),
            avg_kw_shed / avg_kw_base * 100.0,
        );
        ep.insert("kwh_reduction".to_owned(), kwh_reduction);
        ep.insert(
            "percent_kwh_reduction".to_owned(),
            kwh_reduction / kwh_base * 100.0,
        );

        if let Some(sq_ft) = self.sq_ft {
            ep.insert("avg_w_sq_ft_shed".to_owned(), avg_kw_shed * 1000.0 / sq_ft);
        }

        if self.tariff.is_some() {
            let window = CostOptions {
                start_at: Some(start_at.into()),
                end_at: Some(end_at.into()),
                step_count: Some(1),
            };
            let (_, load_cumulative) = self.cost(&window)?;
            let base_series = self
                .baseline_series
                .as_ref()
                .ok_or_else(|| Error::Validation("baseline has not been computed".into()))?;
            let (_, base_cumulative) = self.cost_of(base_series, &window)?;

            let total_load_cost = last_value(&load_cumulative)?;
            let total_base_cost = last_value(&base_cumulative)?;
            if total_base_cost == 0.0 {
                return Err(Error::ZeroDenominator {
                    metric: "total_percent_savings",
                });
            }
            let total_savings = total_base_cost - total_load_cost;
            ep.insert("total_savings".to_owned(), total_savings);
            ep.insert(
                "total_percent_savings".to_owned(),
                total_savings / total_base_cost * 100.0,
            );
        }

        for value in ep.values_mut() {
            *value = round2(*value);
        }
        Ok(ep)
    }

    /// Running energy difference between actual and baseline as a series
    /// (the `cumulative_kwh_diff` component of [`Loadshape::diff`]).
    pub fn cumulative_sum(&mut self, opts: &DiffOptions) -> Result<Series> {
        Ok(self.diff(opts)?.cumulative_kwh_diff)
    }

    /// Tariff cost of the training load over a window.
    pub fn cost(&self, opts: &CostOptions) -> Result<(Series, Series)> {
        self.cost_of(&self.training_load, opts)
    }

    /// Tariff cost of an arbitrary load series over a window. Returns the
    /// per-interval and cumulative cost series.
    pub fn cost_of(&self, load: &Series, opts: &CostOptions) -> Result<(Series, Series)> {
        let tariff = self.tariff.as_ref().ok_or(Error::MissingTariff)?;
        let times = self.output_times(
            opts.start_at.as_ref(),
            opts.end_at.as_ref(),
            900,
            opts.step_count,
        )?;
        tariff.cost(load, &times, self.timezone)
    }

    // --- read-through accessors --- //

    pub fn actual_data(&self, query: &DataQuery) -> Result<Vec<SeriesPoint>> {
        self.training_load.data(query)
    }

    pub fn baseline_data(&self, query: &DataQuery) -> Result<Vec<SeriesPoint>> {
        self.baseline_series
            .as_ref()
            .ok_or_else(|| Error::Validation("baseline has not been computed".into()))?
            .data(query)
    }

    // --- internals --- //

    fn reset_derived(&mut self) {
        self.baseline_series = None;
        self.error_stats = None;
    }

    /// The timestamp grid analytics are computed on. Bounds default to the
    /// training series' span; `step_count` divides the span into that many
    /// equal steps, otherwise `step_size` is used directly.
    fn output_times(
        &self,
        start_at: Option<&TimeInput>,
        end_at: Option<&TimeInput>,
        step_size: i64,
        step_count: Option<u32>,
    ) -> Result<Vec<Timestamp>> {
        let start_at = match start_at {
            Some(t) => time::normalize(t.clone(), self.timezone)?,
            None => self.training_load.start_at()?,
        };
        let end_at = match end_at {
            Some(t) => time::normalize(t.clone(), self.timezone)?,
            None => self.training_load.end_at()?,
        };
        if end_at < start_at {
            return Err(Error::Validation(format!(
                "window end {end_at} precedes start {start_at}"
            )));
        }

        let step = match step_count {
            Some(0) => {
                return Err(Error::Validation("step_count must be positive".into()));
            }
            Some(count) => ((end_at - start_at) / i64::from(count)).max(1),
            None => step_size,
        };
        if step <= 0 {
            return Err(Error::Validation(format!(
                "step_size must be positive, got {step}"
            )));
        }

        let mut times = Vec::new();
        let mut t = start_at;
        while t <= end_at {
            times.push(t);
            t += step;
        }
        Ok(times)
    }
}

fn last_value(series: &Series) -> Result<f64> {
    series
        .points()
        .last()
        .map(|p| p.value)
        .ok_or(Error::EmptySeries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::UTC;
    use std::cell::RefCell;
    use std::rc::Rc;

    // 2013-10-09 00:00:00 UTC, a Wednesday.
    const T0: Timestamp = 1381276800;
    const SPAN: i64 = 4 * 3600;

    fn training_load(kw: f64) -> Series {
        let rows: Vec<(i64, f64)> = (0..=SPAN / 900).map(|i| (T0 + i * 900, kw)).collect();
        Series::new(rows, UTC).unwrap()
    }

    /// Predicts a constant and captures the last request for inspection.
    struct FakeModel {
        value: f64,
        last_request: Rc<RefCell<Option<ModelRequest>>>,
    }

    impl FakeModel {
        fn boxed(value: f64) -> (Box<Self>, Rc<RefCell<Option<ModelRequest>>>) {
            let capture = Rc::new(RefCell::new(None));
            (
                Box::new(Self {
                    value,
                    last_request: Rc::clone(&capture),
                }),
                capture,
            )
        }
    }

    impl BaselineModel for FakeModel {
        fn predict(&self, request: &ModelRequest) -> Result<crate::model::ModelResponse> {
            *self.last_request.borrow_mut() = Some(request.clone());
            Ok(crate::model::ModelResponse {
                predictions: request
                    .prediction_times
                    .iter()
                    .map(|&t| SeriesPoint::new(t, self.value))
                    .collect(),
                error_stats: BTreeMap::from([("rmse".to_owned(), 0.1)]),
            })
        }
    }

    struct FailingModel;

    impl BaselineModel for FailingModel {
        fn predict(&self, _request: &ModelRequest) -> Result<crate::model::ModelResponse> {
            Err(Error::ModelingService {
                status: Some(1),
                stderr: "boom".into(),
            })
        }
    }

    fn flat_tariff_json() -> String {
        format!(
            "{{\"items\":[{{\"energyratestructure/period0/tier1rate\":0.1,\"energyweekdayschedule\":{}}}]}}",
            serde_json::to_string(&vec![0u32; 24]).unwrap()
        )
    }

    #[test]
    fn baseline_stores_series_and_error_stats() {
        let (model, _) = FakeModel::boxed(5.0);
        let mut shape = Loadshape::new(training_load(4.0)).with_model(model);
        assert!(shape.baseline_series().is_none());
        assert!(shape.error_stats().is_none());

        let series = shape.baseline(&BaselineOptions::default()).unwrap();
        assert_eq!(series.len(), (SPAN / 900 + 1) as usize);
        assert_eq!(shape.error_stats().unwrap()["rmse"], 0.1);
    }

    #[test]
    fn diff_implicitly_baselines_first() {
        let (model, _) = FakeModel::boxed(5.0);
        let mut shape = Loadshape::new(training_load(4.0)).with_model(model);

        let diff = shape.diff(&DiffOptions::default()).unwrap();
        assert!(shape.baseline_series().is_some());
        assert_eq!(diff.kw_diff.len(), (SPAN / 900 + 1) as usize);
        // Constant 4 actual against constant 5 baseline.
        assert!((last_value(&diff.kw_diff).unwrap() + 1.0).abs() < 1e-9);
        assert!((last_value(&diff.cumulative_kwh_diff).unwrap() + 4.0).abs() < 1e-9);
        assert!((last_value(&diff.cumulative_kwh_base).unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn failed_baseline_resets_derived_state() {
        let (model, _) = FakeModel::boxed(5.0);
        let mut shape = Loadshape::new(training_load(4.0)).with_model(model);
        shape.baseline(&BaselineOptions::default()).unwrap();
        assert!(shape.baseline_series().is_some());

        shape.set_model(Box::new(FailingModel));
        let err = shape.baseline(&BaselineOptions::default()).unwrap_err();
        assert!(matches!(err, Error::ModelingService { .. }));
        assert!(shape.baseline_series().is_none());
        assert!(shape.error_stats().is_none());
    }

    #[test]
    fn request_contract_covers_temperature_rules() {
        // Temperature present: flag and series cross the port.
        let temp_rows: Vec<(i64, f64)> = (0..=SPAN / 900).map(|i| (T0 + i * 900, 60.0)).collect();
        let (model, capture) = FakeModel::boxed(5.0);
        let mut shape = Loadshape::new(training_load(4.0))
            .with_temperature(
                Series::new(temp_rows.clone(), UTC)
                    .unwrap()
                    .with_temperature_units(crate::series::TemperatureUnits::Celsius),
            )
            .with_model(model);
        shape
            .baseline(&BaselineOptions {
                modeling_interval: 1800,
                ..BaselineOptions::default()
            })
            .unwrap();
        {
            let request = capture.borrow();
            let request = request.as_ref().unwrap();
            assert!(request.temperature.is_some());
            assert!(!request.fahrenheit);
            assert!(request.forecast_temperature.is_none());
            assert_eq!(request.interval_minutes, 30);
            assert_eq!(request.weighting_days, 14);
        }

        // No training temperature: forecast temperature must be omitted too.
        let (model, capture) = FakeModel::boxed(5.0);
        let mut shape = Loadshape::new(training_load(4.0))
            .with_forecast_temperature(Series::new(temp_rows, UTC).unwrap())
            .with_model(model);
        shape.baseline(&BaselineOptions::default()).unwrap();
        let request = capture.borrow();
        let request = request.as_ref().unwrap();
        assert!(request.temperature.is_none());
        assert!(request.forecast_temperature.is_none());
    }

    #[test]
    fn baseline_request_applies_training_exclusions() {
        let (model, capture) = FakeModel::boxed(5.0);
        let mut shape = Loadshape::new(training_load(4.0)).with_model(model);
        shape.add_exclusion(T0, T0 + 1800).unwrap();
        shape.baseline(&BaselineOptions::default()).unwrap();

        let request = capture.borrow();
        let request = request.as_ref().unwrap();
        // Three training points fall inside the excluded window.
        assert_eq!(request.load.len(), (SPAN / 900 + 1) as usize - 3);
        // The prediction grid still covers the full span.
        assert_eq!(request.prediction_times.len(), (SPAN / 900 + 1) as usize);
    }

    #[test]
    fn event_performance_reports_rounded_statistics() {
        let (model, _) = FakeModel::boxed(5.0);
        let mut shape = Loadshape::new(training_load(4.0))
            .with_model(model)
            .with_sq_ft(2000.0)
            .with_tariff(Tariff::from_json_str(&flat_tariff_json()).unwrap());

        let ep = shape.event_performance(T0, T0 + SPAN).unwrap();
        assert_eq!(ep["avg_kw_shed"], 1.0);
        assert_eq!(ep["avg_percent_kw_shed"], 20.0);
        assert_eq!(ep["kwh_reduction"], 4.0);
        assert_eq!(ep["percent_kwh_reduction"], 20.0);
        assert_eq!(ep["avg_w_sq_ft_shed"], 0.5);
        // Actual costs 4 kW x 4 h x $0.10, baseline 5 kW x 4 h x $0.10.
        assert_eq!(ep["total_savings"], 0.4);
        assert_eq!(ep["total_percent_savings"], 20.0);
    }

    #[test]
    fn event_performance_rejects_zero_baseline() {
        let (model, _) = FakeModel::boxed(0.0);
        let mut shape = Loadshape::new(training_load(4.0)).with_model(model);
        assert!(matches!(
            shape.event_performance(T0, T0 + SPAN),
            Err(Error::ZeroDenominator { .. })
        ));
    }

    #[test]
    fn cumulative_sum_returns_running_difference() {
        let (model, _) = FakeModel::boxed(5.0);
        let mut shape = Loadshape::new(training_load(4.0)).with_model(model);
        let series = shape.cumulative_sum(&DiffOptions::default()).unwrap();
        assert_eq!(series.len(), (SPAN / 900 + 1) as usize);
        assert!((last_value(&series).unwrap() + 4.0).abs() < 1e-9);
        // Monotone decreasing: the actual load sits below the baseline.
        let values = series.values();
        assert!(values.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn cost_requires_a_tariff() {
        let shape = Loadshape::new(training_load(4.0));
        assert!(matches!(
            shape.cost(&CostOptions::default()),
            Err(Error::MissingTariff)
        ));
    }

    #[test]
    fn step_count_one_yields_two_point_grid() {
        let (model, _) = FakeModel::boxed(5.0);
        let mut shape = Loadshape::new(training_load(4.0)).with_model(model);
        let diff = shape
            .diff(&DiffOptions {
                start_at: Some(T0.into()),
                end_at: Some((T0 + SPAN).into()),
                step_count: Some(1),
                ..DiffOptions::default()
            })
            .unwrap();
        assert_eq!(diff.kw_diff.len(), 2);
    }

    #[test]
    fn baseline_data_requires_baseline() {
        let shape = Loadshape::new(training_load(4.0));
        assert!(shape.baseline_data(&DataQuery::new()).is_err());
        assert_eq!(
            shape.actual_data(&DataQuery::new().raw()).unwrap().len(),
            (SPAN / 900 + 1) as usize
        );
    }
}
