//! In-process baseline model.
//!
//! Load is modeled as a function of time-of-week, with an optional linear
//! temperature adjustment:
//!
//! - training points are bucketed by local time-of-week at the modeling
//!   interval's resolution
//! - a prediction for time `t` is a recency-weighted estimate over the
//!   training points in `t`'s bucket, with weights `exp(-age / weighting)`
//!   so the most recent comparable intervals dominate
//! - when temperature is known for both the bucket's training points and the
//!   prediction time, a weighted least-squares fit of `load ~ [1, temp]`
//!   replaces the plain weighted mean; otherwise temperature is ignored for
//!   that prediction
//!
//! Error statistics are computed in-sample: the model re-predicts the
//! training timestamps and reports `rmse`, `mape`, and `n`.

use std::collections::BTreeMap;
use std::collections::HashMap;

use chrono::{Datelike, Timelike};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{BaselineModel, ModelRequest, ModelResponse};
use crate::series::{SeriesPoint, interp};
use crate::time::{self, Timestamp};

/// Minimum bucket population for the temperature fit; below this the model
/// falls back to the weighted mean.
const MIN_FIT_SAMPLES: usize = 3;

/// Minimum temperature spread (degrees) for a meaningful slope.
const MIN_TEMP_SPREAD: f64 = 1.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct RegressionModel;

impl RegressionModel {
    pub fn new() -> Self {
        Self
    }
}

impl BaselineModel for RegressionModel {
    fn predict(&self, request: &ModelRequest) -> Result<ModelResponse> {
        if request.load.len() < 2 {
            return Err(Error::InsufficientData(request.load.len()));
        }
        if request.interval_minutes == 0 {
            return Err(Error::Validation("modeling interval must be positive".into()));
        }

        let fit = Fit::new(request)?;
        debug!(
            buckets = fit.buckets.len(),
            n = request.load.len(),
            "fitted time-of-week buckets"
        );

        let forecast = request.forecast_temperature.as_deref();
        let mut predictions = Vec::with_capacity(request.prediction_times.len());
        for &t in &request.prediction_times {
            let temp = forecast.and_then(|pts| temperature_at(pts, t));
            predictions.push(SeriesPoint::new(t, fit.estimate(t, temp)?));
        }

        // In-sample residuals against the training temperatures.
        let training_temp = request.temperature.as_deref();
        let mut sq_sum = 0.0;
        let mut ape_sum = 0.0;
        let mut ape_n = 0usize;
        for p in &request.load {
            let temp = training_temp.and_then(|pts| temperature_at(pts, p.timestamp));
            let fitted = fit.estimate(p.timestamp, temp)?;
            let resid = p.value - fitted;
            sq_sum += resid * resid;
            if p.value.abs() > f64::EPSILON {
                ape_sum += (resid / p.value).abs();
                ape_n += 1;
            }
        }
        let n = request.load.len() as f64;

        let mut error_stats = BTreeMap::new();
        error_stats.insert("rmse".to_owned(), (sq_sum / n).sqrt());
        if ape_n > 0 {
            error_stats.insert("mape".to_owned(), 100.0 * ape_sum / ape_n as f64);
        }
        error_stats.insert("n".to_owned(), n);

        Ok(ModelResponse {
            predictions,
            error_stats,
        })
    }
}

/// The fitted state shared by prediction and in-sample scoring.
struct Fit<'r> {
    request: &'r ModelRequest,
    /// Time-of-week bucket -> indices into `request.load`.
    buckets: HashMap<u32, Vec<usize>>,
    /// Recency-weighting time scale, seconds.
    tau: f64,
}

impl<'r> Fit<'r> {
    fn new(request: &'r ModelRequest) -> Result<Self> {
        let mut buckets: HashMap<u32, Vec<usize>> = HashMap::new();
        for (idx, p) in request.load.iter().enumerate() {
            let bucket = time_of_week_bucket(p.timestamp, request)?;
            buckets.entry(bucket).or_default().push(idx);
        }
        Ok(Self {
            request,
            buckets,
            tau: f64::from(request.weighting_days.max(1)) * 86_400.0,
        })
    }

    fn estimate(&self, t: Timestamp, temp: Option<f64>) -> Result<f64> {
        let bucket = time_of_week_bucket(t, self.request)?;
        // A bucket with no training data falls back to the whole set.
        let all: Vec<usize>;
        let candidates = match self.buckets.get(&bucket) {
            Some(idx) if !idx.is_empty() => idx,
            _ => {
                all = (0..self.request.load.len()).collect();
                &all
            }
        };

        let weights: Vec<f64> = candidates
            .iter()
            .map(|&i| {
                let age = (t - self.request.load[i].timestamp).abs() as f64;
                (-age / self.tau).exp()
            })
            .collect();

        if let Some(temp_now) = temp {
            if let Some(v) = self.temperature_fit(candidates, &weights, temp_now) {
                return Ok(v);
            }
        }
        Ok(weighted_mean(&self.request.load, candidates, &weights))
    }

    /// Weighted least-squares `load ~ [1, temp]` over the bucket, evaluated
    /// at `temp_now`. Returns `None` when the bucket cannot support the fit.
    fn temperature_fit(&self, candidates: &[usize], weights: &[f64], temp_now: f64) -> Option<f64> {
        let training_temp = self.request.temperature.as_deref()?;

        let mut rows: Vec<(f64, f64, f64)> = Vec::with_capacity(candidates.len());
        for (&i, &w) in candidates.iter().zip(weights) {
            let p = self.request.load[i];
            let temp = temperature_at(training_temp, p.timestamp)?;
            rows.push((w, temp, p.value));
        }
        if rows.len() < MIN_FIT_SAMPLES {
            return None;
        }
        let t_min = rows.iter().map(|r| r.1).fold(f64::INFINITY, f64::min);
        let t_max = rows.iter().map(|r| r.1).fold(f64::NEG_INFINITY, f64::max);
        if t_max - t_min < MIN_TEMP_SPREAD {
            return None;
        }

        // Scale rows by sqrt(w) and solve ordinary least squares by SVD.
        let mut x = DMatrix::zeros(rows.len(), 2);
        let mut y = DVector::zeros(rows.len());
        for (r, &(w, temp, load)) in rows.iter().enumerate() {
            let sw = w.sqrt();
            x[(r, 0)] = sw;
            x[(r, 1)] = sw * temp;
            y[r] = sw * load;
        }
        let beta = solve_least_squares(&x, &y)?;
        Some(beta[0] + beta[1] * temp_now)
    }
}

fn weighted_mean(load: &[SeriesPoint], candidates: &[usize], weights: &[f64]) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for (&i, &w) in candidates.iter().zip(weights) {
        num += w * load[i].value;
        den += w;
    }
    if den > 0.0 {
        num / den
    } else {
        // All weights underflowed; plain mean of the candidates.
        candidates.iter().map(|&i| load[i].value).sum::<f64>() / candidates.len() as f64
    }
}

/// Local time-of-week bucket at the modeling interval's resolution.
fn time_of_week_bucket(ts: Timestamp, request: &ModelRequest) -> Result<u32> {
    let local = time::to_local(ts, request.timezone)?;
    let second_of_week =
        local.weekday().num_days_from_monday() * 86_400 + local.num_seconds_from_midnight();
    Ok(second_of_week / (request.interval_minutes * 60))
}

/// Temperature at `ts`, linearly interpolated; `None` outside the series'
/// stored range so temperature is never extrapolated into windows it does
/// not cover.
fn temperature_at(points: &[SeriesPoint], ts: Timestamp) -> Option<f64> {
    let first = points.first()?;
    let last = points.last()?;
    if ts < first.timestamp || ts > last.timestamp {
        return None;
    }
    Some(interp(points, ts))
}

/// Least-squares solve by SVD, trying progressively looser tolerances so
/// nearly collinear designs still produce a usable solution.
fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::UTC;

    const T0: Timestamp = 1379487600;
    const WEEK: i64 = 7 * 86_400;

    fn request(load: Vec<SeriesPoint>, prediction_times: Vec<Timestamp>) -> ModelRequest {
        ModelRequest {
            load,
            prediction_times,
            temperature: None,
            forecast_temperature: None,
            fahrenheit: true,
            weighting_days: 14,
            interval_minutes: 15,
            timezone: UTC,
        }
    }

    #[test]
    fn constant_load_predicts_constant() {
        let load: Vec<SeriesPoint> = (0..4 * 96)
            .map(|i| SeriesPoint::new(T0 + i * 900, 3.5))
            .collect();
        let times = vec![T0 + 4 * 96 * 900, T0 + 4 * 96 * 900 + 900];
        let resp = RegressionModel::new().predict(&request(load, times)).unwrap();
        assert_eq!(resp.predictions.len(), 2);
        for p in &resp.predictions {
            assert!((p.value - 3.5).abs() < 1e-9);
        }
        assert!(resp.error_stats["rmse"] < 1e-9);
    }

    #[test]
    fn weekly_pattern_is_reproduced() {
        // Two weeks of a load that depends only on time-of-week.
        let shape = |ts: i64| ((ts % WEEK) / 900 % 7) as f64 + 1.0;
        let load: Vec<SeriesPoint> = (0..2 * 7 * 96)
            .map(|i| {
                let ts = T0 + i * 900;
                SeriesPoint::new(ts, shape(ts))
            })
            .collect();
        // Predict the following week.
        let times: Vec<Timestamp> = (0..7 * 96).map(|i| T0 + 2 * WEEK + i * 900).collect();
        let resp = RegressionModel::new()
            .predict(&request(load, times))
            .unwrap();
        for p in &resp.predictions {
            assert!(
                (p.value - shape(p.timestamp)).abs() < 1e-6,
                "bucket estimate diverged at {}",
                p.timestamp
            );
        }
    }

    #[test]
    fn temperature_adjustment_tracks_forecast() {
        // Load is a pure function of temperature; one bucket spans the whole
        // week so the fit sees every sample.
        let temp = |i: i64| 60.0 + (i % 40) as f64;
        let load: Vec<SeriesPoint> = (0..7 * 96)
            .map(|i| SeriesPoint::new(T0 + i * 900, 1.0 + 0.5 * temp(i)))
            .collect();
        let training_temp: Vec<SeriesPoint> = (0..7 * 96)
            .map(|i| SeriesPoint::new(T0 + i * 900, temp(i)))
            .collect();

        let horizon = T0 + WEEK;
        let forecast: Vec<SeriesPoint> = (0..4)
            .map(|i| SeriesPoint::new(horizon + i * 900, 90.0))
            .collect();

        let mut req = request(load, (0..4).map(|i| horizon + i * 900).collect());
        req.temperature = Some(training_temp);
        req.forecast_temperature = Some(forecast);
        req.interval_minutes = 7 * 24 * 60;

        let resp = RegressionModel::new().predict(&req).unwrap();
        for p in &resp.predictions {
            assert!((p.value - 46.0).abs() < 1e-6, "got {}", p.value);
        }
    }

    #[test]
    fn missing_forecast_falls_back_to_load_history() {
        let load: Vec<SeriesPoint> = (0..7 * 96)
            .map(|i| SeriesPoint::new(T0 + i * 900, 2.0))
            .collect();
        let training_temp: Vec<SeriesPoint> = (0..7 * 96)
            .map(|i| SeriesPoint::new(T0 + i * 900, 60.0 + (i % 10) as f64))
            .collect();

        let mut req = request(load, vec![T0 + WEEK]);
        req.temperature = Some(training_temp);
        // No forecast temperature at all: prediction must still succeed.
        let resp = RegressionModel::new().predict(&req).unwrap();
        assert!((resp.predictions[0].value - 2.0).abs() < 1e-9);
    }

    #[test]
    fn error_stats_use_lowercase_keys() {
        let load: Vec<SeriesPoint> = (0..96).map(|i| SeriesPoint::new(T0 + i * 900, 1.0)).collect();
        let resp = RegressionModel::new()
            .predict(&request(load, vec![T0]))
            .unwrap();
        for key in resp.error_stats.keys() {
            assert_eq!(key, &key.to_lowercase());
        }
        assert!(resp.error_stats.contains_key("rmse"));
        assert_eq!(resp.error_stats["n"], 96.0);
    }

    #[test]
    fn rejects_undersized_training_sets() {
        let resp = RegressionModel::new().predict(&request(vec![SeriesPoint::new(T0, 1.0)], vec![T0]));
        assert!(matches!(resp, Err(Error::InsufficientData(1))));
    }
}
