//! Script-backed baseline model.
//!
//! Mirrors the classic integration where the statistical model lives in an
//! external executable (historically an R script): the request is written out
//! as temporary CSV files, the executable is invoked with `--flag=path`
//! arguments, and its two output files (predicted baseline, error statistics)
//! are read back. Timestamps cross the boundary as local-time strings.
//!
//! A non-success exit surfaces as [`Error::ModelingService`] with the
//! captured stderr attached; the call is never retried here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::{BaselineModel, ModelRequest, ModelResponse};
use crate::series::{Series, SeriesPoint, write_table};

pub struct ScriptModel {
    command: PathBuf,
}

impl ScriptModel {
    /// A model backed by the executable at `command`.
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl BaselineModel for ScriptModel {
    fn predict(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let dir = tempfile::tempdir()?;

        let load_path = write_points(dir.path(), "load.csv", &request.load, request)?;
        let times: Vec<SeriesPoint> = request
            .prediction_times
            .iter()
            .map(|&t| SeriesPoint::new(t, 0.0))
            .collect();
        let times_path = write_points(dir.path(), "prediction_times.csv", &times, request)?;
        let baseline_path = dir.path().join("baseline.csv");
        let stats_path = dir.path().join("error_stats.csv");

        let mut cmd = Command::new(&self.command);
        cmd.arg(format!("--loadFile={}", load_path.display()))
            .arg(format!("--timeStampFile={}", times_path.display()))
            .arg(format!("--outputBaselineFile={}", baseline_path.display()))
            .arg(format!("--errorStatisticsFile={}", stats_path.display()))
            .arg(format!("--timescaleDays={}", request.weighting_days))
            .arg(format!("--intervalMinutes={}", request.interval_minutes));

        if let Some(temperature) = &request.temperature {
            let temp_path = write_points(dir.path(), "temperature.csv", temperature, request)?;
            cmd.arg(format!("--temperatureFile={}", temp_path.display()));
            cmd.arg(format!(
                "--fahrenheit={}",
                if request.fahrenheit { "TRUE" } else { "FALSE" }
            ));

            if let Some(forecast) = &request.forecast_temperature {
                let forecast_path =
                    write_points(dir.path(), "forecast_temperature.csv", forecast, request)?;
                cmd.arg(format!("--predictTemperatureFile={}", forecast_path.display()));
            }
        }

        info!(command = %self.command.display(), "running baseline model script");
        let output = cmd.output()?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            info!(target: "loadshape::model::script", "{line}");
        }
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        for line in stderr.lines() {
            warn!(target: "loadshape::model::script", "{line}");
        }

        if !output.status.success() {
            return Err(Error::ModelingService {
                status: output.status.code(),
                stderr,
            });
        }

        let predictions = Series::from_csv_path(&baseline_path, request.timezone, 1)
            .map_err(|e| Error::ModelOutput(format!("baseline file unreadable: {e}")))?
            .points()
            .to_vec();
        let error_stats = read_error_stats(&stats_path)?;

        Ok(ModelResponse {
            predictions,
            error_stats,
        })
    }
}

fn write_points(
    dir: &Path,
    name: &str,
    points: &[SeriesPoint],
    request: &ModelRequest,
) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, write_table(points, request.timezone)?)?;
    Ok(path)
}

/// Error-statistics file: `name,value` rows; names are lowercased, values
/// parsed as floats. Keys are otherwise passed through uninterpreted.
fn read_error_stats(path: &Path) -> Result<BTreeMap<String, f64>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::ModelOutput(format!("error statistics file unreadable: {e}")))?;
    let mut stats = BTreeMap::new();
    for line in text.lines() {
        let Some((name, value)) = line.split_once(',') else {
            continue;
        };
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| Error::ModelOutput(format!("bad error statistic row: {line}")))?;
        stats.insert(name.trim().to_lowercase(), value);
    }
    Ok(stats)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use chrono_tz::America::Los_Angeles;
    use std::os::unix::fs::PermissionsExt;

    fn install_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("model.sh");
        std::fs::write(&path, body).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn request() -> ModelRequest {
        ModelRequest {
            load: vec![
                SeriesPoint::new(1381561200, 1.0),
                SeriesPoint::new(1381562100, 2.0),
            ],
            prediction_times: vec![1381561200, 1381562100],
            temperature: None,
            forecast_temperature: None,
            fahrenheit: true,
            weighting_days: 14,
            interval_minutes: 15,
            timezone: Los_Angeles,
        }
    }

    #[test]
    fn parses_script_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let script = install_script(
            dir.path(),
            r#"#!/bin/sh
out=""
stats=""
for a in "$@"; do
  case "$a" in
    --outputBaselineFile=*) out="${a#--outputBaselineFile=}" ;;
    --errorStatisticsFile=*) stats="${a#--errorStatisticsFile=}" ;;
  esac
done
printf '2013-10-12 00:00:00,1.5\n2013-10-12 00:15:00,2.5\n' > "$out"
printf 'RMSE,0.25\nMAPE,3.5\n' > "$stats"
"#,
        );

        let resp = ScriptModel::new(&script).predict(&request()).unwrap();
        assert_eq!(
            resp.predictions,
            vec![
                SeriesPoint::new(1381561200, 1.5),
                SeriesPoint::new(1381562100, 2.5),
            ]
        );
        assert_eq!(resp.error_stats["rmse"], 0.25);
        assert_eq!(resp.error_stats["mape"], 3.5);
    }

    #[test]
    fn surfaces_script_failure_with_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let script = install_script(
            dir.path(),
            "#!/bin/sh\necho 'model exploded' >&2\nexit 7\n",
        );

        let err = ScriptModel::new(&script).predict(&request()).unwrap_err();
        match err {
            Error::ModelingService { status, stderr } => {
                assert_eq!(status, Some(7));
                assert!(stderr.contains("model exploded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
