//! libIGCM simulation cards (`run.card`, `config.card`).

use crate::error::{NcTimeError, Result};
use anyhow::{Context, bail};
use std::path::{Path, PathBuf};

pub const RUN_CARD: &str = "run.card";
pub const CONFIG_CARD: &str = "config.card";

/// Years covered by a simulation, as recorded in its run table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedPeriod {
    pub first_year: i64,
    pub last_year: i64,
}

impl SimulatedPeriod {
    /// `YYYY` timestamps usable as `--start`/`--end`.
    pub fn as_timestamps(&self) -> (String, String) {
        (
            format!("{:04}", self.first_year),
            format!("{:04}", self.last_year),
        )
    }
}

fn run_card(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(RUN_CARD);
    if !path.is_file() {
        return Err(NcTimeError::NoRunCardFound(dir.display().to_string()).into());
    }
    Ok(path)
}

/// Whether `[Configuration] PeriodState` of `run.card` is `Completed`.
pub fn is_simulation_completed(dir: &Path) -> Result<bool> {
    let path = run_card(dir)?;
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let state = section_value(&content, "Configuration", "PeriodState");
    tracing::debug!(state = ?state, "Read simulation state from run.card");
    Ok(state.as_deref() == Some("Completed"))
}

/// First and last simulated years from the `run.card` run table.
///
/// Both `run.card` and `config.card` must be present in `dir`.
pub fn simulated_period(dir: &Path) -> Result<SimulatedPeriod> {
    let path = run_card(dir)?;
    if !dir.join(CONFIG_CARD).is_file() {
        return Err(NcTimeError::NoConfigCardFound(dir.display().to_string()).into());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    // Run table rows have 8 separators; the first one is the header.
    let rows: Vec<&str> = content
        .lines()
        .filter(|line| line.matches('|').count() == 8)
        .skip(1)
        .collect();
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        bail!("No run table in {}", path.display());
    };
    let year = |row: &str, field: usize| -> Result<i64> {
        row.split('|')
            .nth(field)
            .map(str::trim)
            .and_then(|date| date.get(..4))
            .and_then(|y| y.parse().ok())
            .with_context(|| format!("Malformed run table row in {}: {row}", path.display()))
    };
    Ok(SimulatedPeriod {
        first_year: year(first, 1)?,
        last_year: year(last, 2)?,
    })
}

/// Value of `key` in `[section]` of an INI-like card, without quotes.
fn section_value(content: &str, section: &str, key: &str) -> Option<String> {
    let mut in_section = false;
    for line in content.lines().map(str::trim) {
        if line.starts_with('#') || line.is_empty() {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_section = name.trim().eq_ignore_ascii_case(section);
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some((k, v)) = line.split_once('=')
            && k.trim().eq_ignore_ascii_case(key)
        {
            return Some(v.trim().trim_matches('"').to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use tempfile::TempDir;

    const RUN_CARD_CONTENT: &str = r#"[Configuration]
#lastPREFIX
OldPrefix= CM61_18891231
PeriodDateBegin= 1890-01-01
PeriodState= "Completed"
CumulPeriod= 40

[PostProcessing]
TimeSeriesRunning=n

#==================================
#  CumulPeriod |  PeriodDateBegin |   PeriodDateEnd |        RunDateBegin |          RunDateEnd |  RealCpuTime |  UserCpuTime |  SysCpuTime |
#  1           |         18500101 |        18501231 | 2017-01-01T00:00:00 | 2017-01-01T06:00:00 |     100.0000 |      90.0000 |      1.0000 |
#  2           |         18510101 |        18511231 | 2017-01-01T06:00:00 | 2017-01-01T12:00:00 |     100.0000 |      90.0000 |      1.0000 |
#  40          |         18890101 |        18891231 | 2017-01-10T06:00:00 | 2017-01-10T12:00:00 |     100.0000 |      90.0000 |      1.0000 |
"#;

    fn cards(run: Option<&str>, config: bool) -> TempDir {
        let dir = TempDir::new().unwrap();
        if let Some(content) = run {
            std::fs::write(dir.path().join(RUN_CARD), content).unwrap();
        }
        if config {
            std::fs::write(dir.path().join(CONFIG_CARD), "[UserChoices]\n").unwrap();
        }
        dir
    }

    #[test]
    fn reads_completion_state() {
        let dir = cards(Some(RUN_CARD_CONTENT), false);
        check!(is_simulation_completed(dir.path()).unwrap());

        let running = RUN_CARD_CONTENT.replace("\"Completed\"", "\"OnQueue\"");
        let dir = cards(Some(&running), false);
        check!(!is_simulation_completed(dir.path()).unwrap());
    }

    #[test]
    fn reads_simulated_period() {
        let dir = cards(Some(RUN_CARD_CONTENT), true);
        let_assert!(Ok(period) = simulated_period(dir.path()));
        check!(period == SimulatedPeriod { first_year: 1850, last_year: 1889 });
        check!(period.as_timestamps() == ("1850".to_string(), "1889".to_string()));
    }

    #[test]
    fn missing_cards_are_reported() {
        let dir = cards(None, true);
        let err = is_simulation_completed(dir.path()).unwrap_err();
        let_assert!(Some(NcTimeError::NoRunCardFound(_)) = err.downcast_ref::<NcTimeError>());

        let dir = cards(Some(RUN_CARD_CONTENT), false);
        let err = simulated_period(dir.path()).unwrap_err();
        let_assert!(Some(NcTimeError::NoConfigCardFound(_)) = err.downcast_ref::<NcTimeError>());
    }
}
