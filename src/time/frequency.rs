//! MIP frequencies and the time increment between two consecutive steps.

use crate::error::NcTimeError;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use super::units::TimeUnit;

/// Table name used for the frequency defaults shared by every MIP table.
pub const DEFAULT_TABLE: &str = "None";

/// Keyword of `--set-inc` matching every table or every frequency.
pub const ALL: &str = "all";

/// Default increments, keyed by (table, frequency).
const DEFAULT_INCREMENTS: &[(&str, &str, u32, TimeUnit)] = &[
    (DEFAULT_TABLE, "subhr", 30, TimeUnit::Minutes),
    (DEFAULT_TABLE, "subhrPt", 30, TimeUnit::Minutes),
    (DEFAULT_TABLE, "1hr", 1, TimeUnit::Hours),
    (DEFAULT_TABLE, "1hrPt", 1, TimeUnit::Hours),
    (DEFAULT_TABLE, "1hrCM", 1, TimeUnit::Hours),
    (DEFAULT_TABLE, "3hr", 3, TimeUnit::Hours),
    (DEFAULT_TABLE, "3hrPt", 3, TimeUnit::Hours),
    (DEFAULT_TABLE, "6hr", 6, TimeUnit::Hours),
    (DEFAULT_TABLE, "6hrPt", 6, TimeUnit::Hours),
    (DEFAULT_TABLE, "day", 1, TimeUnit::Days),
    (DEFAULT_TABLE, "mon", 1, TimeUnit::Months),
    (DEFAULT_TABLE, "monPt", 1, TimeUnit::Months),
    (DEFAULT_TABLE, "monC", 1, TimeUnit::Months),
    (DEFAULT_TABLE, "monClim", 1, TimeUnit::Months),
    (DEFAULT_TABLE, "yr", 1, TimeUnit::Years),
    (DEFAULT_TABLE, "yrPt", 1, TimeUnit::Years),
    (DEFAULT_TABLE, "dec", 10, TimeUnit::Years),
    ("cfSites", "subhr", 30, TimeUnit::Minutes),
    ("CFsubhr", "subhrPt", 30, TimeUnit::Minutes),
    ("Esubhr", "subhrPt", 30, TimeUnit::Minutes),
    ("E1hrClimMon", "1hrCM", 1, TimeUnit::Hours),
];

/// Time between two consecutive steps of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Increment {
    pub value: u32,
    pub unit: TimeUnit,
}

impl Increment {
    pub const fn new(value: u32, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    pub fn step(&self) -> f64 {
        f64::from(self.value)
    }
}

impl fmt::Display for Increment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// Increments per (table, frequency), with the [`DEFAULT_TABLE`] as fallback.
#[derive(Debug, Clone)]
pub struct IncrementTable {
    entries: BTreeMap<(String, String), Increment>,
}

impl Default for IncrementTable {
    fn default() -> Self {
        let entries = DEFAULT_INCREMENTS
            .iter()
            .map(|&(table, frequency, value, unit)| {
                ((table.to_string(), frequency.to_string()), Increment::new(value, unit))
            })
            .collect();
        Self { entries }
    }
}

impl IncrementTable {
    pub fn lookup(&self, table: &str, frequency: &str) -> Result<Increment, NcTimeError> {
        self.entries
            .get(&(table.to_string(), frequency.to_string()))
            .or_else(|| {
                self.entries
                    .get(&(DEFAULT_TABLE.to_string(), frequency.to_string()))
            })
            .copied()
            .ok_or_else(|| NcTimeError::InvalidFrequency(frequency.to_string()))
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.entries.keys().any(|(t, _)| t == table)
    }

    pub fn has_frequency(&self, frequency: &str) -> bool {
        self.entries.keys().any(|(_, f)| f == frequency)
    }

    /// Apply an override; [`ALL`] matches every known table or frequency.
    ///
    /// Both names must already be known. A table-wide override only updates the
    /// rows that table already has.
    pub fn apply(&mut self, rule: &IncrementOverride) -> Result<(), NcTimeError> {
        if rule.table != ALL && !self.has_table(&rule.table) {
            return Err(NcTimeError::InvalidTable(rule.table.clone()));
        }
        if rule.frequency != ALL && !self.has_frequency(&rule.frequency) {
            return Err(NcTimeError::InvalidFrequency(rule.frequency.clone()));
        }

        match (rule.table == ALL, rule.frequency == ALL) {
            (false, false) => {
                self.entries.insert(
                    (rule.table.clone(), rule.frequency.clone()),
                    rule.increment,
                );
            }
            _ => {
                for ((table, frequency), increment) in &mut self.entries {
                    let table_matches = rule.table == ALL || *table == rule.table;
                    let frequency_matches = rule.frequency == ALL || *frequency == rule.frequency;
                    if table_matches && frequency_matches {
                        *increment = rule.increment;
                    }
                }
            }
        }
        Ok(())
    }
}

static OVERRIDE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<table>[^:=]+):(?P<frequency>[^:=]+)=(?P<value>\d+)(?P<unit>[smhDMY])$")
        .expect("override pattern is valid")
});

/// A `TABLE:FREQUENCY=<value><unit>` increment override, e.g. `Amon:mon=1M`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementOverride {
    pub table: String,
    pub frequency: String,
    pub increment: Increment,
}

impl FromStr for IncrementOverride {
    type Err = NcTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NcTimeError::InvalidFrequency(s.to_string());
        let caps = OVERRIDE_PATTERN.captures(s.trim()).ok_or_else(invalid)?;
        let value = caps["value"].parse().map_err(|_| invalid())?;
        let unit = caps["unit"]
            .chars()
            .next()
            .and_then(TimeUnit::from_letter)
            .ok_or_else(invalid)?;
        Ok(Self {
            table: caps["table"].to_string(),
            frequency: caps["frequency"].to_string(),
            increment: Increment::new(value, unit),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use rstest::rstest;

    #[rstest]
    #[case("Amon", "mon", Increment::new(1, TimeUnit::Months))]
    #[case("3hr", "3hr", Increment::new(3, TimeUnit::Hours))]
    #[case("None", "dec", Increment::new(10, TimeUnit::Years))]
    #[case("CFsubhr", "subhrPt", Increment::new(30, TimeUnit::Minutes))]
    #[case("day", "day", Increment::new(1, TimeUnit::Days))]
    fn default_increments(#[case] table: &str, #[case] frequency: &str, #[case] expected: Increment) {
        let_assert!(Ok(increment) = IncrementTable::default().lookup(table, frequency));
        check!(increment == expected);
    }

    #[test]
    fn unknown_frequency_is_an_error() {
        let_assert!(
            Err(NcTimeError::InvalidFrequency(frequency)) =
                IncrementTable::default().lookup("Amon", "fortnight")
        );
        check!(frequency == "fortnight");
    }

    #[test]
    fn parses_overrides() {
        let_assert!(Ok(rule) = "Amon:mon=2M".parse::<IncrementOverride>());
        check!(rule.table == "Amon");
        check!(rule.frequency == "mon");
        check!(rule.increment == Increment::new(2, TimeUnit::Months));

        check!("Amon:mon=2W".parse::<IncrementOverride>().is_err());
        check!("Amon=2M".parse::<IncrementOverride>().is_err());
    }

    #[test]
    fn override_all_tables_for_a_frequency() {
        let mut table = IncrementTable::default();
        let rule = "all:subhr=15m".parse().unwrap();
        table.apply(&rule).unwrap();
        check!(table.lookup("cfSites", "subhr").unwrap() == Increment::new(15, TimeUnit::Minutes));
        check!(table.lookup("None", "subhr").unwrap() == Increment::new(15, TimeUnit::Minutes));
        check!(table.lookup("None", "subhrPt").unwrap() == Increment::new(30, TimeUnit::Minutes));
    }

    #[test]
    fn override_for_a_specific_table_takes_precedence() {
        let mut table = IncrementTable::default();
        table.apply(&"cfSites:mon=3M".parse().unwrap()).unwrap();
        check!(table.lookup("cfSites", "mon").unwrap() == Increment::new(3, TimeUnit::Months));
        check!(table.lookup("Amon", "mon").unwrap() == Increment::new(1, TimeUnit::Months));
    }

    #[test]
    fn table_wide_override_only_updates_existing_rows() {
        let mut table = IncrementTable::default();
        table.apply(&"cfSites:all=10m".parse().unwrap()).unwrap();
        check!(table.lookup("cfSites", "subhr").unwrap() == Increment::new(10, TimeUnit::Minutes));
        check!(table.lookup("cfSites", "mon").unwrap() == Increment::new(1, TimeUnit::Months));
        check!(table.lookup("None", "subhr").unwrap() == Increment::new(30, TimeUnit::Minutes));
    }

    #[rstest]
    #[case("NotATable:mon=2M")]
    #[case("Amon:mon=2M")]
    #[case("A mon:mon=1M")]
    #[case("NotATable:all=1D")]
    fn override_rejects_unknown_tables(#[case] rule: &str) {
        let mut table = IncrementTable::default();
        let_assert!(Err(NcTimeError::InvalidTable(_)) = table.apply(&rule.parse().unwrap()));
    }

    #[test]
    fn override_rejects_unknown_frequencies() {
        let mut table = IncrementTable::default();
        let_assert!(
            Err(NcTimeError::InvalidFrequency(_)) = table.apply(&"None:weekly=7D".parse().unwrap())
        );
    }
}
