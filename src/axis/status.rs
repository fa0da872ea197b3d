//! Diagnostic status codes of the time axis checker.

use crate::error::NcTimeError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusCode {
    /// 000
    Ok,
    /// 001
    WrongAxis,
    /// 002
    UnitsChanged,
    /// 003
    EndTimestampMismatch,
    /// 004
    InstantWithBounds,
    /// 005
    AveragedWithoutBounds,
    /// 006
    WrongBounds,
    /// 007
    CalendarChanged,
    /// 008
    EndDateMismatch,
}

impl StatusCode {
    pub const ALL: [Self; 9] = [
        Self::Ok,
        Self::WrongAxis,
        Self::UnitsChanged,
        Self::EndTimestampMismatch,
        Self::InstantWithBounds,
        Self::AveragedWithoutBounds,
        Self::WrongBounds,
        Self::CalendarChanged,
        Self::EndDateMismatch,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            Self::Ok => "000",
            Self::WrongAxis => "001",
            Self::UnitsChanged => "002",
            Self::EndTimestampMismatch => "003",
            Self::InstantWithBounds => "004",
            Self::AveragedWithoutBounds => "005",
            Self::WrongBounds => "006",
            Self::CalendarChanged => "007",
            Self::EndDateMismatch => "008",
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            Self::Ok => "Time axis seems OK",
            Self::WrongAxis => "Incorrect time axis over one or several time steps",
            Self::UnitsChanged => "Time units must be unchanged for the same dataset",
            Self::EndTimestampMismatch => {
                "Last date timestamp differs from the end timestamp of the filename"
            }
            Self::InstantWithBounds => {
                "An instantaneous time axis should not embed time boundaries"
            }
            Self::AveragedWithoutBounds => "An averaged time axis should embed time boundaries",
            Self::WrongBounds => "Incorrect time bounds over one or several time steps",
            Self::CalendarChanged => "Calendar must be unchanged for the same dataset",
            Self::EndDateMismatch => "Last date differs from the end date of the filename",
        }
    }

    /// Codes that can be fixed by rewriting the time axis values and attributes.
    pub const fn needs_axis_rewrite(self) -> bool {
        matches!(
            self,
            Self::WrongAxis | Self::UnitsChanged | Self::WrongBounds | Self::CalendarChanged
        )
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl FromStr for StatusCode {
    type Err = NcTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.code() == code)
            .ok_or_else(|| NcTimeError::InvalidStatusCode(s.to_string()))
    }
}

impl Serialize for StatusCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use rstest::rstest;

    #[rstest]
    #[case("000", StatusCode::Ok)]
    #[case("003", StatusCode::EndTimestampMismatch)]
    #[case(" 008", StatusCode::EndDateMismatch)]
    fn parses_codes(#[case] text: &str, #[case] expected: StatusCode) {
        let_assert!(Ok(code) = text.parse::<StatusCode>());
        check!(code == expected);
    }

    #[test]
    fn rejects_unknown_codes() {
        check!("9".parse::<StatusCode>().is_err());
        check!("042".parse::<StatusCode>().is_err());
    }

    #[test]
    fn display_pairs_code_and_message() {
        check!(StatusCode::WrongAxis.to_string() == "001: Incorrect time axis over one or several time steps");
    }
}
