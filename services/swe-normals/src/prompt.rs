//! Interactive resolution of the target (year, month).

use std::io::{BufRead, Write};

use chrono::NaiveDate;
use swe_common::{SweError, SweResult, TargetPeriod};

/// Prompts for a year, then a month, defaulting both to `today`.
///
/// The year is validated before the month is asked for, so an invalid year
/// never produces a second prompt.
pub struct InputResolver<R, W> {
    input: R,
    output: W,
    today: NaiveDate,
}

impl<R: BufRead, W: Write> InputResolver<R, W> {
    pub fn new(input: R, output: W, today: NaiveDate) -> Self {
        Self {
            input,
            output,
            today,
        }
    }

    pub fn resolve(&mut self) -> SweResult<TargetPeriod> {
        let default = TargetPeriod::containing(self.today);

        let line = self.prompt("year", &format!("Enter year [default: {}]: ", default.year()))?;
        let year = TargetPeriod::parse_year(&line, default.year())?;

        let line = self.prompt(
            "month",
            &format!("Enter month (1-12) [default: {}]: ", default.month()),
        )?;
        let month = TargetPeriod::parse_month(&line, default.month())?;

        Ok(TargetPeriod::new(year, month)?)
    }

    /// Write `text` and read one line. End of input reads as a blank line.
    fn prompt(&mut self, field: &str, text: &str) -> SweResult<String> {
        let io_err = |e: std::io::Error| SweError::InvalidInput {
            field: field.to_string(),
            message: e.to_string(),
        };

        self.output.write_all(text.as_bytes()).map_err(io_err)?;
        self.output.flush().map_err(io_err)?;

        let mut line = String::new();
        self.input.read_line(&mut line).map_err(io_err)?;
        Ok(line)
    }
}
