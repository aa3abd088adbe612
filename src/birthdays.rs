//! Birthday list loading and "who is today" lookup.
//!
//! The list is a YAML file of `{name, day, month}` records. Records with
//! impossible dates are dropped with a warning instead of failing the run.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One person in the birthday list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BirthdayRecord {
    pub name: String,
    /// Day of month (1-31)
    pub day: u32,
    /// Month (1-12)
    pub month: u32,
}

impl BirthdayRecord {
    fn is_plausible(&self) -> bool {
        // Validated against a leap year so Feb 29 birthdays stay in the book
        NaiveDate::from_ymd_opt(2024, self.month, self.day).is_some()
    }
}

/// The full birthday list
#[derive(Debug, Clone, Default)]
pub struct BirthdayBook {
    records: Vec<BirthdayRecord>,
}

impl BirthdayBook {
    /// Load the book from a YAML file, dropping implausible records
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read birthday list: {}", path.display()))?;

        Self::from_yaml(&content)
    }

    /// Parse the book from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        let records: Vec<BirthdayRecord> =
            serde_yaml::from_str(content).context("Failed to parse birthday list YAML")?;

        let records = records
            .into_iter()
            .filter(|r| {
                if r.is_plausible() {
                    true
                } else {
                    warn!(name = %r.name, day = r.day, month = r.month, "Dropping implausible birthday");
                    false
                }
            })
            .collect();

        Ok(Self { records })
    }

    /// Names with a birthday on `date`, in file order
    pub fn recipients_on(&self, date: NaiveDate) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.day == date.day() && r.month == date.month())
            .map(|r| r.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BOOK_YAML: &str = r#"
- name: Dana
  day: 11
  month: 5
- name: Omer
  day: 11
  month: 5
- name: Noa
  day: 3
  month: 12
"#;

    #[test]
    fn test_recipients_on_matching_date() {
        let book = BirthdayBook::from_yaml(TEST_BOOK_YAML).unwrap();
        let date: NaiveDate = "2024-05-11".parse().unwrap();

        assert_eq!(book.recipients_on(date), vec!["Dana", "Omer"]);
    }

    #[test]
    fn test_recipients_on_quiet_date() {
        let book = BirthdayBook::from_yaml(TEST_BOOK_YAML).unwrap();
        let date: NaiveDate = "2024-07-01".parse().unwrap();

        assert!(book.recipients_on(date).is_empty());
    }

    #[test]
    fn test_implausible_records_are_dropped() {
        let yaml = r#"
- name: Dana
  day: 31
  month: 2
- name: Noa
  day: 29
  month: 2
"#;
        let book = BirthdayBook::from_yaml(yaml).unwrap();

        // Feb 31 is dropped, Feb 29 survives
        assert_eq!(book.len(), 1);
        let leap_day: NaiveDate = "2024-02-29".parse().unwrap();
        assert_eq!(book.recipients_on(leap_day), vec!["Noa"]);
    }
}
