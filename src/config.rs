use anyhow::{Result, bail};
use serde::Serialize;

/// Thresholds the rules run with. Ages and spans are in years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Thresholds {
    pub old_age: u32,
    pub max_spouse_age_gap: u32,
    pub max_children_gap: u32,
    pub max_children_span: u32,
    pub min_marriage_age: u32,
    pub max_marriage_age: u32,
    pub max_mother_age: u32,
    pub min_mother_age: u32,
    pub min_father_age: u32,
    pub max_father_age: u32,
    pub max_spouses: u32,
    pub max_children_mother: u32,
    pub max_children_father: u32,
    pub max_unmarried_age: u32,
    pub estimate_dates: bool,
    pub flag_invalid_dates: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            old_age: 90,
            max_spouse_age_gap: 30,
            max_children_gap: 8,
            max_children_span: 25,
            min_marriage_age: 17,
            max_marriage_age: 50,
            max_mother_age: 48,
            min_mother_age: 17,
            min_father_age: 18,
            max_father_age: 65,
            max_spouses: 3,
            max_children_mother: 12,
            max_children_father: 15,
            max_unmarried_age: 99,
            estimate_dates: false,
            flag_invalid_dates: true,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<()> {
        let ranges = [
            ("marriage age", self.min_marriage_age, self.max_marriage_age),
            ("mother age", self.min_mother_age, self.max_mother_age),
            ("father age", self.min_father_age, self.max_father_age),
        ];
        for (label, min, max) in ranges {
            if min > max {
                bail!("minimum {label} ({min}) exceeds maximum {label} ({max})");
            }
        }
        Ok(())
    }
}
