use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub type Handle = String;

// Julian Day Number of 0001-01-01 (proleptic Gregorian) minus one.
const JULIAN_DAY_OFFSET: i64 = 1_721_425;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NameType {
    #[default]
    Birth,
    Married,
    AlsoKnownAs,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Name {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub name_type: NameType,
}

impl Name {
    pub fn display(&self) -> String {
        match (self.surname.is_empty(), self.first_name.is_empty()) {
            (false, false) => format!("{}, {}", self.surname, self.first_name),
            (false, true) => self.surname.clone(),
            (true, false) => self.first_name.clone(),
            (true, true) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Birth,
    Death,
    Baptism,
    Christening,
    Burial,
    Marriage,
    Divorce,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventRole {
    #[default]
    Primary,
    Family,
    Witness,
    Clergy,
    Informant,
    Unknown,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChildRelation {
    #[default]
    Birth,
    Adopted,
    Stepchild,
    Foster,
    Sponsored,
    Unknown,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FamilyRelation {
    #[default]
    Married,
    Unmarried,
    CivilUnion,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRef {
    pub handle: Handle,
    #[serde(default)]
    pub role: EventRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRef {
    pub handle: Handle,
    #[serde(default)]
    pub mother_relation: ChildRelation,
    #[serde(default)]
    pub father_relation: ChildRelation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub handle: Handle,
    #[serde(default)]
    pub display_id: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub primary_name: Name,
    #[serde(default)]
    pub event_refs: Vec<EventRef>,
    #[serde(default)]
    pub birth_ref: Option<Handle>,
    #[serde(default)]
    pub death_ref: Option<Handle>,
    /// Families in which this person is a parent.
    #[serde(default)]
    pub families: Vec<Handle>,
    /// Families in which this person is a child.
    #[serde(default)]
    pub parent_families: Vec<Handle>,
}

impl Person {
    pub fn primary_event_refs(&self) -> impl Iterator<Item = &EventRef> {
        self.event_refs
            .iter()
            .filter(|event_ref| event_ref.role == EventRole::Primary)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub handle: Handle,
    #[serde(default)]
    pub display_id: String,
    #[serde(default)]
    pub father: Option<Handle>,
    #[serde(default)]
    pub mother: Option<Handle>,
    #[serde(default)]
    pub relationship: FamilyRelation,
    #[serde(default)]
    pub children: Vec<ChildRef>,
    #[serde(default)]
    pub event_refs: Vec<EventRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub handle: Handle,
    #[serde(default)]
    pub display_id: String,
    pub event_type: EventType,
    #[serde(default)]
    pub date: DateValue,
}

/// A possibly partial calendar date. Month and day are 0 when absent; a sort
/// value of 0 means the date carries no usable information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DateSpec", into = "DateSpec")]
pub struct DateValue {
    year: i32,
    month: u32,
    day: u32,
    valid: bool,
    sort_value: i64,
}

impl DateValue {
    pub fn empty() -> Self {
        Self {
            year: 0,
            month: 0,
            day: 0,
            valid: true,
            sort_value: 0,
        }
    }

    pub fn invalid() -> Self {
        Self {
            valid: false,
            ..Self::empty()
        }
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Self {
        if year == 0 {
            return Self::empty();
        }
        if month == 0 && day != 0 {
            return Self::invalid();
        }

        match NaiveDate::from_ymd_opt(year, month.max(1), day.max(1)) {
            Some(date) => Self {
                year,
                month,
                day,
                valid: true,
                sort_value: julian_day(date),
            },
            None => Self::invalid(),
        }
    }

    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Self::empty();
        }

        let mut parts = trimmed.splitn(3, '-');
        let year = parts.next().and_then(|value| value.parse::<i32>().ok());
        let month = match parts.next() {
            Some(value) => value.parse::<u32>().ok(),
            None => Some(0),
        };
        let day = match parts.next() {
            Some(value) => value.parse::<u32>().ok(),
            None => Some(0),
        };

        match (year, month, day) {
            (Some(year), Some(month), Some(day)) if year != 0 => Self::from_ymd(year, month, day),
            _ => Self::invalid(),
        }
    }

    pub fn sort_value(&self) -> i64 {
        self.sort_value
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn has_month(&self) -> bool {
        self.month != 0
    }

    pub fn has_day(&self) -> bool {
        self.day != 0
    }
}

impl Default for DateValue {
    fn default() -> Self {
        Self::empty()
    }
}

pub fn julian_day(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce()) + JULIAN_DAY_OFFSET
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum DateSpec {
    Text(String),
    Parts {
        #[serde(default)]
        year: i32,
        #[serde(default)]
        month: u32,
        #[serde(default)]
        day: u32,
        #[serde(default = "default_true")]
        valid: bool,
    },
}

fn default_true() -> bool {
    true
}

impl From<DateSpec> for DateValue {
    fn from(spec: DateSpec) -> Self {
        match spec {
            DateSpec::Text(text) => DateValue::parse(&text),
            DateSpec::Parts {
                valid: false, ..
            } => DateValue::invalid(),
            DateSpec::Parts {
                year, month, day, ..
            } => DateValue::from_ymd(year, month, day),
        }
    }
}

impl From<DateValue> for DateSpec {
    fn from(date: DateValue) -> Self {
        DateSpec::Parts {
            year: date.year,
            month: date.month,
            day: date.day,
            valid: date.valid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_value_is_julian_day_number() {
        assert_eq!(DateValue::from_ymd(2000, 1, 1).sort_value(), 2_451_545);
        assert_eq!(
            DateValue::from_ymd(1900, 1, 1).sort_value() - DateValue::from_ymd(1899, 12, 20).sort_value(),
            12
        );
    }

    #[test]
    fn partial_text_dates_keep_missing_components() {
        let year_only = DateValue::parse("1850");
        assert!(year_only.is_valid());
        assert!(!year_only.has_month());
        assert!(!year_only.has_day());
        assert_eq!(year_only.sort_value(), DateValue::from_ymd(1850, 1, 1).sort_value());

        let month = DateValue::parse("1850-06");
        assert!(month.has_month());
        assert!(!month.has_day());
    }

    #[test]
    fn malformed_dates_are_invalid_and_unknown() {
        for text in ["1850-02-30", "about 1850", "1850-13-01", "0-01-01"] {
            let date = DateValue::parse(text);
            assert!(!date.is_valid(), "{text} should be invalid");
            assert_eq!(date.sort_value(), 0);
        }
        assert!(DateValue::parse("").is_valid());
        assert_eq!(DateValue::parse("").sort_value(), 0);
    }

    #[test]
    fn dates_deserialize_from_text_or_parts() {
        let event: Event = serde_json::from_str(
            r#"{"handle": "E1", "event_type": "birth", "date": "1901-03-04"}"#,
        )
        .expect("text date should deserialize");
        assert_eq!(event.date, DateValue::from_ymd(1901, 3, 4));

        let event: Event = serde_json::from_str(
            r#"{"handle": "E2", "event_type": "probate", "date": {"year": 1901, "valid": false}}"#,
        )
        .expect("parts date should deserialize");
        assert_eq!(event.event_type, EventType::Other);
        assert!(!event.date.is_valid());
    }

    #[test]
    fn name_display_uses_surname_first() {
        let name = Name {
            first_name: "Anna".to_string(),
            surname: "Berg".to_string(),
            name_type: NameType::Birth,
        };
        assert_eq!(name.display(), "Berg, Anna");
    }
}
