//! Date lookups shared by every rule.
//!
//! All functions return a sort value where 0 means "unknown". Callers must
//! check for a strictly positive value before comparing or subtracting.

use anyhow::Result;

use crate::context::VerificationContext;
use crate::model::{ChildRelation, DateValue, EventRole, EventType, Family, Person};

const DAYS_PER_YEAR: f64 = 365.0;

/// Sort value of a date, or 0 when the date lacks day or month precision and
/// estimation is off.
pub fn date_sort_value(date: &DateValue, estimate: bool) -> i64 {
    if !estimate && (!date.has_day() || !date.has_month()) {
        return 0;
    }
    date.sort_value()
}

pub fn event_date(ctx: &VerificationContext<'_>, handle: &str, estimate: bool) -> Result<i64> {
    Ok(match ctx.event(handle)? {
        Some(event) => date_sort_value(&event.date, estimate),
        None => 0,
    })
}

#[derive(Debug, Default, Clone, Copy)]
struct ChurchDates {
    baptism: Option<i64>,
    christening: Option<i64>,
    burial: Option<i64>,
}

// Later primary events of the same type override earlier ones.
fn church_dates(ctx: &VerificationContext<'_>, person: &Person, estimate: bool) -> Result<ChurchDates> {
    let mut dates = ChurchDates::default();
    for event_ref in person.primary_event_refs() {
        let Some(event) = ctx.event(&event_ref.handle)? else {
            continue;
        };
        let value = date_sort_value(&event.date, estimate);
        match event.event_type {
            EventType::Baptism => dates.baptism = Some(value),
            EventType::Christening => dates.christening = Some(value),
            EventType::Burial => dates.burial = Some(value),
            _ => {}
        }
    }
    Ok(dates)
}

/// Baptism date, falling back to christening when no baptism is recorded.
pub fn baptism_date(ctx: &VerificationContext<'_>, person: &Person, estimate: bool) -> Result<i64> {
    let dates = church_dates(ctx, person, estimate)?;
    Ok(dates.baptism.or(dates.christening).unwrap_or(0))
}

pub fn burial_date(ctx: &VerificationContext<'_>, person: &Person, estimate: bool) -> Result<i64> {
    Ok(church_dates(ctx, person, estimate)?.burial.unwrap_or(0))
}

pub fn birth_date(ctx: &VerificationContext<'_>, person: &Person, estimate: bool) -> Result<i64> {
    let birth = match &person.birth_ref {
        Some(handle) => event_date(ctx, handle, estimate)?,
        None => 0,
    };
    if estimate && birth == 0 {
        return baptism_date(ctx, person, estimate);
    }
    Ok(birth)
}

pub fn death_date(ctx: &VerificationContext<'_>, person: &Person, estimate: bool) -> Result<i64> {
    let death = match &person.death_ref {
        Some(handle) => event_date(ctx, handle, estimate)?,
        None => 0,
    };
    if estimate && death == 0 {
        return burial_date(ctx, person, estimate);
    }
    Ok(death)
}

/// Birth date of an optional person; an absent person has an unknown date.
pub fn birth_date_of(
    ctx: &VerificationContext<'_>,
    person: Option<&Person>,
    estimate: bool,
) -> Result<i64> {
    match person {
        Some(person) => birth_date(ctx, person, estimate),
        None => Ok(0),
    }
}

pub fn death_date_of(
    ctx: &VerificationContext<'_>,
    person: Option<&Person>,
    estimate: bool,
) -> Result<i64> {
    match person {
        Some(person) => death_date(ctx, person, estimate),
        None => Ok(0),
    }
}

/// Lifespan in days, or 0 when either end is unknown.
pub fn age_at_death(ctx: &VerificationContext<'_>, person: &Person, estimate: bool) -> Result<i64> {
    let birth = birth_date(ctx, person, estimate)?;
    let death = death_date(ctx, person, estimate)?;
    if birth > 0 && death > 0 {
        return Ok(death - birth);
    }
    Ok(0)
}

fn family_event_date(
    ctx: &VerificationContext<'_>,
    family: &Family,
    wanted: EventType,
) -> Result<i64> {
    for event_ref in &family.event_refs {
        if !matches!(event_ref.role, EventRole::Family | EventRole::Primary) {
            continue;
        }
        let Some(event) = ctx.event(&event_ref.handle)? else {
            continue;
        };
        if event.event_type == wanted {
            return Ok(event.date.sort_value());
        }
    }
    Ok(0)
}

pub fn marriage_date(ctx: &VerificationContext<'_>, family: &Family) -> Result<i64> {
    family_event_date(ctx, family, EventType::Marriage)
}

pub fn divorce_date(ctx: &VerificationContext<'_>, family: &Family) -> Result<i64> {
    family_event_date(ctx, family, EventType::Divorce)
}

/// Known birth dates of the family's children, in child-list order.
pub fn children_birth_dates(
    ctx: &VerificationContext<'_>,
    family: &Family,
    estimate: bool,
) -> Result<Vec<i64>> {
    let mut dates = Vec::with_capacity(family.children.len());
    for child_ref in &family.children {
        let child = ctx.person(&child_ref.handle)?;
        let date = birth_date_of(ctx, child.as_deref(), estimate)?;
        if date > 0 {
            dates.push(date);
        }
    }
    Ok(dates)
}

/// Earliest known birth among the children born to the family's mother.
pub fn earliest_birth_child_date(
    ctx: &VerificationContext<'_>,
    family: &Family,
    estimate: bool,
) -> Result<i64> {
    let mut earliest = 0;
    for child_ref in &family.children {
        if child_ref.mother_relation != ChildRelation::Birth {
            continue;
        }
        let child = ctx.person(&child_ref.handle)?;
        let date = birth_date_of(ctx, child.as_deref(), estimate)?;
        if date > 0 && (earliest == 0 || date < earliest) {
            earliest = date;
        }
    }
    Ok(earliest)
}

/// Difference of two sort values expressed in years.
pub fn years(days: i64) -> f64 {
    days as f64 / DAYS_PER_YEAR
}
