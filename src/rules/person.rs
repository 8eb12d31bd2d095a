use anyhow::Result;

use super::{EntityKind, Rule, Severity, Verdict, exceeds, flag};
use crate::config::Thresholds;
use crate::context::VerificationContext;
use crate::dates::{
    age_at_death, baptism_date, birth_date, burial_date, death_date, divorce_date,
    earliest_birth_child_date, event_date, marriage_date,
};
use crate::model::{ChildRelation, EventRole, Gender, Person};

// Grace period over the siblings' median birth-to-baptism gap.
const BAPTISM_GRACE_DAYS: f64 = 120.0;
const MAX_BURIAL_DELAY_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonRule {
    BirthAfterBapt,
    DeathBeforeBapt,
    BirthAfterBury,
    DeathAfterBury,
    BirthAfterDeath,
    BaptAfterBury,
    OldAge { old_age: u32, estimate: bool },
    OldAgeButNoDeath { old_age: u32, estimate: bool },
    UnknownGender,
    MultipleParents,
    MarriedOften { max_spouses: u32 },
    OldUnmarried { max_age: u32, estimate: bool },
    TooManyChildren { max_father: u32, max_mother: u32 },
    Disconnected,
    InvalidBirthDate { enabled: bool },
    InvalidDeathDate { enabled: bool },
    BirthEqualsDeath,
    BirthEqualsMarriage,
    DeathEqualsMarriage,
    BaptTooLate,
    BuryTooLate,
    FamilyOrderIncorrect { estimate: bool },
    PersonHasEventsOfTypeUnknown,
    PersonHasEventsInWrongOrder { estimate: bool },
}

impl PersonRule {
    /// The full person rule set in evaluation order.
    pub fn configured(t: &Thresholds) -> Vec<Self> {
        let estimate = t.estimate_dates;
        vec![
            Self::BirthAfterBapt,
            Self::DeathBeforeBapt,
            Self::BirthAfterBury,
            Self::DeathAfterBury,
            Self::BirthAfterDeath,
            Self::BaptAfterBury,
            Self::OldAge {
                old_age: t.old_age,
                estimate,
            },
            Self::OldAgeButNoDeath {
                old_age: t.old_age,
                estimate,
            },
            Self::UnknownGender,
            Self::MultipleParents,
            Self::MarriedOften {
                max_spouses: t.max_spouses,
            },
            Self::OldUnmarried {
                max_age: t.max_unmarried_age,
                estimate,
            },
            Self::TooManyChildren {
                max_father: t.max_children_father,
                max_mother: t.max_children_mother,
            },
            Self::Disconnected,
            Self::InvalidBirthDate {
                enabled: t.flag_invalid_dates,
            },
            Self::InvalidDeathDate {
                enabled: t.flag_invalid_dates,
            },
            Self::BirthEqualsDeath,
            Self::BirthEqualsMarriage,
            Self::DeathEqualsMarriage,
            Self::BaptTooLate,
            Self::BuryTooLate,
            Self::FamilyOrderIncorrect { estimate },
            Self::PersonHasEventsOfTypeUnknown,
            Self::PersonHasEventsInWrongOrder { estimate },
        ]
    }
}

impl Rule for PersonRule {
    type Subject = Person;

    const KIND: EntityKind = EntityKind::Person;

    fn id(&self) -> u32 {
        match self {
            Self::BirthAfterBapt => 1,
            Self::DeathBeforeBapt => 2,
            Self::BirthAfterBury => 3,
            Self::DeathAfterBury => 4,
            Self::BirthAfterDeath => 5,
            Self::BaptAfterBury => 6,
            Self::OldAge { .. } => 7,
            Self::UnknownGender => 8,
            Self::MultipleParents => 9,
            Self::MarriedOften { .. } => 10,
            Self::OldUnmarried { .. } => 11,
            Self::TooManyChildren { .. } => 12,
            Self::Disconnected => 28,
            Self::InvalidBirthDate { .. } => 29,
            Self::InvalidDeathDate { .. } => 30,
            Self::OldAgeButNoDeath { .. } => 32,
            Self::BirthEqualsDeath => 33,
            Self::BirthEqualsMarriage => 34,
            Self::DeathEqualsMarriage => 35,
            Self::BaptTooLate => 36,
            Self::BuryTooLate => 37,
            Self::FamilyOrderIncorrect { .. } => 39,
            Self::PersonHasEventsOfTypeUnknown => 41,
            Self::PersonHasEventsInWrongOrder { .. } => 43,
        }
    }

    fn severity(&self) -> Severity {
        match self {
            Self::BirthAfterBapt
            | Self::DeathBeforeBapt
            | Self::BirthAfterBury
            | Self::DeathAfterBury
            | Self::BirthAfterDeath
            | Self::BaptAfterBury
            | Self::InvalidBirthDate { .. }
            | Self::InvalidDeathDate { .. }
            | Self::BirthEqualsMarriage
            | Self::PersonHasEventsOfTypeUnknown
            | Self::PersonHasEventsInWrongOrder { .. } => Severity::Error,
            _ => Severity::Warning,
        }
    }

    fn params(&self) -> Vec<i64> {
        match *self {
            Self::OldAge { old_age, estimate } | Self::OldAgeButNoDeath { old_age, estimate } => {
                vec![i64::from(old_age), flag(estimate)]
            }
            Self::MarriedOften { max_spouses } => vec![i64::from(max_spouses)],
            Self::OldUnmarried { max_age, estimate } => vec![i64::from(max_age), flag(estimate)],
            Self::TooManyChildren {
                max_father,
                max_mother,
            } => vec![i64::from(max_father), i64::from(max_mother)],
            Self::FamilyOrderIncorrect { estimate }
            | Self::PersonHasEventsInWrongOrder { estimate } => vec![flag(estimate)],
            _ => Vec::new(),
        }
    }

    fn message(&self, _verdict: Verdict) -> &'static str {
        match self {
            Self::BirthAfterBapt => "Baptism before birth",
            Self::DeathBeforeBapt => "Death before baptism",
            Self::BirthAfterBury => "Burial before birth",
            Self::DeathAfterBury => "Burial before death",
            Self::BirthAfterDeath => "Death before birth",
            Self::BaptAfterBury => "Burial before baptism",
            Self::OldAge { .. } => "Old age at death",
            Self::OldAgeButNoDeath { .. } => "Old age but no death",
            Self::UnknownGender => "Unknown gender",
            Self::MultipleParents => "Multiple parents",
            Self::MarriedOften { .. } => "Married often",
            Self::OldUnmarried { .. } => "Old and unmarried",
            Self::TooManyChildren { .. } => "Too many children",
            Self::Disconnected => "Disconnected individual",
            Self::InvalidBirthDate { .. } => "Invalid birth date",
            Self::InvalidDeathDate { .. } => "Invalid death date",
            Self::BirthEqualsDeath => "Birth equals death",
            Self::BirthEqualsMarriage => "Birth equals marriage",
            Self::DeathEqualsMarriage => "Death equals marriage",
            Self::BaptTooLate => "Baptism too late according to family tradition",
            Self::BuryTooLate => "Burial too late",
            Self::FamilyOrderIncorrect { .. } => "Families are not ordered chronological",
            Self::PersonHasEventsOfTypeUnknown => "Person has events of type Unknown",
            Self::PersonHasEventsInWrongOrder { .. } => "Person events not ordered chronological",
        }
    }

    fn evaluate(&self, ctx: &VerificationContext<'_>, person: &Person) -> Result<Verdict> {
        let broken = match *self {
            Self::BirthAfterBapt => {
                known_and_after(birth_date(ctx, person, false)?, baptism_date(ctx, person, false)?)
            }
            Self::DeathBeforeBapt => {
                known_and_after(baptism_date(ctx, person, false)?, death_date(ctx, person, false)?)
            }
            Self::BirthAfterBury => {
                known_and_after(birth_date(ctx, person, false)?, burial_date(ctx, person, false)?)
            }
            Self::DeathAfterBury => {
                known_and_after(death_date(ctx, person, false)?, burial_date(ctx, person, false)?)
            }
            Self::BirthAfterDeath => {
                known_and_after(birth_date(ctx, person, false)?, death_date(ctx, person, false)?)
            }
            Self::BaptAfterBury => {
                known_and_after(baptism_date(ctx, person, false)?, burial_date(ctx, person, false)?)
            }
            Self::OldAge { old_age, estimate } => {
                exceeds(age_at_death(ctx, person, estimate)?, old_age)
            }
            Self::OldAgeButNoDeath { old_age, estimate } => {
                old_but_not_dead(ctx, person, old_age, estimate)?
            }
            Self::UnknownGender => person.gender == Gender::Unknown,
            Self::MultipleParents => person.parent_families.len() > 1,
            Self::MarriedOften { max_spouses } => person.families.len() > max_spouses as usize,
            Self::OldUnmarried { max_age, estimate } => {
                person.families.is_empty() && exceeds(age_at_death(ctx, person, estimate)?, max_age)
            }
            Self::TooManyChildren {
                max_father,
                max_mother,
            } => {
                let children = count_children(ctx, person)?;
                match person.gender {
                    Gender::Male => children > max_father as usize,
                    Gender::Female => children > max_mother as usize,
                    Gender::Unknown => false,
                }
            }
            Self::Disconnected => person.parent_families.is_empty() && person.families.is_empty(),
            Self::InvalidBirthDate { enabled } => {
                enabled && has_invalid_date(ctx, person.birth_ref.as_deref())?
            }
            Self::InvalidDeathDate { enabled } => {
                enabled && has_invalid_date(ctx, person.death_ref.as_deref())?
            }
            Self::BirthEqualsDeath => {
                let birth = birth_date(ctx, person, false)?;
                birth > 0 && birth == death_date(ctx, person, false)?
            }
            Self::BirthEqualsMarriage => {
                coincides_with_marriage(ctx, person, birth_date(ctx, person, false)?)?
            }
            Self::DeathEqualsMarriage => {
                coincides_with_marriage(ctx, person, death_date(ctx, person, false)?)?
            }
            Self::BaptTooLate => baptised_late(ctx, person)?,
            Self::BuryTooLate => {
                let death = death_date(ctx, person, false)?;
                let burial = burial_date(ctx, person, false)?;
                death > 0 && burial >= death && burial - death > MAX_BURIAL_DELAY_DAYS
            }
            Self::FamilyOrderIncorrect { estimate } => families_out_of_order(ctx, person, estimate)?,
            Self::PersonHasEventsOfTypeUnknown => {
                let mut found = false;
                for event_ref in &person.event_refs {
                    if event_ref.role == EventRole::Unknown && ctx.event(&event_ref.handle)?.is_some() {
                        found = true;
                        break;
                    }
                }
                found
            }
            Self::PersonHasEventsInWrongOrder { estimate } => {
                let handles = person.event_refs.iter().map(|r| r.handle.as_str());
                events_out_of_order(ctx, handles, estimate)?
            }
        };
        Ok(Verdict::from_bool(broken))
    }
}

/// True when both dates are known and `earlier` actually falls after `later`.
fn known_and_after(earlier: i64, later: i64) -> bool {
    earlier > 0 && later > 0 && earlier > later
}

fn old_but_not_dead(
    ctx: &VerificationContext<'_>,
    person: &Person,
    old_age: u32,
    estimate: bool,
) -> Result<bool> {
    let birth = birth_date(ctx, person, estimate)?;
    // A recorded death counts even without a date.
    if person.death_ref.is_some() || death_date(ctx, person, true)? != 0 || birth <= 0 {
        return Ok(false);
    }
    Ok(exceeds(ctx.today() - birth, old_age))
}

fn count_children(ctx: &VerificationContext<'_>, person: &Person) -> Result<usize> {
    let mut total = 0;
    for handle in &person.families {
        if let Some(family) = ctx.family(handle)? {
            total += family.children.len();
        }
    }
    Ok(total)
}

fn has_invalid_date(ctx: &VerificationContext<'_>, handle: Option<&str>) -> Result<bool> {
    let Some(handle) = handle else {
        return Ok(false);
    };
    Ok(ctx
        .event(handle)?
        .is_some_and(|event| !event.date.is_valid()))
}

fn coincides_with_marriage(
    ctx: &VerificationContext<'_>,
    person: &Person,
    date: i64,
) -> Result<bool> {
    if date <= 0 {
        return Ok(false);
    }
    // Every spousal family counts, not only the first one.
    for handle in &person.families {
        let Some(family) = ctx.family(handle)? else {
            continue;
        };
        if marriage_date(ctx, &family)? == date {
            return Ok(true);
        }
    }
    Ok(false)
}

fn baptised_late(ctx: &VerificationContext<'_>, person: &Person) -> Result<bool> {
    let [family_handle] = person.parent_families.as_slice() else {
        return Ok(false);
    };
    let Some(family) = ctx.family(family_handle)? else {
        return Ok(false);
    };
    if family.children.len() <= 1 {
        return Ok(false);
    }

    let Some(own_gap) = baptism_gap(ctx, person)? else {
        return Ok(false);
    };

    let mut sibling_gaps = Vec::new();
    for child_ref in &family.children {
        if child_ref.mother_relation != ChildRelation::Birth || child_ref.handle == person.handle {
            continue;
        }
        let Some(sibling) = ctx.person(&child_ref.handle)? else {
            continue;
        };
        if let Some(gap) = baptism_gap(ctx, &sibling)? {
            sibling_gaps.push(gap);
        }
    }

    let Some(median) = median(&mut sibling_gaps) else {
        return Ok(false);
    };
    Ok(own_gap as f64 > median + BAPTISM_GRACE_DAYS)
}

/// Days from birth to baptism when both are known and in order.
fn baptism_gap(ctx: &VerificationContext<'_>, person: &Person) -> Result<Option<i64>> {
    let birth = birth_date(ctx, person, false)?;
    let baptism = baptism_date(ctx, person, false)?;
    if birth > 0 && baptism > 0 && baptism >= birth {
        return Ok(Some(baptism - birth));
    }
    Ok(None)
}

fn median(values: &mut [i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid] as f64)
    } else {
        Some((values[mid - 1] + values[mid]) as f64 / 2.0)
    }
}

fn families_out_of_order(
    ctx: &VerificationContext<'_>,
    person: &Person,
    estimate: bool,
) -> Result<bool> {
    if person.families.len() < 2 {
        return Ok(false);
    }

    let mut previous = 0;
    for handle in &person.families {
        let Some(family) = ctx.family(handle)? else {
            continue;
        };

        let mut compare = marriage_date(ctx, &family)?;
        if compare <= 0 {
            compare = divorce_date(ctx, &family)?;
        }
        if compare <= 0 {
            compare = earliest_birth_child_date(ctx, &family, estimate)?;
        }

        if compare != 0 && compare < previous {
            return Ok(true);
        }
        previous = compare;
    }
    Ok(false)
}

/// Each known date is compared against the entry right before it only.
pub(super) fn events_out_of_order<'h>(
    ctx: &VerificationContext<'_>,
    handles: impl Iterator<Item = &'h str>,
    estimate: bool,
) -> Result<bool> {
    let mut previous = 0;
    for handle in handles {
        let date = event_date(ctx, handle, estimate)?;
        if date > 0 && previous > date {
            return Ok(true);
        }
        previous = date;
    }
    Ok(false)
}
