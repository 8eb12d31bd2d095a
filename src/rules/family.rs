use std::sync::Arc;

use anyhow::Result;

use super::person::events_out_of_order;
use super::{EntityKind, Rule, Severity, Verdict, exceeds, falls_short, flag};
use crate::config::Thresholds;
use crate::context::VerificationContext;
use crate::dates::{birth_date_of, children_birth_dates, death_date_of, marriage_date};
use crate::model::{
    ChildRef, ChildRelation, EventRole, Family, FamilyRelation, Gender, NameType, Person,
};

// A father may die up to ~41 weeks before his child is born.
const GESTATION_DAYS: i64 = 294;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyRule {
    SameSexFamily,
    FemaleHusband,
    MaleWife,
    SameSurnameFamily,
    LargeAgeGapFamily { max_gap: u32, estimate: bool },
    MarriageBeforeBirth { estimate: bool },
    MarriageAfterDeath { estimate: bool },
    EarlyMarriage { min_age: u32, estimate: bool },
    LateMarriage { max_age: u32, estimate: bool },
    OldParent { max_mother: u32, max_father: u32, estimate: bool },
    YoungParent { min_mother: u32, min_father: u32, estimate: bool },
    UnbornParent { estimate: bool },
    DeadParent { estimate: bool },
    LargeChildrenSpan { max_span: u32, estimate: bool },
    LargeChildrenAgeDiff { max_gap: u32, estimate: bool },
    MarriedRelation,
    ChildrenOrderIncorrect { estimate: bool },
    FamilyHasEventsOfTypeUnknown,
    FamilyHasEventsInWrongOrder { estimate: bool },
}

impl FamilyRule {
    /// The full family rule set in evaluation order.
    pub fn configured(t: &Thresholds) -> Vec<Self> {
        let estimate = t.estimate_dates;
        vec![
            Self::SameSexFamily,
            Self::FemaleHusband,
            Self::MaleWife,
            Self::SameSurnameFamily,
            Self::LargeAgeGapFamily {
                max_gap: t.max_spouse_age_gap,
                estimate,
            },
            Self::MarriageBeforeBirth { estimate },
            Self::MarriageAfterDeath { estimate },
            Self::EarlyMarriage {
                min_age: t.min_marriage_age,
                estimate,
            },
            Self::LateMarriage {
                max_age: t.max_marriage_age,
                estimate,
            },
            Self::OldParent {
                max_mother: t.max_mother_age,
                max_father: t.max_father_age,
                estimate,
            },
            Self::YoungParent {
                min_mother: t.min_mother_age,
                min_father: t.min_father_age,
                estimate,
            },
            Self::UnbornParent { estimate },
            Self::DeadParent { estimate },
            Self::LargeChildrenSpan {
                max_span: t.max_children_span,
                estimate,
            },
            Self::LargeChildrenAgeDiff {
                max_gap: t.max_children_gap,
                estimate,
            },
            Self::MarriedRelation,
            Self::ChildrenOrderIncorrect { estimate },
            Self::FamilyHasEventsOfTypeUnknown,
            Self::FamilyHasEventsInWrongOrder { estimate },
        ]
    }
}

impl Rule for FamilyRule {
    type Subject = Family;

    const KIND: EntityKind = EntityKind::Family;

    fn id(&self) -> u32 {
        match self {
            Self::SameSexFamily => 13,
            Self::FemaleHusband => 14,
            Self::MaleWife => 15,
            Self::SameSurnameFamily => 16,
            Self::LargeAgeGapFamily { .. } => 17,
            Self::MarriageBeforeBirth { .. } => 18,
            Self::MarriageAfterDeath { .. } => 19,
            Self::EarlyMarriage { .. } => 20,
            Self::LateMarriage { .. } => 21,
            Self::OldParent { .. } => 22,
            Self::YoungParent { .. } => 23,
            Self::UnbornParent { .. } => 24,
            Self::DeadParent { .. } => 25,
            Self::LargeChildrenSpan { .. } => 26,
            Self::LargeChildrenAgeDiff { .. } => 27,
            Self::MarriedRelation => 31,
            Self::ChildrenOrderIncorrect { .. } => 38,
            Self::FamilyHasEventsOfTypeUnknown => 40,
            Self::FamilyHasEventsInWrongOrder { .. } => 42,
        }
    }

    fn severity(&self) -> Severity {
        match self {
            Self::MarriageBeforeBirth { .. }
            | Self::MarriageAfterDeath { .. }
            | Self::UnbornParent { .. }
            | Self::DeadParent { .. }
            | Self::ChildrenOrderIncorrect { .. }
            | Self::FamilyHasEventsOfTypeUnknown
            | Self::FamilyHasEventsInWrongOrder { .. } => Severity::Error,
            _ => Severity::Warning,
        }
    }

    fn params(&self) -> Vec<i64> {
        match *self {
            Self::LargeAgeGapFamily { max_gap: limit, estimate }
            | Self::EarlyMarriage { min_age: limit, estimate }
            | Self::LateMarriage { max_age: limit, estimate }
            | Self::LargeChildrenSpan { max_span: limit, estimate }
            | Self::LargeChildrenAgeDiff { max_gap: limit, estimate } => {
                vec![i64::from(limit), flag(estimate)]
            }
            Self::OldParent {
                max_mother: mother,
                max_father: father,
                estimate,
            }
            | Self::YoungParent {
                min_mother: mother,
                min_father: father,
                estimate,
            } => vec![i64::from(mother), i64::from(father), flag(estimate)],
            Self::MarriageBeforeBirth { estimate }
            | Self::MarriageAfterDeath { estimate }
            | Self::UnbornParent { estimate }
            | Self::DeadParent { estimate }
            | Self::ChildrenOrderIncorrect { estimate }
            | Self::FamilyHasEventsInWrongOrder { estimate } => vec![flag(estimate)],
            Self::SameSexFamily
            | Self::FemaleHusband
            | Self::MaleWife
            | Self::SameSurnameFamily
            | Self::MarriedRelation
            | Self::FamilyHasEventsOfTypeUnknown => Vec::new(),
        }
    }

    fn message(&self, verdict: Verdict) -> &'static str {
        let mother = verdict == Verdict::Mother;
        match self {
            Self::SameSexFamily => "Same sex marriage",
            Self::FemaleHusband => "Female husband",
            Self::MaleWife => "Male wife",
            Self::SameSurnameFamily => "Husband and wife with the same surname",
            Self::LargeAgeGapFamily { .. } => "Large age difference between spouses",
            Self::MarriageBeforeBirth { .. } => "Marriage before birth",
            Self::MarriageAfterDeath { .. } => "Marriage after death",
            Self::EarlyMarriage { .. } => "Early marriage",
            Self::LateMarriage { .. } => "Late marriage",
            Self::OldParent { .. } if mother => "Old mother",
            Self::OldParent { .. } => "Old father",
            Self::YoungParent { .. } if mother => "Young mother",
            Self::YoungParent { .. } => "Young father",
            Self::UnbornParent { .. } if mother => "Unborn mother",
            Self::UnbornParent { .. } => "Unborn father",
            Self::DeadParent { .. } if mother => "Dead mother",
            Self::DeadParent { .. } => "Dead father",
            Self::LargeChildrenSpan { .. } => "Large year span for all children",
            Self::LargeChildrenAgeDiff { .. } => "Large age differences between children",
            Self::MarriedRelation => "Marriage date but not married",
            Self::ChildrenOrderIncorrect { .. } => "Children are not ordered chronological",
            Self::FamilyHasEventsOfTypeUnknown => "Family has events of type Unknown",
            Self::FamilyHasEventsInWrongOrder { .. } => "Family events not ordered chronological",
        }
    }

    fn evaluate(&self, ctx: &VerificationContext<'_>, family: &Family) -> Result<Verdict> {
        let verdict = match *self {
            Self::SameSexFamily => {
                let (father, mother) = parents(ctx, family)?;
                Verdict::from_bool(match (father, mother) {
                    (Some(father), Some(mother)) => {
                        father.gender == mother.gender && mother.gender != Gender::Unknown
                    }
                    _ => false,
                })
            }
            Self::FemaleHusband => Verdict::from_bool(
                ctx.father(family)?
                    .is_some_and(|father| father.gender == Gender::Female),
            ),
            Self::MaleWife => Verdict::from_bool(
                ctx.mother(family)?
                    .is_some_and(|mother| mother.gender == Gender::Male),
            ),
            Self::SameSurnameFamily => {
                let (father, mother) = parents(ctx, family)?;
                Verdict::from_bool(match (father, mother) {
                    (Some(father), Some(mother)) => same_birth_surname(&father, &mother),
                    _ => false,
                })
            }
            Self::LargeAgeGapFamily { max_gap, estimate } => {
                let births = parent_births(ctx, family, estimate)?;
                Verdict::from_bool(
                    births.father > 0
                        && births.mother > 0
                        && exceeds((births.father - births.mother).abs(), max_gap),
                )
            }
            Self::MarriageBeforeBirth { estimate } => {
                let marriage = marriage_date(ctx, family)?;
                let births = parent_births(ctx, family, estimate)?;
                Verdict::from_bool(
                    marriage > 0
                        && [births.father, births.mother]
                            .into_iter()
                            .any(|birth| birth > 0 && birth > marriage),
                )
            }
            Self::MarriageAfterDeath { estimate } => {
                let marriage = marriage_date(ctx, family)?;
                let (father, mother) = parents(ctx, family)?;
                let deaths = [
                    death_date_of(ctx, father.as_deref(), estimate)?,
                    death_date_of(ctx, mother.as_deref(), estimate)?,
                ];
                Verdict::from_bool(
                    marriage > 0 && deaths.into_iter().any(|death| death > 0 && death < marriage),
                )
            }
            Self::EarlyMarriage { min_age, estimate } => {
                let marriage = marriage_date(ctx, family)?;
                let births = parent_births(ctx, family, estimate)?;
                Verdict::from_bool(marriage > 0 && [births.father, births.mother].into_iter().any(
                    |birth| birth > 0 && birth < marriage && falls_short(marriage - birth, min_age),
                ))
            }
            Self::LateMarriage { max_age, estimate } => {
                let marriage = marriage_date(ctx, family)?;
                let births = parent_births(ctx, family, estimate)?;
                Verdict::from_bool(
                    marriage > 0
                        && [births.father, births.mother]
                            .into_iter()
                            .any(|birth| birth > 0 && exceeds(marriage - birth, max_age)),
                )
            }
            Self::OldParent {
                max_mother,
                max_father,
                estimate,
            } => {
                let births = parent_births(ctx, family, estimate)?;
                first_parent_match(ctx, family, estimate, |_, child| {
                    (
                        births.father > 0 && exceeds(child - births.father, max_father),
                        births.mother > 0 && exceeds(child - births.mother, max_mother),
                    )
                })?
            }
            Self::YoungParent {
                min_mother,
                min_father,
                estimate,
            } => {
                let births = parent_births(ctx, family, estimate)?;
                first_parent_match(ctx, family, estimate, |_, child| {
                    (
                        births.father > 0 && falls_short(child - births.father, min_father),
                        births.mother > 0 && falls_short(child - births.mother, min_mother),
                    )
                })?
            }
            Self::UnbornParent { estimate } => {
                let births = parent_births(ctx, family, estimate)?;
                first_parent_match(ctx, family, estimate, |_, child| {
                    (
                        births.father > 0 && births.father > child,
                        births.mother > 0 && births.mother > child,
                    )
                })?
            }
            Self::DeadParent { estimate } => {
                let (father, mother) = parents(ctx, family)?;
                let father_death = death_date_of(ctx, father.as_deref(), estimate)?;
                let mother_death = death_date_of(ctx, mother.as_deref(), estimate)?;
                first_parent_match(ctx, family, estimate, |child_ref, child| {
                    (
                        child_ref.father_relation == ChildRelation::Birth
                            && father_death > 0
                            && father_death + GESTATION_DAYS < child,
                        child_ref.mother_relation == ChildRelation::Birth
                            && mother_death > 0
                            && mother_death < child,
                    )
                })?
            }
            Self::LargeChildrenSpan { max_span, estimate } => {
                let mut dates = children_birth_dates(ctx, family, estimate)?;
                dates.sort_unstable();
                Verdict::from_bool(match (dates.first(), dates.last()) {
                    (Some(first), Some(last)) if dates.len() >= 2 => exceeds(last - first, max_span),
                    _ => false,
                })
            }
            Self::LargeChildrenAgeDiff { max_gap, estimate } => {
                let mut dates = children_birth_dates(ctx, family, estimate)?;
                dates.sort_unstable();
                Verdict::from_bool(
                    dates
                        .windows(2)
                        .any(|pair| exceeds(pair[1] - pair[0], max_gap)),
                )
            }
            Self::MarriedRelation => Verdict::from_bool(
                family.relationship != FamilyRelation::Married && marriage_date(ctx, family)? > 0,
            ),
            Self::ChildrenOrderIncorrect { estimate } => {
                Verdict::from_bool(children_out_of_order(ctx, family, estimate)?)
            }
            Self::FamilyHasEventsOfTypeUnknown => {
                let mut found = false;
                for event_ref in &family.event_refs {
                    if event_ref.role == EventRole::Unknown && ctx.event(&event_ref.handle)?.is_some() {
                        found = true;
                        break;
                    }
                }
                Verdict::from_bool(found)
            }
            Self::FamilyHasEventsInWrongOrder { estimate } => {
                let handles = family.event_refs.iter().map(|r| r.handle.as_str());
                Verdict::from_bool(events_out_of_order(ctx, handles, estimate)?)
            }
        };
        Ok(verdict)
    }
}

type Parents = (Option<Arc<Person>>, Option<Arc<Person>>);

fn parents(ctx: &VerificationContext<'_>, family: &Family) -> Result<Parents> {
    Ok((ctx.father(family)?, ctx.mother(family)?))
}

#[derive(Debug, Clone, Copy)]
struct ParentBirths {
    father: i64,
    mother: i64,
}

fn parent_births(
    ctx: &VerificationContext<'_>,
    family: &Family,
    estimate: bool,
) -> Result<ParentBirths> {
    let (father, mother) = parents(ctx, family)?;
    Ok(ParentBirths {
        father: birth_date_of(ctx, father.as_deref(), estimate)?,
        mother: birth_date_of(ctx, mother.as_deref(), estimate)?,
    })
}

fn same_birth_surname(father: &Person, mother: &Person) -> bool {
    let father_name = &father.primary_name;
    let mother_name = &mother.primary_name;
    father_name.name_type == NameType::Birth
        && mother_name.name_type == NameType::Birth
        && !father_name.surname.is_empty()
        && father_name.surname == mother_name.surname
}

/// Walks the children with a known birth date in list order and reports the
/// first parent the check flags, father before mother.
fn first_parent_match<F>(
    ctx: &VerificationContext<'_>,
    family: &Family,
    estimate: bool,
    check: F,
) -> Result<Verdict>
where
    F: Fn(&ChildRef, i64) -> (bool, bool),
{
    for child_ref in &family.children {
        let child = ctx.person(&child_ref.handle)?;
        let child_birth = birth_date_of(ctx, child.as_deref(), estimate)?;
        if child_birth <= 0 {
            continue;
        }
        match check(child_ref, child_birth) {
            (true, _) => return Ok(Verdict::Father),
            (false, true) => return Ok(Verdict::Mother),
            (false, false) => {}
        }
    }
    Ok(Verdict::NotBroken)
}

fn children_out_of_order(
    ctx: &VerificationContext<'_>,
    family: &Family,
    estimate: bool,
) -> Result<bool> {
    if family.children.len() <= 1 {
        return Ok(false);
    }

    let mut previous = 0;
    for child_ref in &family.children {
        if child_ref.mother_relation != ChildRelation::Birth {
            continue;
        }
        let child = ctx.person(&child_ref.handle)?;
        let birth = birth_date_of(ctx, child.as_deref(), estimate)?;
        if birth > 0 && birth < previous {
            return Ok(true);
        }
        previous = birth;
    }
    Ok(false)
}
