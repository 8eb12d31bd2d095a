use anyhow::{Result, bail};
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::ObjectCache;
use crate::config::Thresholds;
use crate::context::VerificationContext;
use crate::rules::{FamilyRule, PersonRule, Rule, Violation};
use crate::sink::ResultSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Preloading,
    EvaluatingPeople,
    EvaluatingFamilies,
    Done,
}

impl RunPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preloading => "preloading",
            Self::EvaluatingPeople => "evaluating_people",
            Self::EvaluatingFamilies => "evaluating_families",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub people_checked: usize,
    pub families_checked: usize,
    pub violations: usize,
    pub cancelled: bool,
}

/// One pass of every rule over every person and then every family.
///
/// The run owns the lifetime of the context's cache: it is optionally
/// preloaded on entry and always cleared on exit, including when a fetch
/// fails or the sink cancels.
pub struct VerificationRun {
    thresholds: Thresholds,
    preload: bool,
    phase: RunPhase,
}

impl VerificationRun {
    pub fn new(thresholds: Thresholds) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self {
            thresholds,
            preload: true,
            phase: RunPhase::Idle,
        })
    }

    pub fn with_preload(mut self, preload: bool) -> Self {
        self.preload = preload;
        self
    }

    #[cfg(test)]
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn execute(
        &mut self,
        ctx: &VerificationContext<'_>,
        sink: &mut dyn ResultSink,
    ) -> Result<RunSummary> {
        if !matches!(self.phase, RunPhase::Idle | RunPhase::Done) {
            bail!("verification run already in phase {}", self.phase.as_str());
        }

        let _clear = ClearOnDrop(ctx.cache());
        let result = self.evaluate_all(ctx, sink);
        self.phase = RunPhase::Done;
        result
    }

    fn evaluate_all(
        &mut self,
        ctx: &VerificationContext<'_>,
        sink: &mut dyn ResultSink,
    ) -> Result<RunSummary> {
        let source = ctx.source();
        let person_handles = source.person_handles();
        let family_handles = source.family_handles();
        let mut summary = RunSummary::default();

        info!(
            source = %source.identity(),
            people = person_handles.len(),
            families = family_handles.len(),
            "verification started"
        );

        if self.preload {
            self.enter(RunPhase::Preloading);
            ctx.cache().preload_all(source)?;
        }

        sink.on_run_start(source.person_count() + source.family_count());

        self.enter(RunPhase::EvaluatingPeople);
        let person_rules = PersonRule::configured(&self.thresholds);
        for handle in &person_handles {
            if let Some(person) = ctx.person(handle)? {
                summary.violations += report(
                    ctx,
                    &person_rules,
                    &*person,
                    Subject {
                        handle,
                        display_id: &person.display_id,
                        display_name: &person.primary_name.display(),
                    },
                    sink,
                )?;
            }
            summary.people_checked += 1;
            if sink.on_progress_step().is_break() {
                return Ok(self.cancelled(summary, sink));
            }
        }

        self.enter(RunPhase::EvaluatingFamilies);
        let family_rules = FamilyRule::configured(&self.thresholds);
        for handle in &family_handles {
            if let Some(family) = ctx.family(handle)? {
                summary.violations += report(
                    ctx,
                    &family_rules,
                    &*family,
                    Subject {
                        handle,
                        display_id: &family.display_id,
                        display_name: &ctx.family_name(&family)?,
                    },
                    sink,
                )?;
            }
            summary.families_checked += 1;
            if sink.on_progress_step().is_break() {
                return Ok(self.cancelled(summary, sink));
            }
        }

        info!(
            people = summary.people_checked,
            families = summary.families_checked,
            violations = summary.violations,
            "verification finished"
        );
        sink.on_run_complete(&summary);
        Ok(summary)
    }

    fn enter(&mut self, phase: RunPhase) {
        debug!(from = self.phase.as_str(), to = phase.as_str(), "run phase");
        self.phase = phase;
    }

    fn cancelled(&self, mut summary: RunSummary, sink: &mut dyn ResultSink) -> RunSummary {
        summary.cancelled = true;
        info!(
            phase = self.phase.as_str(),
            people = summary.people_checked,
            families = summary.families_checked,
            violations = summary.violations,
            "verification cancelled"
        );
        sink.on_run_complete(&summary);
        summary
    }
}

struct Subject<'s> {
    handle: &'s str,
    display_id: &'s str,
    display_name: &'s str,
}

/// Runs every rule against one entity and forwards each broken one.
fn report<R: Rule>(
    ctx: &VerificationContext<'_>,
    rules: &[R],
    entity: &R::Subject,
    subject: Subject<'_>,
    sink: &mut dyn ResultSink,
) -> Result<usize> {
    let mut reported = 0;
    for rule in rules {
        let verdict = rule.evaluate(ctx, entity)?;
        if !verdict.is_broken() {
            continue;
        }
        sink.on_violation(Violation {
            message: rule.message(verdict).to_string(),
            display_id: subject.display_id.to_string(),
            display_name: subject.display_name.to_string(),
            kind: R::KIND,
            identity: rule.identity(),
            severity: rule.severity(),
            handle: subject.handle.to_string(),
        })?;
        reported += 1;
    }
    Ok(reported)
}

struct ClearOnDrop<'c>(&'c ObjectCache);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::ops::ControlFlow;

    use super::*;
    use crate::rules::{EntityKind, Severity, ViolationIdentity};
    use crate::source::JsonDataSource;
    use crate::testkit::{GraphBuilder, jd};

    fn sample() -> JsonDataSource {
        let mut graph = GraphBuilder::new();
        graph
            .person("P1")
            .male()
            .named("Olaf", "Lund")
            .born("1800-01-01")
            .died("1895-06-01");
        graph
            .person("P2")
            .female()
            .named("Kari", "Lund")
            .born("1900-01-01")
            .baptised("1899-12-20");
        graph.person("P3").named("Nils", "Lund");
        graph
            .family("F1")
            .father("P1")
            .mother("P2")
            .married("1820-01-01");
        graph.build()
    }

    fn run_into(source: &JsonDataSource, thresholds: Thresholds) -> (RunSummary, Vec<Violation>) {
        let ctx = VerificationContext::new(source).with_reference_date(jd("2026-01-01"));
        let mut run = VerificationRun::new(thresholds).unwrap();
        let mut sink: Vec<Violation> = Vec::new();
        let summary = run.execute(&ctx, &mut sink).unwrap();
        assert_eq!(run.phase(), RunPhase::Done);
        (summary, sink)
    }

    #[test]
    fn reports_violations_with_entity_details() {
        let source = sample();
        let (summary, violations) = run_into(&source, Thresholds::default());

        assert_eq!(summary.people_checked, 3);
        assert_eq!(summary.families_checked, 1);
        assert_eq!(summary.violations, violations.len());
        assert!(!summary.cancelled);

        let old_age = violations
            .iter()
            .find(|v| v.identity == ViolationIdentity::new(7, vec![90, 0]))
            .expect("old age reported");
        assert_eq!(old_age.handle, "P1");
        assert_eq!(old_age.display_name, "Lund, Olaf");
        assert_eq!(old_age.kind, EntityKind::Person);

        let baptism = violations
            .iter()
            .find(|v| v.identity.rule_id == 1)
            .expect("birth after baptism reported");
        assert_eq!(baptism.handle, "P2");
        assert_eq!(baptism.severity, Severity::Error);

        let before_birth = violations
            .iter()
            .find(|v| v.identity.rule_id == 18)
            .expect("marriage before birth reported");
        assert_eq!(before_birth.kind, EntityKind::Family);
        assert_eq!(before_birth.display_name, "Lund, Olaf and Lund, Kari");

        let people_end = violations
            .iter()
            .rposition(|v| v.kind == EntityKind::Person)
            .unwrap();
        assert!(violations[..=people_end].iter().all(|v| v.kind == EntityKind::Person));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let source = sample();
        let (_, first) = run_into(&source, Thresholds::default());
        let (_, second) = run_into(&source, Thresholds::default());
        assert_eq!(first, second);
    }

    #[test]
    fn entities_without_dates_produce_no_date_violations() {
        let mut graph = GraphBuilder::new();
        graph.person("A").male().named("A", "X").born("").died("");
        graph.person("B").female().named("B", "Y");
        graph.person("C").named("C", "Z");
        graph.family("F1").father("A").mother("B").child("C").married("");
        let source = graph.build();

        let (_, violations) = run_into(&source, Thresholds::default());
        // Only the structural unknown-gender rule applies here.
        let ids: Vec<u32> = violations.iter().map(|v| v.identity.rule_id).collect();
        assert_eq!(ids, vec![8]);
    }

    #[test]
    fn cache_is_cleared_after_every_run() {
        let source = sample();
        let ctx = VerificationContext::new(&source);
        let mut run = VerificationRun::new(Thresholds::default()).unwrap();
        run.execute(&ctx, &mut Vec::<Violation>::new()).unwrap();
        assert!(ctx.cache().is_empty());

        let mut run = VerificationRun::new(Thresholds::default())
            .unwrap()
            .with_preload(false);
        run.execute(&ctx, &mut Vec::<Violation>::new()).unwrap();
        assert!(ctx.cache().is_empty());
    }

    struct StopAfter {
        total: usize,
        remaining: usize,
        seen: Vec<Violation>,
        completed: Option<RunSummary>,
    }

    impl ResultSink for StopAfter {
        fn on_run_start(&mut self, total_steps: usize) {
            self.total = total_steps;
        }

        fn on_violation(&mut self, violation: Violation) -> Result<()> {
            self.seen.push(violation);
            Ok(())
        }

        fn on_progress_step(&mut self) -> ControlFlow<()> {
            if self.remaining == 0 {
                return ControlFlow::Break(());
            }
            self.remaining -= 1;
            ControlFlow::Continue(())
        }

        fn on_run_complete(&mut self, summary: &RunSummary) {
            self.completed = Some(*summary);
        }
    }

    #[test]
    fn cancelling_stops_between_entities() {
        let source = sample();
        let ctx = VerificationContext::new(&source).with_reference_date(jd("2026-01-01"));
        let mut run = VerificationRun::new(Thresholds::default()).unwrap();
        let mut sink = StopAfter {
            total: 0,
            remaining: 0,
            seen: Vec::new(),
            completed: None,
        };

        let summary = run.execute(&ctx, &mut sink).unwrap();
        assert!(summary.cancelled);
        assert_eq!(sink.total, 4);
        assert_eq!(summary.people_checked, 1);
        assert_eq!(summary.families_checked, 0);
        assert!(sink.seen.iter().all(|v| v.handle == "P1"));
        assert_eq!(sink.completed, Some(summary));
        assert!(ctx.cache().is_empty());
    }

    #[test]
    fn inverted_thresholds_are_rejected_before_running() {
        let thresholds = Thresholds {
            min_father_age: 70,
            max_father_age: 65,
            ..Thresholds::default()
        };
        assert!(VerificationRun::new(thresholds).is_err());
    }
}
