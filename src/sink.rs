use std::collections::HashMap;
use std::io::Write;
use std::ops::ControlFlow;

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::engine::RunSummary;
use crate::ignore_store::{IgnoreMap, IgnoreStore};
use crate::rules::{EntityKind, Severity, Violation};

/// Receives the output of a verification run.
pub trait ResultSink {
    fn on_run_start(&mut self, _total_steps: usize) {}

    fn on_violation(&mut self, violation: Violation) -> Result<()>;

    /// Called once per checked entity. Returning `Break` stops the run
    /// before the next entity.
    fn on_progress_step(&mut self) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn on_run_complete(&mut self, _summary: &RunSummary) {}
}

impl ResultSink for Vec<Violation> {
    fn on_violation(&mut self, violation: Violation) -> Result<()> {
        self.push(violation);
        Ok(())
    }
}

/// Prints one line per violation as it arrives.
pub struct ConsoleSink<'s, W: Write> {
    out: W,
    store: &'s IgnoreStore,
    show_marked: bool,
    total_steps: usize,
    steps: usize,
    printed: usize,
    hidden: usize,
}

impl<'s, W: Write> ConsoleSink<'s, W> {
    pub fn new(out: W, store: &'s IgnoreStore, show_marked: bool) -> Self {
        Self {
            out,
            store,
            show_marked,
            total_steps: 0,
            steps: 0,
            printed: 0,
            hidden: 0,
        }
    }

    pub fn printed(&self) -> usize {
        self.printed
    }

    pub fn hidden(&self) -> usize {
        self.hidden
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for ConsoleSink<'_, W> {
    fn on_run_start(&mut self, total_steps: usize) {
        self.total_steps = total_steps;
        self.steps = 0;
    }

    fn on_violation(&mut self, violation: Violation) -> Result<()> {
        let marked = self.store.get_marking(&violation.handle, &violation.identity);
        if marked && !self.show_marked {
            self.hidden += 1;
            return Ok(());
        }

        let prefix = if marked { "[x] " } else { "" };
        writeln!(self.out, "{prefix}{}", format_line(&violation))?;
        self.printed += 1;
        Ok(())
    }

    fn on_progress_step(&mut self) -> ControlFlow<()> {
        self.steps += 1;
        if self.steps % 1000 == 0 {
            debug!(step = self.steps, total = self.total_steps, "verification progress");
        }
        ControlFlow::Continue(())
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        debug!(
            printed = self.printed,
            hidden = self.hidden,
            cancelled = summary.cancelled,
            "console output complete"
        );
        if let Err(err) = self.out.flush() {
            debug!(error = %err, "failed to flush console output");
        }
    }
}

/// `W: Old age at death, Person: I0001, Lund, Olaf`
pub fn format_line(violation: &Violation) -> String {
    format!(
        "{}: {}, {}: {}, {}",
        violation.severity.as_str(),
        violation.message,
        violation.kind.as_str(),
        violation.display_id,
        violation.display_name
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkedViolation {
    #[serde(flatten)]
    pub violation: Violation,
    pub marked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViolationGroup {
    pub message: String,
    pub severity: Severity,
    pub records: Vec<MarkedViolation>,
}

impl ViolationGroup {
    pub fn marked_count(&self) -> usize {
        self.records.iter().filter(|r| r.marked).count()
    }
}

/// Collects a run's violations grouped by message, in first-seen order,
/// and tracks which of them the user has marked as ignored.
#[derive(Debug)]
pub struct ResultSet<'s> {
    store: &'s IgnoreStore,
    groups: Vec<ViolationGroup>,
    group_index: HashMap<String, usize>,
}

impl<'s> ResultSet<'s> {
    /// Records arrive pre-marked when `store` already suppresses them.
    pub fn new(store: &'s IgnoreStore) -> Self {
        Self {
            store,
            groups: Vec::new(),
            group_index: HashMap::new(),
        }
    }

    pub fn groups(&self) -> &[ViolationGroup] {
        &self.groups
    }

    pub fn group(&self, message: &str) -> Option<&ViolationGroup> {
        self.group_index.get(message).map(|&index| &self.groups[index])
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn marked_count(&self) -> usize {
        self.groups.iter().map(ViolationGroup::marked_count).sum()
    }

    /// Sets the marking of one record. Returns false when no such record exists.
    pub fn set_marked(&mut self, message: &str, position: usize, marked: bool) -> bool {
        let Some(&index) = self.group_index.get(message) else {
            return false;
        };
        match self.groups[index].records.get_mut(position) {
            Some(record) => {
                record.marked = marked;
                true
            }
            None => false,
        }
    }

    /// Sets the marking of every record in a group.
    pub fn mark_group(&mut self, message: &str, marked: bool) -> usize {
        let Some(&index) = self.group_index.get(message) else {
            return 0;
        };
        let records = &mut self.groups[index].records;
        records.iter_mut().for_each(|r| r.marked = marked);
        records.len()
    }

    pub fn mark_all(&mut self) {
        self.records_mut().for_each(|r| r.marked = true);
    }

    pub fn unmark_all(&mut self) {
        self.records_mut().for_each(|r| r.marked = false);
    }

    pub fn invert(&mut self) {
        self.records_mut().for_each(|r| r.marked = !r.marked);
    }

    /// Sets the marking of every record the predicate selects and returns
    /// how many were selected.
    pub fn mark_where<P>(&mut self, predicate: P, marked: bool) -> usize
    where
        P: Fn(&Violation) -> bool,
    {
        let mut selected = 0;
        for record in self.records_mut().filter(|r| predicate(&r.violation)) {
            record.marked = marked;
            selected += 1;
        }
        selected
    }

    /// The ignore map implied by the current markings. Only records of this
    /// run contribute; suppressions for violations that no longer occur are
    /// dropped.
    pub fn new_ignores(&self) -> IgnoreMap {
        let mut ignores = IgnoreMap::new();
        for record in self.groups.iter().flat_map(|g| &g.records) {
            if record.marked {
                ignores
                    .entry(record.violation.handle.clone())
                    .or_default()
                    .insert(record.violation.identity.clone());
            }
        }
        ignores
    }

    pub fn report(&self) -> ResultReport<'_> {
        ResultReport {
            total: self.len(),
            marked: self.marked_count(),
            people: self.count_kind(EntityKind::Person),
            families: self.count_kind(EntityKind::Family),
            groups: self.groups(),
        }
    }

    fn count_kind(&self, kind: EntityKind) -> usize {
        self.groups
            .iter()
            .flat_map(|g| &g.records)
            .filter(|r| r.violation.kind == kind)
            .count()
    }

    fn records_mut(&mut self) -> impl Iterator<Item = &mut MarkedViolation> {
        self.groups.iter_mut().flat_map(|g| g.records.iter_mut())
    }
}

impl ResultSink for ResultSet<'_> {
    fn on_violation(&mut self, violation: Violation) -> Result<()> {
        let marked = self.store.get_marking(&violation.handle, &violation.identity);
        let index = match self.group_index.get(&violation.message) {
            Some(&index) => index,
            None => {
                self.groups.push(ViolationGroup {
                    message: violation.message.clone(),
                    severity: violation.severity,
                    records: Vec::new(),
                });
                let index = self.groups.len() - 1;
                self.group_index.insert(violation.message.clone(), index);
                index
            }
        };
        self.groups[index]
            .records
            .push(MarkedViolation { violation, marked });
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ResultReport<'a> {
    pub total: usize,
    pub marked: usize,
    pub people: usize,
    pub families: usize,
    pub groups: &'a [ViolationGroup],
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::Thresholds;
    use crate::context::VerificationContext;
    use crate::engine::VerificationRun;
    use crate::rules::ViolationIdentity;
    use crate::source::JsonDataSource;
    use crate::testkit::{GraphBuilder, jd};

    fn violation(handle: &str, message: &str, rule_id: u32) -> Violation {
        Violation {
            message: message.to_string(),
            display_id: handle.to_string(),
            display_name: "Lund, Olaf".to_string(),
            kind: EntityKind::Person,
            identity: ViolationIdentity::new(rule_id, vec![]),
            severity: Severity::Warning,
            handle: handle.to_string(),
        }
    }

    fn store(ignores: IgnoreMap) -> IgnoreStore {
        IgnoreStore::with_ignores(Path::new("/unused"), "memory://test", ignores)
    }

    fn filled(store: &IgnoreStore) -> ResultSet<'_> {
        let mut set = ResultSet::new(store);
        set.on_violation(violation("P1", "Unknown gender", 8)).unwrap();
        set.on_violation(violation("P2", "Disconnected individual", 28)).unwrap();
        set.on_violation(violation("P3", "Unknown gender", 8)).unwrap();
        set
    }

    #[test]
    fn groups_by_message_in_first_seen_order() {
        let empty = store(IgnoreMap::new());
        let set = filled(&empty);
        let messages: Vec<&str> = set.groups().iter().map(|g| g.message.as_str()).collect();
        assert_eq!(messages, vec!["Unknown gender", "Disconnected individual"]);
        assert_eq!(set.group("Unknown gender").unwrap().records.len(), 2);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn bulk_markings() {
        let empty = store(IgnoreMap::new());
        let mut set = filled(&empty);
        assert_eq!(set.mark_group("Unknown gender", true), 2);
        assert_eq!(set.marked_count(), 2);

        set.invert();
        assert_eq!(set.marked_count(), 1);
        assert!(set.group("Disconnected individual").unwrap().records[0].marked);

        set.mark_all();
        assert_eq!(set.marked_count(), 3);
        set.unmark_all();
        assert_eq!(set.marked_count(), 0);

        assert!(set.set_marked("Unknown gender", 1, true));
        assert!(!set.set_marked("Unknown gender", 5, true));
        assert!(!set.set_marked("Old age", 0, true));
        assert_eq!(set.mark_where(|v| v.handle == "P2", true), 1);
        assert_eq!(set.marked_count(), 2);
    }

    #[test]
    fn new_ignores_come_from_marked_records_only() {
        let mut seed = IgnoreMap::new();
        seed.entry("P1".to_string())
            .or_default()
            .insert(ViolationIdentity::new(8, vec![]));
        seed.entry("GONE".to_string())
            .or_default()
            .insert(ViolationIdentity::new(8, vec![]));

        let seeded = store(seed);
        let mut set = ResultSet::new(&seeded);
        set.on_violation(violation("P1", "Unknown gender", 8)).unwrap();
        set.on_violation(violation("P2", "Disconnected individual", 28)).unwrap();
        assert_eq!(set.marked_count(), 1);

        set.set_marked("Disconnected individual", 0, true);
        let ignores = set.new_ignores();
        assert_eq!(ignores.len(), 2);
        assert!(ignores["P2"].contains(&ViolationIdentity::new(28, vec![])));
        assert!(!ignores.contains_key("GONE"));
    }

    #[test]
    fn console_lines_hide_or_flag_marked_violations() {
        let mut ignores = IgnoreMap::new();
        ignores
            .entry("P1".to_string())
            .or_default()
            .insert(ViolationIdentity::new(8, vec![]));

        let store = store(ignores);

        let mut hidden = ConsoleSink::new(Vec::new(), &store, false);
        hidden.on_violation(violation("P1", "Unknown gender", 8)).unwrap();
        hidden.on_violation(violation("P2", "Unknown gender", 8)).unwrap();
        assert_eq!(hidden.hidden(), 1);
        let text = String::from_utf8(hidden.into_inner()).unwrap();
        assert_eq!(text, "W: Unknown gender, Person: P2, Lund, Olaf\n");

        let mut shown = ConsoleSink::new(Vec::new(), &store, true);
        shown.on_violation(violation("P1", "Unknown gender", 8)).unwrap();
        assert_eq!(shown.printed(), 1);
        let text = String::from_utf8(shown.into_inner()).unwrap();
        assert_eq!(text, "[x] W: Unknown gender, Person: P1, Lund, Olaf\n");
    }

    fn old_man() -> JsonDataSource {
        let mut graph = GraphBuilder::new();
        graph
            .person("P1")
            .male()
            .named("Olaf", "Lund")
            .born("1800-01-01")
            .died("1895-06-01");
        graph.family("F1").father("P1");
        graph.build()
    }

    fn old_age_marking(source: &JsonDataSource, seed: &IgnoreStore, old_age: u32) -> Option<bool> {
        let ctx = VerificationContext::new(source).with_reference_date(jd("2026-01-01"));
        let thresholds = Thresholds {
            old_age,
            ..Thresholds::default()
        };
        let mut set = ResultSet::new(seed);
        VerificationRun::new(thresholds)
            .unwrap()
            .execute(&ctx, &mut set)
            .unwrap();
        set.group("Old age at death")
            .map(|group| group.records.iter().any(|r| r.marked))
    }

    #[test]
    fn suppression_follows_the_rule_parameters() {
        let source = old_man();
        let mut seed = IgnoreMap::new();
        seed.entry("P1".to_string())
            .or_default()
            .insert(ViolationIdentity::new(7, vec![90, 0]));

        let seed = store(seed);

        assert_eq!(old_age_marking(&source, &seed, 90), Some(true));
        assert_eq!(old_age_marking(&source, &seed, 95), Some(false));
    }
}
