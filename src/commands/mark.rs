use anyhow::{Result, bail};
use tracing::info;

use crate::cli::MarkArgs;
use crate::commands::Session;
use crate::sink::ResultSet;

pub fn run(args: MarkArgs) -> Result<()> {
    let mut session = Session::open(&args.session)?;
    let previously_marked: usize = session.store.ignores().values().map(|ids| ids.len()).sum();

    let (summary, selected, marked, ignores) = {
        let ctx = session.context();
        let mut results = ResultSet::new(&session.store);
        let summary = session.verification_run()?.execute(&ctx, &mut results)?;

        let selected = apply_selection(&mut results, &args, !args.unmark)?;
        (summary, selected, results.marked_count(), results.new_ignores())
    };
    session.store.save(ignores)?;

    info!(
        violations = summary.violations,
        selected,
        previously_marked,
        marked,
        store = %session.store.path().display(),
        "mark completed"
    );
    Ok(())
}

fn apply_selection(results: &mut ResultSet<'_>, args: &MarkArgs, marked: bool) -> Result<usize> {
    if args.invert {
        results.invert();
        return Ok(results.len());
    }
    if args.all {
        if marked {
            results.mark_all();
        } else {
            results.unmark_all();
        }
        return Ok(results.len());
    }

    if let Some(message) = &args.group {
        if results.group(message).is_none() {
            bail!("no violations with message {message:?}");
        }
        if let Some(position) = args.position {
            if !results.set_marked(message, position, marked) {
                bail!("group {message:?} has no record at position {position}");
            }
            return Ok(1);
        }
        if args.rules.is_empty() && args.handles.is_empty() {
            return Ok(results.mark_group(message, marked));
        }
    }

    Ok(results.mark_where(
        |violation| {
            args.group.as_ref().is_none_or(|m| &violation.message == m)
                && (args.rules.is_empty() || args.rules.contains(&violation.identity.rule_id))
                && (args.handles.is_empty() || args.handles.contains(&violation.handle))
        },
        marked,
    ))
}
