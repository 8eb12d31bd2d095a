use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::VerifyArgs;
use crate::commands::Session;
use crate::sink::{ConsoleSink, ResultSet};

pub fn run(args: VerifyArgs) -> Result<()> {
    let session = Session::open(&args.session)?;
    let ctx = session.context();
    let mut run = session.verification_run()?;

    if args.json {
        let mut results = ResultSet::new(&session.store);
        let summary = run.execute(&ctx, &mut results)?;
        if results.is_empty() {
            info!(dataset = %args.session.dataset.display(), "no violations found");
        }

        let mut output = io::BufWriter::new(io::stdout().lock());
        serde_json::to_writer_pretty(&mut output, &results.report())
            .context("failed to serialize verification json output")?;
        writeln!(output)?;
        output.flush()?;

        info!(
            violations = summary.violations,
            marked = results.marked_count(),
            cancelled = summary.cancelled,
            "verify completed"
        );
        return Ok(());
    }

    let output = io::BufWriter::new(io::stdout().lock());
    let mut console = ConsoleSink::new(output, &session.store, args.show_marked);
    let summary = run.execute(&ctx, &mut console)?;
    let (shown, hidden) = (console.printed(), console.hidden());
    console
        .into_inner()
        .flush()
        .context("failed to flush verification output")?;

    info!(
        violations = summary.violations,
        shown,
        hidden,
        "verify completed"
    );
    Ok(())
}
