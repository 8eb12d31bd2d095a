pub mod mark;
pub mod verify;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::SessionArgs;
use crate::config::Thresholds;
use crate::context::VerificationContext;
use crate::engine::VerificationRun;
use crate::ignore_store::{IgnoreStore, versioned_data_dir};
use crate::model::DateValue;
use crate::source::{DataSource, JsonDataSource};

/// Everything a command needs before it can start a run.
pub(crate) struct Session {
    pub source: JsonDataSource,
    pub store: IgnoreStore,
    thresholds: Thresholds,
    preload: bool,
    reference_date: Option<i64>,
}

impl Session {
    pub fn open(args: &SessionArgs) -> Result<Self> {
        let thresholds = Thresholds::from(&args.thresholds);
        thresholds.validate().context("invalid thresholds")?;
        let reference_date = args
            .reference_date
            .as_deref()
            .map(parse_reference_date)
            .transpose()?;

        let source = JsonDataSource::open(&args.dataset)?;
        let data_dir = versioned_data_dir(&args.data_dir);
        let store = IgnoreStore::load(&data_dir, source.identity());

        info!(
            dataset = %args.dataset.display(),
            store = %store.path().display(),
            estimate_dates = thresholds.estimate_dates,
            "session opened"
        );

        Ok(Self {
            source,
            store,
            thresholds,
            preload: !args.no_preload,
            reference_date,
        })
    }

    pub fn verification_run(&self) -> Result<VerificationRun> {
        Ok(VerificationRun::new(self.thresholds)?.with_preload(self.preload))
    }

    pub fn context(&self) -> VerificationContext<'_> {
        let ctx = VerificationContext::new(&self.source);
        match self.reference_date {
            Some(today) => ctx.with_reference_date(today),
            None => ctx,
        }
    }
}

fn parse_reference_date(text: &str) -> Result<i64> {
    let date = DateValue::parse(text);
    if !date.is_valid() || !date.has_day() {
        bail!("reference date must be a full YYYY-MM-DD date, got {text:?}");
    }
    Ok(date.sort_value())
}

#[cfg(test)]
mod tests {
    use super::parse_reference_date;
    use crate::testkit::jd;

    #[test]
    fn reference_date_needs_day_precision() {
        assert_eq!(parse_reference_date("2026-01-01").unwrap(), jd("2026-01-01"));
        assert!(parse_reference_date("2026").is_err());
        assert!(parse_reference_date("2026-13-01").is_err());
    }
}
