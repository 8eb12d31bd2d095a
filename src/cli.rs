use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

use crate::config::Thresholds;

#[derive(Parser, Debug)]
#[command(
    name = "pedigree-verify",
    version,
    about = "Plausibility checks for genealogical record graphs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every rule and print the violations found.
    Verify(VerifyArgs),
    /// Run every rule and update which violations are ignored.
    Mark(MarkArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    #[arg(long)]
    pub dataset: PathBuf,

    #[arg(long, default_value = ".cache/pedigree-verify")]
    pub data_dir: PathBuf,

    #[arg(long, default_value_t = false)]
    pub no_preload: bool,

    /// Date treated as "today", as `YYYY-MM-DD`. Defaults to the local date.
    #[arg(long)]
    pub reference_date: Option<String>,

    #[command(flatten)]
    pub thresholds: ThresholdArgs,
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    #[arg(long, default_value_t = false)]
    pub show_marked: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// `--rule`, `--handle` and `--group` narrow the selection together;
/// `--all` and `--invert` stand alone.
#[derive(Args, Debug, Clone)]
#[command(group(
    ArgGroup::new("selection")
        .required(true)
        .multiple(true)
        .args(["all", "rules", "handles", "group", "invert"])
))]
pub struct MarkArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    #[arg(long, default_value_t = false, conflicts_with_all = ["rules", "handles", "group"])]
    pub all: bool,

    #[arg(long = "rule")]
    pub rules: Vec<u32>,

    #[arg(long = "handle")]
    pub handles: Vec<String>,

    /// Message of a violation group, as printed by `verify`.
    #[arg(long)]
    pub group: Option<String>,

    /// Zero-based position of a single record inside `--group`.
    #[arg(long, requires = "group", conflicts_with_all = ["rules", "handles"])]
    pub position: Option<usize>,

    #[arg(long, default_value_t = false, conflicts_with = "invert")]
    pub unmark: bool,

    #[arg(
        long,
        default_value_t = false,
        conflicts_with_all = ["all", "rules", "handles", "group"]
    )]
    pub invert: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ThresholdArgs {
    #[arg(long, default_value_t = 90)]
    pub old_age: u32,

    #[arg(long, default_value_t = 30)]
    pub max_spouse_age_gap: u32,

    #[arg(long, default_value_t = 8)]
    pub max_children_gap: u32,

    #[arg(long, default_value_t = 25)]
    pub max_children_span: u32,

    #[arg(long, default_value_t = 17)]
    pub min_marriage_age: u32,

    #[arg(long, default_value_t = 50)]
    pub max_marriage_age: u32,

    #[arg(long, default_value_t = 48)]
    pub max_mother_age: u32,

    #[arg(long, default_value_t = 17)]
    pub min_mother_age: u32,

    #[arg(long, default_value_t = 18)]
    pub min_father_age: u32,

    #[arg(long, default_value_t = 65)]
    pub max_father_age: u32,

    #[arg(long, default_value_t = 3)]
    pub max_spouses: u32,

    #[arg(long, default_value_t = 12)]
    pub max_children_mother: u32,

    #[arg(long, default_value_t = 15)]
    pub max_children_father: u32,

    #[arg(long, default_value_t = 99)]
    pub max_unmarried_age: u32,

    /// Fall back to baptism and burial dates when birth or death is unknown.
    #[arg(long, default_value_t = false)]
    pub estimate_dates: bool,

    #[arg(long, default_value_t = false)]
    pub skip_invalid_dates: bool,
}

impl From<&ThresholdArgs> for Thresholds {
    fn from(args: &ThresholdArgs) -> Self {
        Self {
            old_age: args.old_age,
            max_spouse_age_gap: args.max_spouse_age_gap,
            max_children_gap: args.max_children_gap,
            max_children_span: args.max_children_span,
            min_marriage_age: args.min_marriage_age,
            max_marriage_age: args.max_marriage_age,
            max_mother_age: args.max_mother_age,
            min_mother_age: args.min_mother_age,
            min_father_age: args.min_father_age,
            max_father_age: args.max_father_age,
            max_spouses: args.max_spouses,
            max_children_mother: args.max_children_mother,
            max_children_father: args.max_children_father,
            max_unmarried_age: args.max_unmarried_age,
            estimate_dates: args.estimate_dates,
            flag_invalid_dates: !args.skip_invalid_dates,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Commands};
    use crate::config::Thresholds;

    #[test]
    fn threshold_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["pedigree-verify", "verify", "--dataset", "tree.json"])
            .expect("parse verify");
        let Commands::Verify(args) = cli.command else {
            panic!("expected verify");
        };
        assert_eq!(Thresholds::from(&args.session.thresholds), Thresholds::default());
    }

    #[test]
    fn threshold_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "pedigree-verify",
            "verify",
            "--dataset",
            "tree.json",
            "--old-age",
            "95",
            "--estimate-dates",
            "--skip-invalid-dates",
        ])
        .expect("parse verify");
        let Commands::Verify(args) = cli.command else {
            panic!("expected verify");
        };
        let thresholds = Thresholds::from(&args.session.thresholds);
        assert_eq!(thresholds.old_age, 95);
        assert!(thresholds.estimate_dates);
        assert!(!thresholds.flag_invalid_dates);
    }

    #[test]
    fn mark_requires_a_selection() {
        let missing = Cli::try_parse_from(["pedigree-verify", "mark", "--dataset", "tree.json"]);
        assert!(missing.is_err());

        let cli = Cli::try_parse_from([
            "pedigree-verify",
            "mark",
            "--dataset",
            "tree.json",
            "--rule",
            "7",
            "--rule",
            "8",
            "--unmark",
        ])
        .expect("parse mark");
        let Commands::Mark(args) = cli.command else {
            panic!("expected mark");
        };
        assert_eq!(args.rules, vec![7, 8]);
        assert!(args.unmark);
    }

    #[test]
    fn mark_filters_combine_but_all_and_invert_stand_alone() {
        let cli = Cli::try_parse_from([
            "pedigree-verify",
            "mark",
            "--dataset",
            "tree.json",
            "--rule",
            "8",
            "--handle",
            "P2",
        ])
        .expect("rule and handle together");
        let Commands::Mark(args) = cli.command else {
            panic!("expected mark");
        };
        assert_eq!(args.rules, vec![8]);
        assert_eq!(args.handles, vec!["P2".to_string()]);

        for conflicting in [
            &["--all", "--rule", "8"][..],
            &["--invert", "--handle", "P2"][..],
            &["--all", "--invert"][..],
            &["--position", "0"][..],
        ] {
            let mut argv = vec!["pedigree-verify", "mark", "--dataset", "tree.json"];
            argv.extend_from_slice(conflicting);
            assert!(Cli::try_parse_from(argv).is_err(), "{conflicting:?} should be rejected");
        }
    }
}
