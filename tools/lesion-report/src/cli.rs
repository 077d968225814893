//! 命令行参数.

use clap::{ArgAction, Args, Parser, Subcommand};
use lesion_eval::matching::IouThreshold;
use lesion_eval::metrics::VolumeUnit;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "lesion-report",
    version,
    about = "Lesion-wise evaluation of 3D binary lesion segmentations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase output verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Evaluate a batch of prediction/truth pairs and write one row per case.
    Aggregate(AggregateArgs),

    /// Evaluate every truth lesion of a single prediction/truth pair.
    Lesions(LesionArgs),
}

/// Options shared by both commands.
#[derive(Debug, Args)]
pub struct EvalArgs {
    /// IoU threshold for lesion detection (used by LTPR and LFDR).
    #[arg(
        long,
        visible_alias = "it",
        default_value = "0.0",
        value_parser = parse_threshold
    )]
    pub iou_threshold: IouThreshold,

    /// Use 6-connectivity instead of 26-connectivity for lesion extraction.
    #[arg(long, default_value_t = false)]
    pub face_connectivity: bool,

    /// Unit of reported volumes when voxel spacing is known.
    #[arg(long, default_value = "microliter")]
    pub unit: VolumeUnit,

    /// Do not rescale the ISBI 2015 score to [0, 1].
    #[arg(long, default_value_t = false)]
    pub no_reweight_isbi: bool,
}

#[derive(Debug, Args)]
pub struct AggregateArgs {
    /// Directory of prediction volumes [env: LESION_PRED_DIR].
    #[arg(short, long, conflicts_with = "in_file")]
    pub pred_dir: Option<PathBuf>,

    /// Directory of corresponding truth volumes [env: LESION_TRUTH_DIR].
    #[arg(short, long, conflicts_with = "in_file")]
    pub truth_dir: Option<PathBuf>,

    /// CSV file with (at least) `pred` and `truth` columns of volume paths.
    #[arg(short = 'f', long)]
    pub in_file: Option<PathBuf>,

    /// Output table (.csv, .tsv or .json).
    #[arg(short, long)]
    pub out_file: PathBuf,

    /// Append the volume and lesion count correlation of the batch.
    #[arg(short = 'c', long, default_value_t = false)]
    pub output_correlation: bool,

    /// Pair sorted file lists by position instead of by filename stem.
    #[arg(long, default_value_t = false)]
    pub pair_by_order: bool,

    /// Abort on the first failing case instead of skipping it.
    #[arg(long, default_value_t = false)]
    pub fail_fast: bool,

    /// Number of worker threads (0 = all cores).
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    #[command(flatten)]
    pub eval: EvalArgs,
}

#[derive(Debug, Args)]
pub struct LesionArgs {
    /// Prediction volume.
    #[arg(short, long)]
    pub pred: PathBuf,

    /// Truth volume.
    #[arg(short, long)]
    pub truth: PathBuf,

    /// Output table (.csv, .tsv or .json). Printed to stdout as CSV when absent.
    #[arg(short, long)]
    pub out_file: Option<PathBuf>,

    #[command(flatten)]
    pub eval: EvalArgs,
}

fn parse_threshold(s: &str) -> Result<IouThreshold, String> {
    let v: f64 = s.parse().map_err(|e| format!("{e}"))?;
    IouThreshold::new(v).map_err(|e| e.to_string())
}
