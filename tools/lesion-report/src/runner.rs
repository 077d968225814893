//! 程序运行函数.

use crate::cli::{AggregateArgs, Cli, Commands, EvalArgs, LesionArgs};
use crate::result::{self, OutputFormat};
use anyhow::{anyhow, bail, Context, Result};
use lesion_eval::batch::{evaluate_batch, BatchOutcome};
use lesion_eval::components::Connectivity;
use lesion_eval::dataset::CasePaths;
use lesion_eval::metrics::evaluate_case_detailed;
use lesion_eval::{EvalConfig, FailurePolicy, FileSource, LesionMask};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use utils::loader::{self, CaseInput};

/// 实际运行.
pub fn run(cli: Cli) -> Result<()> {
    utils::setup_log(cli.verbose);
    match cli.command {
        Commands::Aggregate(args) => aggregate(args),
        Commands::Lesions(args) => lesions(args),
    }
}

impl EvalArgs {
    /// 转换为评估配置.
    pub fn config(&self) -> EvalConfig {
        let connectivity = if self.face_connectivity {
            Connectivity::Face
        } else {
            Connectivity::Full
        };
        EvalConfig::new()
            .with_iou_threshold(self.iou_threshold)
            .with_connectivity(connectivity)
            .with_unit(self.unit)
            .with_reweight_isbi(!self.no_reweight_isbi)
    }
}

fn output_format(path: &Path) -> Result<OutputFormat> {
    OutputFormat::from_path(path)
        .ok_or_else(|| anyhow!("{path:?} is not a .csv, .tsv or .json file"))
}

fn case_input(args: &AggregateArgs) -> Result<CaseInput> {
    if let Some(list) = &args.in_file {
        return Ok(CaseInput::List(list.clone()));
    }
    let pred = loader::pred_dir_from_arg_or_env(args.pred_dir.as_deref());
    let truth = loader::truth_dir_from_arg_or_env(args.truth_dir.as_deref());
    match (pred, truth) {
        (Some(pred), Some(truth)) => Ok(CaseInput::Dirs {
            pred,
            truth,
            by_order: args.pair_by_order,
        }),
        _ => bail!("provide either (--pred-dir AND --truth-dir) OR --in-file"),
    }
}

fn aggregate(args: AggregateArgs) -> Result<()> {
    let format = output_format(&args.out_file)?;
    let cases: Vec<CasePaths> = case_input(&args)?
        .cases()
        .context("failed to collect prediction/truth pairs")?;
    if args.output_correlation && cases.len() < 2 {
        log::warn!("correlation needs at least 2 cases, it will be reported as n/a");
    }

    let policy = if args.fail_fast {
        FailurePolicy::FailFast
    } else {
        FailurePolicy::Skip
    };
    let config = args.eval.config().with_failure_policy(policy);

    let threads = match args.threads {
        0 => utils::cpus(),
        n => n,
    };
    log::info!("evaluating {} case(s) on {threads} thread(s)", cases.len());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("failed to build thread pool")?;
    let outcome: BatchOutcome = pool
        .install(|| evaluate_batch(&cases, &FileSource, &config))
        .context("batch evaluation aborted")?;

    if outcome.reports.is_empty() {
        bail!("all {} case(s) failed", outcome.failures.len());
    }

    let file = File::create(&args.out_file)
        .with_context(|| format!("failed to create {:?}", args.out_file))?;
    let mut w = BufWriter::new(file);
    match format {
        OutputFormat::Json => result::write_case_json(&mut w, &outcome, &config)?,
        _ => result::write_case_table(&mut w, &outcome, format, args.output_correlation)?,
    }
    w.flush()?;

    let mut stdout = io::stdout().lock();
    utils::sep_to(&mut stdout)?;
    result::describe_into(&mut stdout, &outcome)?;
    writeln!(stdout)?;
    utils::sep_to(&mut stdout)?;
    Ok(())
}

fn lesions(args: LesionArgs) -> Result<()> {
    let format = match &args.out_file {
        Some(path) => output_format(path)?,
        None => OutputFormat::Csv,
    };
    let pred = LesionMask::open(&args.pred).with_context(|| format!("loading {:?}", args.pred))?;
    let truth =
        LesionMask::open(&args.truth).with_context(|| format!("loading {:?}", args.truth))?;

    let case = CasePaths::from_paths(&args.pred, &args.truth);
    let (report, lesions) = evaluate_case_detailed(&case.id, &pred, &truth, &args.eval.config())?;
    log::info!(
        "case `{}`: {} truth lesion(s), LTPR = {:?}, LFDR = {}",
        report.case_id,
        report.truth_count,
        report.ltpr,
        report.lfdr
    );

    let mut w: Box<dyn Write> = match &args.out_file {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {path:?}"))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    match format {
        OutputFormat::Json => result::write_lesion_json(&mut w, &case, &report, &lesions)?,
        _ => result::write_lesion_table(&mut w, &case, &report, &lesions, format)?,
    }
    w.flush()?;
    Ok(())
}
