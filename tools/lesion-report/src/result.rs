//! 评估结果输出.

use lesion_eval::batch::{BatchOutcome, SummaryStatistics};
use lesion_eval::consts::{AGGREGATE_LABEL, NOT_APPLICABLE, SUMMARY_LABELS};
use lesion_eval::dataset::CasePaths;
use lesion_eval::metrics::{CaseReport, LesionReport};
use lesion_eval::EvalConfig;
use serde::Serialize;
use std::borrow::Cow;
use std::io::{self, Write};
use std::path::Path;

/// 输出文件格式.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputFormat {
    /// 逗号分隔.
    Csv,
    /// 制表符分隔.
    Tsv,
    /// JSON.
    Json,
}

impl OutputFormat {
    /// 根据扩展名判断格式.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    fn separator(self) -> &'static str {
        match self {
            Self::Tsv => "\t",
            _ => ",",
        }
    }
}

type Column<T> = (&'static str, fn(&T) -> Option<f64>);

/// 病例表的数值列.
fn case_columns() -> [Column<CaseReport>; 12] {
    [
        ("Dice", |r: &CaseReport| Some(r.dice)),
        ("IoU", |r: &CaseReport| Some(r.iou)),
        ("PPV", |r: &CaseReport| r.ppv),
        ("TPR", |r: &CaseReport| r.tpr),
        ("LTPR", |r: &CaseReport| r.ltpr),
        ("LFDR", |r: &CaseReport| Some(r.lfdr)),
        ("AVD", |r: &CaseReport| r.avd),
        ("ISBI15", |r: &CaseReport| r.isbi15),
        ("Pred. Count", |r: &CaseReport| Some(r.pred_count as f64)),
        ("Truth. Count", |r: &CaseReport| Some(r.truth_count as f64)),
        ("Pred. Vol.", |r: &CaseReport| Some(r.pred_volume)),
        ("Truth. Vol.", |r: &CaseReport| Some(r.truth_volume)),
    ]
}

/// 逐病灶表的数值列.
fn lesion_columns() -> [Column<LesionReport>; 11] {
    [
        ("Center Z", |l: &LesionReport| Some(l.centroid[0])),
        ("Center H", |l: &LesionReport| Some(l.centroid[1])),
        ("Center W", |l: &LesionReport| Some(l.centroid[2])),
        ("Voxels", |l: &LesionReport| Some(l.voxels as f64)),
        ("Volume", |l: &LesionReport| Some(l.volume)),
        ("Detected", |l: &LesionReport| Some(if l.detected { 1.0 } else { 0.0 })),
        ("Dice", |l: &LesionReport| Some(l.dice)),
        ("IoU", |l: &LesionReport| Some(l.iou)),
        ("PPV", |l: &LesionReport| Some(l.ppv)),
        ("TPR", |l: &LesionReport| Some(l.tpr)),
        ("AVD", |l: &LesionReport| Some(l.avd)),
    ]
}

const CORRELATION_COLUMNS: [&str; 2] = ["Vol. Correlation", "Count Correlation"];

/// 逐病灶表末尾的病例级列, 只在第一行填写.
const LESION_CASE_COLUMNS: [&str; 6] =
    ["Pred", "Truth", "LFDR", "LTPR", "Pred. Vol.", "Truth. Vol."];

/// 含分隔符, 引号或换行的字段用双引号包裹, 内部引号写两次.
fn quote<'a>(field: &'a str, sep: &str) -> Cow<'a, str> {
    if field.contains(sep) || field.contains(['"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[inline]
fn cell(v: Option<f64>) -> String {
    match v {
        Some(v) => v.to_string(),
        None => NOT_APPLICABLE.to_string(),
    }
}

/// 写出带页脚统计行的表格.
///
/// `extra` 为每行末尾追加的列名. `first_extra` 只填入第一个数据行的这些列,
/// 其余数据行与统计行留空.
fn write_rows<T, W: Write>(
    w: &mut W,
    sep: &str,
    key: &str,
    columns: &[Column<T>],
    rows: &[(String, &T)],
    extra: &[&str],
    first_extra: &[String],
) -> io::Result<()> {
    let blank = vec![""; extra.len()];

    let header: Vec<&str> = std::iter::once(key)
        .chain(columns.iter().map(|c| c.0))
        .chain(extra.iter().copied())
        .collect();
    writeln!(w, "{}", header.join(sep))?;

    for (i, (name, row)) in rows.iter().enumerate() {
        let trailing = (0..extra.len()).map(|j| match first_extra.get(j) {
            Some(v) if i == 0 => quote(v, sep).into_owned(),
            _ => String::new(),
        });
        let cells: Vec<String> = std::iter::once(quote(name, sep).into_owned())
            .chain(columns.iter().map(|c| cell((c.1)(row))))
            .chain(trailing)
            .collect();
        writeln!(w, "{}", cells.join(sep))?;
    }

    let stats: Vec<Option<SummaryStatistics>> = columns
        .iter()
        .map(|c| SummaryStatistics::from_values(rows.iter().filter_map(|(_, r)| (c.1)(r))))
        .collect();
    for (i, label) in SUMMARY_LABELS.iter().enumerate() {
        let cells: Vec<String> = std::iter::once(label.to_string())
            .chain(stats.iter().map(|s| cell(s.map(|s| s.values()[i]))))
            .chain(blank.iter().map(|s| s.to_string()))
            .collect();
        writeln!(w, "{}", cells.join(sep))?;
    }
    Ok(())
}

/// 将批量评估结果写为分隔符表格.
///
/// `correlation` 为真时追加相关系数列和 `aggregate` 行.
pub fn write_case_table<W: Write>(
    w: &mut W,
    outcome: &BatchOutcome,
    format: OutputFormat,
    correlation: bool,
) -> io::Result<()> {
    let sep = format.separator();
    let rows: Vec<(String, &CaseReport)> = outcome
        .reports
        .iter()
        .map(|r| (r.case_id.clone(), r))
        .collect();
    let extra: &[&str] = if correlation { &CORRELATION_COLUMNS } else { &[] };

    let columns = case_columns();
    write_rows(w, sep, "Case", &columns, &rows, extra, &[])?;

    if correlation {
        let cells: Vec<String> = std::iter::once(AGGREGATE_LABEL.to_string())
            .chain(columns.iter().map(|_| String::new()))
            .chain([
                cell(outcome.summary.volume_correlation()),
                cell(outcome.summary.count_correlation()),
            ])
            .collect();
        writeln!(w, "{}", cells.join(sep))?;
    }
    Ok(())
}

/// 将逐病灶结果写为分隔符表格.
///
/// 末尾追加文件名与病例级 LFDR, LTPR, 体积列, 只在第一个病灶行填写.
pub fn write_lesion_table<W: Write>(
    w: &mut W,
    paths: &CasePaths,
    case: &CaseReport,
    lesions: &[LesionReport],
    format: OutputFormat,
) -> io::Result<()> {
    let rows: Vec<(String, &LesionReport)> =
        lesions.iter().map(|l| (l.id.to_string(), l)).collect();
    let file_name = |p: &Path| {
        p.file_name()
            .map_or_else(|| p.display().to_string(), |n| n.to_string_lossy().into_owned())
    };
    let case_cells = [
        file_name(paths.pred.as_path()),
        file_name(paths.truth.as_path()),
        cell(Some(case.lfdr)),
        cell(case.ltpr),
        cell(Some(case.pred_volume)),
        cell(Some(case.truth_volume)),
    ];
    write_rows(
        w,
        format.separator(),
        "Lesion",
        &lesion_columns(),
        &rows,
        &LESION_CASE_COLUMNS,
        &case_cells,
    )
}

#[derive(Serialize)]
struct BatchJson<'a> {
    config: &'a EvalConfig,
    #[serde(flatten)]
    outcome: &'a BatchOutcome,
    volume_correlation: Option<f64>,
    count_correlation: Option<f64>,
}

/// 将批量评估结果写为 JSON.
pub fn write_case_json<W: Write>(
    w: &mut W,
    outcome: &BatchOutcome,
    config: &EvalConfig,
) -> serde_json::Result<()> {
    let doc = BatchJson {
        config,
        outcome,
        volume_correlation: outcome.summary.volume_correlation(),
        count_correlation: outcome.summary.count_correlation(),
    };
    serde_json::to_writer_pretty(w, &doc)
}

#[derive(Serialize)]
struct LesionJson<'a> {
    pred: &'a Path,
    truth: &'a Path,
    case: &'a CaseReport,
    lesions: &'a [LesionReport],
}

/// 将单个病例及其逐病灶结果写为 JSON.
pub fn write_lesion_json<W: Write>(
    w: &mut W,
    paths: &CasePaths,
    case: &CaseReport,
    lesions: &[LesionReport],
) -> serde_json::Result<()> {
    let doc = LesionJson {
        pred: &paths.pred,
        truth: &paths.truth,
        case,
        lesions,
    };
    serde_json::to_writer_pretty(w, &doc)
}

/// 在控制台打印批量评估概要.
pub fn describe_into<W: Write>(w: &mut W, outcome: &BatchOutcome) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.4}"),
            None => NOT_APPLICABLE.to_string(),
        }
    }

    let avg = |f: fn(&CaseReport) -> Option<f64>| outcome.statistics(f).map(|s| s.avg);

    writeln!(w, "Evaluated cases: {}", outcome.reports.len())?;
    writeln!(w, "{S4}Failed cases: {}", outcome.failures.len())?;
    for f in outcome.failures.iter() {
        writeln!(w, "{S4}{S4}{}: {}", f.case_id, f.reason)?;
    }
    if let Some(first) = outcome.reports.first() {
        let unit = if outcome.reports.iter().all(CaseReport::has_physical_volume) {
            first.unit.symbol()
        } else {
            "voxels"
        };
        writeln!(w, "{S4}Volume unit: {unit}")?;
    }
    writeln!(w, "{S4}Mean Dice: {}", f64_to_display(avg(|r| Some(r.dice))))?;
    writeln!(w, "{S4}Mean LTPR: {}", f64_to_display(avg(|r| r.ltpr)))?;
    writeln!(w, "{S4}Mean LFDR: {}", f64_to_display(avg(|r| Some(r.lfdr))))?;
    writeln!(
        w,
        "{S4}Volume correlation: {}",
        f64_to_display(outcome.summary.volume_correlation())
    )?;
    write!(
        w,
        "{S4}Count correlation: {}",
        f64_to_display(outcome.summary.count_correlation())
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesion_eval::metrics::{evaluate_case, evaluate_case_detailed};
    use lesion_eval::LesionMask;

    fn outcome() -> BatchOutcome {
        let config = EvalConfig::default();
        let reports = [(1usize, 2usize), (3, 3), (5, 4)]
            .iter()
            .enumerate()
            .map(|(i, (p, t))| {
                let p = LesionMask::from_positions((1, 1, 8), (0..*p).map(|w| (0, 0, w)), None);
                let t = LesionMask::from_positions((1, 1, 8), (0..*t).map(|w| (0, 0, w)), None);
                evaluate_case(&format!("case{i}"), &p, &t, &config).unwrap()
            })
            .collect();
        BatchOutcome::new(reports, Vec::new())
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(OutputFormat::from_path("a/out.CSV"), Some(OutputFormat::Csv));
        assert_eq!(OutputFormat::from_path("out.tsv"), Some(OutputFormat::Tsv));
        assert_eq!(OutputFormat::from_path("out.json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_path("out.xlsx"), None);
    }

    #[test]
    fn test_case_table_layout() {
        let mut buf = Vec::new();
        write_case_table(&mut buf, &outcome(), OutputFormat::Csv, true).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        // 表头 + 3 个病例 + 7 个统计行 + aggregate 行.
        assert_eq!(lines.len(), 12);
        assert!(lines[0].starts_with("Case,Dice,IoU,PPV,TPR,LTPR,LFDR,AVD,ISBI15"));
        assert!(lines[0].ends_with("Vol. Correlation,Count Correlation"));
        assert!(lines[1].starts_with("case0,"));
        assert!(lines[4].starts_with("Avg,"));
        assert!(lines[10].starts_with("Max,"));
        assert!(lines[11].starts_with("aggregate,"));
        let columns = lines[0].split(',').count();
        assert!(lines.iter().all(|l| l.split(',').count() == columns));
    }

    #[test]
    fn test_not_applicable_cells() {
        let config = EvalConfig::default();
        let e = LesionMask::empty((1, 2, 2), None);
        let r = evaluate_case("empty", &e, &e, &config).unwrap();
        let outcome = BatchOutcome::new(vec![r], Vec::new());

        let mut buf = Vec::new();
        write_case_table(&mut buf, &outcome, OutputFormat::Tsv, false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let row: Vec<&str> = text.lines().nth(1).unwrap().split('\t').collect();
        assert_eq!(row[0], "empty");
        assert_eq!(row[1], "1");
        assert_eq!(row[5], NOT_APPLICABLE);
    }

    #[test]
    fn test_fields_with_separator_are_quoted() {
        assert_eq!(quote("case1", ","), "case1");
        assert_eq!(quote("a,b", ","), "\"a,b\"");
        assert_eq!(quote("a,b", "\t"), "a,b");
        assert_eq!(quote("say \"hi\"", "\t"), "\"say \"\"hi\"\"\"");

        let config = EvalConfig::default();
        let m = LesionMask::from_positions((1, 1, 4), [(0, 0, 1)], None);
        let r = evaluate_case("liver,017", &m, &m, &config).unwrap();
        let outcome = BatchOutcome::new(vec![r], Vec::new());

        let mut buf = Vec::new();
        write_case_table(&mut buf, &outcome, OutputFormat::Csv, false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.starts_with("\"liver,017\",1,"));
        assert_eq!(row.split(',').count(), text.lines().next().unwrap().split(',').count() + 1);
    }

    #[test]
    fn test_lesion_table_case_columns() {
        let truth = LesionMask::from_positions((1, 1, 8), [(0, 0, 0), (0, 0, 1), (0, 0, 5)], None);
        let pred = LesionMask::from_positions((1, 1, 8), [(0, 0, 1)], None);
        let (report, lesions) =
            evaluate_case_detailed("c", &pred, &truth, &EvalConfig::default()).unwrap();
        let paths = CasePaths::from_paths("preds/c.npy", "truths/c.npy");

        let mut buf = Vec::new();
        write_lesion_table(&mut buf, &paths, &report, &lesions, OutputFormat::Tsv).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<Vec<&str>> = text.lines().map(|l| l.split('\t').collect()).collect();

        // 表头 + 2 个病灶 + 7 个统计行.
        assert_eq!(lines.len(), 10);
        let header = &lines[0];
        assert_eq!(header[0], "Lesion");
        assert_eq!(&header[header.len() - 6..], &LESION_CASE_COLUMNS);
        assert!(lines.iter().all(|l| l.len() == header.len()));

        let first = &lines[1];
        let tail = &first[first.len() - 6..];
        assert_eq!(tail[0], "c.npy");
        assert_eq!(tail[1], "c.npy");
        assert_eq!(tail[2], "0");
        assert_eq!(tail[3], "0.5");
        assert_eq!(tail[4], "1");
        assert_eq!(tail[5], "3");
        assert!(lines[2][header.len() - 6..].iter().all(|c| c.is_empty()));
        assert!(lines[3][header.len() - 6..].iter().all(|c| c.is_empty()));
    }

    #[test]
    fn test_describe_volume_unit() {
        let mut buf = Vec::new();
        describe_into(&mut buf, &outcome()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Evaluated cases: 3"));
        assert!(text.contains("Volume unit: voxels"));

        let m = LesionMask::from_positions((1, 1, 4), [(0, 0, 1)], Some([1.0, 1.0, 1.0]));
        let r = evaluate_case("c", &m, &m, &EvalConfig::default()).unwrap();
        let mut buf = Vec::new();
        describe_into(&mut buf, &BatchOutcome::new(vec![r], Vec::new())).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains(&format!("Volume unit: {}", EvalConfig::default().unit.symbol())));
    }

    #[test]
    fn test_json_output() {
        let mut buf = Vec::new();
        write_case_json(&mut buf, &outcome(), &EvalConfig::default()).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(v["reports"].as_array().unwrap().len(), 3);
        assert!(v["volume_correlation"].as_f64().unwrap() > 0.9);
        assert_eq!(v["config"]["reweight_isbi"], serde_json::Value::Bool(true));
    }
}
