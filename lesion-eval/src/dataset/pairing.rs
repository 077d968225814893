//! 病例配对.

use super::{split_filename, CasePaths};
use crate::{PairingError, VolumeFormat};
use itertools::{EitherOrBoth, Itertools};
use std::fs;
use std::path::{Path, PathBuf};

/// 列出 `dir` 下所有可加载的体积文件 (不递归), 按文件名排序.
pub fn discover_volumes<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, PairingError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(PairingError::NotADirectory(dir.to_owned()));
    }
    let io_err = |e| PairingError::Io(dir.to_owned(), e);

    let mut ans = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && VolumeFormat::from_path(&path).is_some() {
            ans.push(path);
        }
    }
    ans.sort();
    Ok(ans)
}

/// 按主干排序的 `(主干, 路径)` 列表. 主干重复时返回错误.
fn stems_of(dir: &Path) -> Result<Vec<(String, PathBuf)>, PairingError> {
    let mut ans: Vec<(String, PathBuf)> = discover_volumes(dir)?
        .into_iter()
        .map(|p| (split_filename(&p).1, p))
        .collect();
    ans.sort_by(|a, b| a.0.cmp(&b.0));
    if let Some(w) = ans.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(PairingError::DuplicateStem(w[0].0.clone(), dir.to_owned()));
    }
    Ok(ans)
}

/// 按文件名主干配对两个目录中的体积文件. 结果按主干排序.
///
/// # 注意
///
/// 1. 只出现在一侧的文件被跳过, 并记录警告.
/// 2. 同一目录下主干重复 (例如 `a.nii` 与 `a.nii.gz`) 是错误.
/// 3. 一对也没有时返回 [`PairingError::NoPairs`].
pub fn pair_by_stem<P: AsRef<Path>, T: AsRef<Path>>(
    pred_dir: P,
    truth_dir: T,
) -> Result<Vec<CasePaths>, PairingError> {
    let pred = stems_of(pred_dir.as_ref())?;
    let truth = stems_of(truth_dir.as_ref())?;

    let mut ans = Vec::with_capacity(pred.len().min(truth.len()));
    for item in pred
        .into_iter()
        .merge_join_by(truth, |(a, _), (b, _)| a.cmp(b))
    {
        match item {
            EitherOrBoth::Both((id, pred), (_, truth)) => ans.push(CasePaths { id, pred, truth }),
            EitherOrBoth::Left((_, p)) => log::warn!("no truth volume matches {p:?}, skipped"),
            EitherOrBoth::Right((_, t)) => log::warn!("no prediction volume matches {t:?}, skipped"),
        }
    }

    if ans.is_empty() {
        return Err(PairingError::NoPairs);
    }
    log::info!("paired {} case(s) by filename stem", ans.len());
    Ok(ans)
}

/// 将两个目录下的体积文件分别按文件名排序, 然后依次配对. 病例标识取预测文件主干.
///
/// 两侧文件个数不一致或为零时返回 [`PairingError::CountMismatch`].
pub fn pair_by_order<P: AsRef<Path>, T: AsRef<Path>>(
    pred_dir: P,
    truth_dir: T,
) -> Result<Vec<CasePaths>, PairingError> {
    let pred = discover_volumes(pred_dir)?;
    let truth = discover_volumes(truth_dir)?;
    if pred.len() != truth.len() || pred.is_empty() {
        return Err(PairingError::CountMismatch(pred.len(), truth.len()));
    }
    Ok(pred
        .into_iter()
        .zip(truth)
        .map(|(p, t)| CasePaths::from_paths(p, t))
        .collect())
}

/// 读取病例列表. 文件为 csv 格式, 首行为表头, 至少包含 `pred` 与 `truth` 两列.
///
/// 可选的 `id` 列作为病例标识, 否则取预测文件主干. 空行被忽略.
/// 不支持带引号的逗号.
pub fn read_case_list<P: AsRef<Path>>(path: P) -> Result<Vec<CasePaths>, PairingError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| PairingError::Io(path.to_owned(), e))?;
    let malformed = |msg: String| PairingError::CaseList(path.to_owned(), msg);

    let split = |line: &str| -> Vec<String> {
        line.split(',')
            .map(|c| c.trim().trim_matches('"').to_owned())
            .collect()
    };

    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = split(lines.next().ok_or_else(|| malformed("empty file".into()))?);
    let column = |name: &str| header.iter().position(|h| h == name);
    let pred_col = column("pred").ok_or_else(|| malformed("missing `pred` column".into()))?;
    let truth_col = column("truth").ok_or_else(|| malformed("missing `truth` column".into()))?;
    let id_col = column("id");

    let mut ans = Vec::new();
    for (row, line) in lines.enumerate() {
        let cells = split(line);
        let cell = |i: usize| {
            cells
                .get(i)
                .filter(|c| !c.is_empty())
                .ok_or_else(|| malformed(format!("row {} has no column {}", row + 1, i)))
        };
        let mut case = CasePaths::from_paths(cell(pred_col)?, cell(truth_col)?);
        if let Some(id) = id_col.and_then(|i| cells.get(i)).filter(|c| !c.is_empty()) {
            case.id = id.clone();
        }
        ans.push(case);
    }

    if ans.is_empty() {
        return Err(PairingError::NoPairs);
    }
    Ok(ans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn touch(dir: &Path, names: &[&str]) {
        for n in names {
            File::create(dir.join(n)).unwrap();
        }
    }

    #[test]
    fn test_discover_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["b.nii.gz", "a.npy", "notes.txt", "c.nii"]);
        let found: Vec<_> = discover_volumes(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| split_filename(p).1)
            .collect();
        assert_eq!(found, ["a", "b", "c"]);
        assert!(matches!(
            discover_volumes(dir.path().join("a.npy")),
            Err(PairingError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_pair_by_stem() {
        let pred = tempfile::tempdir().unwrap();
        let truth = tempfile::tempdir().unwrap();
        touch(pred.path(), &["c1.npy", "c2.nii.gz", "extra.npy"]);
        touch(truth.path(), &["c2.nii", "c1.npy", "lonely.nii"]);

        let cases = pair_by_stem(pred.path(), truth.path()).unwrap();
        let ids: Vec<_> = cases.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2"]);
        assert_eq!(cases[1].truth, truth.path().join("c2.nii"));
    }

    #[test]
    fn test_pair_by_stem_errors() {
        let pred = tempfile::tempdir().unwrap();
        let truth = tempfile::tempdir().unwrap();
        touch(pred.path(), &["a.npy"]);
        touch(truth.path(), &["b.npy"]);
        assert!(matches!(
            pair_by_stem(pred.path(), truth.path()),
            Err(PairingError::NoPairs)
        ));

        touch(pred.path(), &["a.nii"]);
        assert!(matches!(
            pair_by_stem(pred.path(), truth.path()),
            Err(PairingError::DuplicateStem(s, _)) if s == "a"
        ));
    }

    #[test]
    fn test_pair_by_order() {
        let pred = tempfile::tempdir().unwrap();
        let truth = tempfile::tempdir().unwrap();
        touch(pred.path(), &["p1.npy", "p2.npy"]);
        touch(truth.path(), &["t1.npy"]);
        assert!(matches!(
            pair_by_order(pred.path(), truth.path()),
            Err(PairingError::CountMismatch(2, 1))
        ));

        touch(truth.path(), &["t2.npy"]);
        let cases = pair_by_order(pred.path(), truth.path()).unwrap();
        assert_eq!(cases[0].id, "p1");
        assert_eq!(cases[1].truth, truth.path().join("t2.npy"));
    }

    #[test]
    fn test_read_case_list() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("cases.csv");
        fs::write(
            &list,
            "idx,truth,pred,id\n0,t/a.nii,p/a.nii,\n\n1,\"t/b.nii\",p/b.nii,case-b\n",
        )
        .unwrap();
        let cases = read_case_list(&list).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].id, "a");
        assert_eq!(cases[0].pred, PathBuf::from("p/a.nii"));
        assert_eq!(cases[1].id, "case-b");
        assert_eq!(cases[1].truth, PathBuf::from("t/b.nii"));

        fs::write(&list, "pred,label\np.nii,t.nii\n").unwrap();
        assert!(matches!(read_case_list(&list), Err(PairingError::CaseList(..))));
    }
}
