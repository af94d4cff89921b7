use ssvep_core::{DisplayError, ExternalSeries, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Source of named brightness tables for StartSSVEP's `time_series`
pub trait TimeSeriesStore: Send + Sync {
    fn load(&self, name: &str) -> Result<ExternalSeries>;
}

impl TimeSeriesStore for HashMap<String, ExternalSeries> {
    fn load(&self, name: &str) -> Result<ExternalSeries> {
        self.get(name)
            .cloned()
            .ok_or_else(|| DisplayError::command(format!("unknown time-series table `{name}`")))
    }
}

/// Directory of `<name>.csv` tables. The first column is the seconds index,
/// every other column is one patch.
#[derive(Debug, Clone)]
pub struct CsvTimeSeriesStore {
    root: PathBuf,
}

impl CsvTimeSeriesStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let plain = !name.is_empty()
            && name != ".."
            && !name.contains(['/', '\\'])
            && name != ".";
        if !plain {
            return Err(DisplayError::command(format!(
                "time-series table name `{name}` is not a plain file name"
            )));
        }
        Ok(self.root.join(format!("{name}.csv")))
    }
}

impl TimeSeriesStore for CsvTimeSeriesStore {
    fn load(&self, name: &str) -> Result<ExternalSeries> {
        let path = self.path_for(name)?;
        let text = std::fs::read_to_string(&path).map_err(|e| {
            DisplayError::command(format!(
                "unknown time-series table `{name}` ({}: {e})",
                path.display()
            ))
        })?;
        parse_csv(&text).map_err(|e| match e {
            DisplayError::Format(msg) => DisplayError::format(format!("{name}.csv: {msg}")),
            other => other,
        })
    }
}

pub fn parse_csv(text: &str) -> Result<ExternalSeries> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        return Err(DisplayError::format("table is empty"));
    };
    let names: Vec<&str> = header.split(',').map(str::trim).skip(1).collect();
    if names.is_empty() {
        return Err(DisplayError::format("table has no patch columns"));
    }
    if let Some(blank) = names.iter().position(|n| n.is_empty()) {
        return Err(DisplayError::format(format!(
            "column {} has an empty name",
            blank + 1
        )));
    }

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    for (line_no, line) in lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != names.len() + 1 {
            return Err(DisplayError::format(format!(
                "line {} has {} fields, expected {}",
                line_no + 1,
                fields.len(),
                names.len() + 1
            )));
        }
        for (col, field) in fields[1..].iter().enumerate() {
            let v = field.parse::<f64>().map_err(|_| {
                DisplayError::format(format!(
                    "line {} column `{}` is not a number: `{field}`",
                    line_no + 1,
                    names[col]
                ))
            })?;
            columns[col].push(v);
        }
    }

    Ok(names
        .into_iter()
        .map(str::to_string)
        .zip(columns)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table() {
        let table = parse_csv("seconds,A,B\n0.00,0.1,1\n0.01,0.2,0\n\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("A"), Some(&[0.1, 0.2][..]));
        assert_eq!(table.get("B"), Some(&[1.0, 0.0][..]));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_csv(""), Err(DisplayError::Format(_))));
        assert!(parse_csv("seconds\n0\n").is_err());
        let err = parse_csv("seconds,A\n0,x\n").unwrap_err();
        assert!(err.to_string().contains("column `A`"));
        assert!(parse_csv("seconds,A,B\n0,1\n").is_err());
    }

    #[test]
    fn test_directory_store() {
        let dir = std::env::temp_dir().join(format!("ssvep-store-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("alpha.csv"), "seconds,A\n0,0.5\n0.01,0.25\n").unwrap();

        let store = CsvTimeSeriesStore::new(&dir);
        assert_eq!(store.load("alpha").unwrap().get("A"), Some(&[0.5, 0.25][..]));
        assert!(matches!(store.load("beta"), Err(DisplayError::Command(_))));
        assert!(store.load("../alpha").is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_map_store() {
        let mut store = HashMap::new();
        store.insert(
            "t".to_string(),
            ExternalSeries::from_iter([("A".to_string(), vec![1.0])]),
        );
        assert!(store.load("t").is_ok());
        assert!(store.load("u").is_err());
    }
}
