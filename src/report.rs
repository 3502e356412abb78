//! Result records and their CSV, Markdown and JSON renderings.

use std::{
    borrow::Cow,
    collections::BTreeMap,
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use itertools::Itertools;
use log::info;
use serde::Serialize;

use crate::models::milp::{ModelSize, SolveOutcome, Status};
use crate::problem::Instance;
use crate::solution::Schedule;

/// The outcome of building and solving a single instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub instance: String,
    /// `jobs.operations.machines`, see `Instance::size_descriptor`
    pub size: String,
    pub jobs: usize,
    pub machines: usize,
    pub operations: usize,
    pub binary_vars: usize,
    pub continuous_vars: usize,
    pub constraints: usize,
    /// Best makespan found. `None` if the solver returned without an incumbent.
    pub makespan: Option<f64>,
    pub gap: Option<f64>,
    pub time_s: f64,
    pub status: Status,
    #[serde(skip)]
    pub schedule: Option<Schedule>,
}

impl ResultRecord {
    /// The record of `instance`, whose problem had `size` and was solved to `outcome`.
    pub fn extract(instance: &Instance, size: ModelSize, outcome: &SolveOutcome) -> ResultRecord {
        ResultRecord {
            instance: instance.name().to_string(),
            size: instance.size_descriptor(),
            jobs: instance.jobs(),
            machines: instance.machines(),
            operations: instance.operations().len(),
            binary_vars: size.binaries,
            continuous_vars: size.continuous,
            constraints: size.constraints,
            makespan: outcome.objective,
            gap: outcome.gap,
            time_s: outcome.runtime,
            status: outcome.status.clone(),
            schedule: None,
        }
    }
}

/// One line of a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Row {
    Solved(ResultRecord),
    Failed { instance: String, error: String },
}

impl Row {
    pub fn instance(&self) -> &str {
        match self {
            Row::Solved(record) => &record.instance,
            Row::Failed { instance, .. } => instance,
        }
    }

    pub fn record(&self) -> Option<&ResultRecord> {
        match self {
            Row::Solved(record) => Some(record),
            Row::Failed { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Row::Failed { .. })
    }

    /// The cells of the row in `FIELDS` order, `None` where the field is absent
    fn cells(&self, number: impl Fn(f64) -> String) -> [Option<String>; 13] {
        match self {
            Row::Solved(r) => [
                Some(r.instance.clone()),
                Some(r.size.clone()),
                Some(r.jobs.to_string()),
                Some(r.machines.to_string()),
                Some(r.operations.to_string()),
                Some(r.binary_vars.to_string()),
                Some(r.continuous_vars.to_string()),
                Some(r.constraints.to_string()),
                r.makespan.map(&number),
                r.gap.map(&number),
                Some(number(r.time_s)),
                Some(r.status.to_string()),
                None,
            ],
            Row::Failed { instance, error } => [
                Some(instance.clone()),
                None,
                None,
                None,
                None,
                None,
                None,
                None,
                None,
                None,
                None,
                None,
                Some(error.clone()),
            ],
        }
    }
}

/// Column names of the CSV report
pub const FIELDS: [&str; 13] = [
    "instance",
    "size",
    "jobs",
    "machines",
    "operations",
    "binary_vars",
    "continuous_vars",
    "constraints",
    "makespan",
    "gap",
    "time_s",
    "status",
    "error",
];

/// Column titles of the Markdown report, in `FIELDS` order
const TITLES: [&str; 13] = [
    "Instance",
    "Size",
    "Jobs",
    "Machines",
    "Ops",
    "Bin. vars",
    "Cont. vars",
    "Constraints",
    "Cmax",
    "Gap",
    "Time (s)",
    "Status",
    "Error",
];

const PLACEHOLDER: &str = "-";

fn csv_escape(field: &str) -> Cow<'_, str> {
    if field.contains(|c| matches!(c, ',' | '"' | '\n' | '\r')) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn markdown_escape(cell: &str) -> String {
    cell.replace('|', "\\|").replace('\n', " ")
}

/// Writes one header line and one line per row. Absent fields are left empty.
pub fn write_csv<W: Write>(w: &mut W, rows: &[Row]) -> io::Result<()> {
    writeln!(w, "{}", FIELDS.join(","))?;
    for row in rows {
        let line = row
            .cells(|x| x.to_string())
            .iter()
            .map(|cell| csv_escape(cell.as_deref().unwrap_or("")).into_owned())
            .join(",");
        writeln!(w, "{}", line)?;
    }
    Ok(())
}

/// Formats `value` with `digits` significant digits and no trailing zeros, in
/// scientific notation when the exponent is below -4 or at least `digits`.
pub fn format_significant(value: f64, digits: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let digits = digits.max(1);
    let exponent = value.abs().log10().floor() as i32;
    if exponent < -4 || exponent >= digits as i32 {
        let formatted = format!("{:.*e}", digits - 1, value);
        match formatted.split_once('e') {
            Some((mantissa, exp)) => format!("{}e{}", trim_zeros(mantissa), exp),
            None => formatted,
        }
    } else {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        trim_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_zeros(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// The leading alphabetic part of an instance label, e.g. `MFJS` for `MFJS10.txt`
pub fn family(label: &str) -> &str {
    let end = label
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(label.len());
    if end == 0 {
        "other"
    } else {
        &label[..end]
    }
}

#[derive(Debug, Default)]
struct FamilySummary {
    instances: usize,
    times: Vec<f64>,
    gaps: Vec<f64>,
    makespans: Vec<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn markdown_row<W: Write>(w: &mut W, cells: &[String]) -> io::Result<()> {
    writeln!(w, "| {} |", cells.join(" | "))
}

/// Writes the human-readable report: a timestamp, the result table and a table of
/// averages per instance family over the rows that found a solution.
pub fn write_markdown<W: Write>(
    w: &mut W,
    rows: &[Row],
    generated: DateTime<Local>,
) -> io::Result<()> {
    writeln!(w, "# FJSP MILP results")?;
    writeln!(w)?;
    writeln!(w, "_Generated {}_", generated.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(w)?;

    markdown_row(w, &TITLES.map(String::from))?;
    markdown_row(w, &TITLES.map(|_| "---".to_string()))?;
    for row in rows {
        let cells = row
            .cells(|x| format_significant(x, 4))
            .map(|cell| cell.map_or_else(|| PLACEHOLDER.to_string(), |c| markdown_escape(&c)));
        markdown_row(w, &cells)?;
    }

    let mut families: BTreeMap<&str, FamilySummary> = BTreeMap::new();
    for record in rows.iter().filter_map(Row::record) {
        let makespan = match record.makespan {
            Some(makespan) => makespan,
            None => continue,
        };
        let summary = families.entry(family(&record.instance)).or_default();
        summary.instances += 1;
        summary.times.push(record.time_s);
        summary.makespans.push(makespan);
        summary.gaps.extend(record.gap);
    }

    if !families.is_empty() {
        writeln!(w)?;
        writeln!(w, "## Averages per family")?;
        writeln!(w)?;
        let titles = ["Family", "Instances", "Time (s)", "Gap", "Cmax"].map(String::from);
        markdown_row(w, &titles)?;
        markdown_row(w, &titles.clone().map(|_| "---".to_string()))?;

        let number = |x: Option<f64>| {
            x.map_or_else(|| PLACEHOLDER.to_string(), |x| format_significant(x, 4))
        };
        for (name, summary) in &families {
            markdown_row(
                w,
                &[
                    markdown_escape(name),
                    summary.instances.to_string(),
                    number(mean(&summary.times)),
                    number(mean(&summary.gaps)),
                    number(mean(&summary.makespans)),
                ],
            )?;
        }
    }

    Ok(())
}

/// Writes every row as a pretty-printed JSON array.
pub fn write_json<W: Write>(w: &mut W, rows: &[Row]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *w, rows)?;
    writeln!(w)
}

/// Where the reports of a run end up, all derived from one base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub csv: PathBuf,
    pub markdown: PathBuf,
    pub json: Option<PathBuf>,
}

impl ReportPaths {
    /// `<base>.csv`, `<base>.md` and, with `json`, `<base>.json`. Any extension of
    /// `base` is replaced.
    pub fn new(base: &Path, json: bool) -> ReportPaths {
        ReportPaths {
            csv: base.with_extension("csv"),
            markdown: base.with_extension("md"),
            json: json.then(|| base.with_extension("json")),
        }
    }

    pub fn write(&self, rows: &[Row]) -> io::Result<()> {
        write_file(&self.csv, |w| write_csv(w, rows))?;
        write_file(&self.markdown, |w| write_markdown(w, rows, Local::now()))?;
        if let Some(path) = &self.json {
            write_file(path, |w| write_json(w, rows))?;
        }
        Ok(())
    }
}

/// Creates `path` (and its parent directories) and fills it with `fill`.
pub fn write_file<F>(path: &Path, fill: F) -> io::Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    fill(&mut w)?;
    w.flush()?;
    info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solved(instance: &str, makespan: Option<f64>, gap: Option<f64>, time_s: f64) -> Row {
        Row::Solved(ResultRecord {
            instance: instance.to_string(),
            size: "2.2.2".to_string(),
            jobs: 2,
            machines: 2,
            operations: 3,
            binary_vars: 6,
            continuous_vars: 4,
            constraints: 10,
            makespan,
            gap,
            time_s,
            status: if makespan.is_some() {
                Status::Optimal
            } else {
                Status::TimeLimit
            },
            schedule: None,
        })
    }

    fn failed(instance: &str, error: &str) -> Row {
        Row::Failed {
            instance: instance.to_string(),
            error: error.to_string(),
        }
    }

    #[test]
    fn a_stop_at_the_time_limit_without_incumbent_has_no_makespan() {
        let instance = crate::parse::parse_instance("MFJS9.txt", "1 3\n1 2 0 4 2 6\n").unwrap();
        let size = ModelSize {
            binaries: 2,
            continuous: 2,
            constraints: 2,
        };
        let outcome = SolveOutcome::without_incumbent(Status::TimeLimit, 3600.0);
        let record = ResultRecord::extract(&instance, size, &outcome);

        assert_eq!(record.makespan, None);
        assert_eq!(record.gap, None);
        assert_eq!(record.time_s, 3600.0);
        assert_eq!(record.status, Status::TimeLimit);
        assert_eq!(record.machines, 3);
        assert_eq!(record.binary_vars, 2);

        let mut out = Vec::new();
        write_csv(&mut out, &[Row::Solved(record)]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.lines().nth(1),
            Some("MFJS9.txt,1.1.3,1,3,1,2,2,2,,,3600,time_limit,")
        );
    }

    #[test]
    fn csv_leaves_absent_fields_empty() {
        let rows = vec![
            solved("MFJS1.txt", Some(5.0), Some(0.0), 0.25),
            solved("MFJS2.txt", None, None, 3600.0),
            failed("bad.txt", "malformed instance 'bad.txt': missing token, \"job count\""),
        ];
        let mut out = Vec::new();
        write_csv(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "instance,size,jobs,machines,operations,binary_vars,continuous_vars,constraints,makespan,gap,time_s,status,error"
        );
        assert_eq!(lines[1], "MFJS1.txt,2.2.2,2,2,3,6,4,10,5,0,0.25,optimal,");
        assert_eq!(lines[2], "MFJS2.txt,2.2.2,2,2,3,6,4,10,,,3600,time_limit,");
        assert_eq!(
            lines[3],
            "bad.txt,,,,,,,,,,,,\"malformed instance 'bad.txt': missing token, \"\"job count\"\"\""
        );
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn csv_of_no_rows_is_just_the_header() {
        let mut out = Vec::new();
        write_csv(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }

    #[test]
    fn significant_digits() {
        assert_eq!(format_significant(0.5, 4), "0.5");
        assert_eq!(format_significant(123.456, 4), "123.5");
        assert_eq!(format_significant(3600.0, 4), "3600");
        assert_eq!(format_significant(123456.0, 4), "1.235e5");
        assert_eq!(format_significant(0.00001234, 4), "1.234e-5");
        assert_eq!(format_significant(0.0, 4), "0");
        assert_eq!(format_significant(-2.5, 4), "-2.5");
    }

    #[test]
    fn families_are_leading_letters() {
        assert_eq!(family("MFJS10.txt"), "MFJS");
        assert_eq!(family("sfjs01.fjs"), "sfjs");
        assert_eq!(family("01.fjs"), "other");
    }

    #[test]
    fn markdown_uses_placeholders_and_summarizes_families() {
        let rows = vec![
            solved("MFJS1.txt", Some(5.0), Some(0.0), 1.0),
            solved("MFJS2.txt", Some(8.0), Some(0.1), 3.0),
            solved("SFJS1.txt", None, None, 3600.0),
            failed("bad.txt", "a | b"),
        ];
        let mut out = Vec::new();
        write_markdown(&mut out, &rows, Local::now()).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains(
            "| Instance | Size | Jobs | Machines | Ops | Bin. vars | Cont. vars | Constraints | Cmax | Gap | Time (s) | Status | Error |"
        ));
        assert!(text.contains(
            "| MFJS1.txt | 2.2.2 | 2 | 2 | 3 | 6 | 4 | 10 | 5 | 0 | 1 | optimal | - |"
        ));
        assert!(text.contains(
            "| SFJS1.txt | 2.2.2 | 2 | 2 | 3 | 6 | 4 | 10 | - | - | 3600 | time_limit | - |"
        ));
        assert!(text.contains("| bad.txt | - | - | - | - | - | - | - | - | - | - | - | a \\| b |"));
        // SFJS has no incumbent, so only MFJS is summarized
        assert!(text.contains("| MFJS | 2 | 2 | 0.05 | 6.5 |"));
        assert!(!text.contains("| SFJS |"));
    }

    #[test]
    fn json_keeps_failures_distinguishable() {
        let rows = vec![solved("a.txt", None, None, 1.0), failed("b.txt", "boom")];
        let mut out = Vec::new();
        write_json(&mut out, &rows).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value[0]["instance"], "a.txt");
        assert!(value[0]["makespan"].is_null());
        assert_eq!(value[0]["status"], "time_limit");
        assert_eq!(value[1]["error"], "boom");
        assert!(value[1].get("status").is_none());
    }

    #[test]
    fn report_paths_share_a_base() {
        let paths = ReportPaths::new(Path::new("out/results_fattahi.csv"), true);
        assert_eq!(paths.csv, Path::new("out/results_fattahi.csv"));
        assert_eq!(paths.markdown, Path::new("out/results_fattahi.md"));
        assert_eq!(paths.json.as_deref(), Some(Path::new("out/results_fattahi.json")));

        assert_eq!(ReportPaths::new(Path::new("results"), false).json, None);
    }

    #[test]
    fn writes_every_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ReportPaths::new(&dir.path().join("nested").join("run"), true);
        paths.write(&[solved("a.txt", Some(1.0), Some(0.0), 0.1)]).unwrap();

        assert!(std::fs::read_to_string(&paths.csv).unwrap().contains("a.txt"));
        assert!(std::fs::read_to_string(&paths.markdown).unwrap().contains("| a.txt |"));
        assert!(paths.json.as_ref().map_or(false, |p| p.exists()));
    }
}
