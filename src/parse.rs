use std::{
    path::{Path, PathBuf},
    str::{FromStr, SplitAsciiWhitespace},
};

use derive_more::Display;
use log::{debug, warn};

use crate::{
    error::Error,
    problem::{Alternatives, ConstructionError, Instance, MachineIndex, ProcessingTime},
};

/// File extensions that are considered instance files when searching a directory.
pub const INSTANCE_EXTENSIONS: [&str; 4] = ["fjs", "fjsp", "txt", "dat"];

/// The quantity a token was expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Field {
    #[display(fmt = "the number of jobs")]
    JobCount,
    #[display(fmt = "the number of machines")]
    MachineCount,
    #[display(fmt = "the number of operations of job {}", job)]
    OperationCount { job: usize },
    #[display(fmt = "the number of eligible machines of operation {} of job {}", position, job)]
    AlternativeCount { job: usize, position: usize },
    #[display(fmt = "a machine of operation {} of job {}", position, job)]
    Machine { job: usize, position: usize },
    #[display(fmt = "a processing time of operation {} of job {}", position, job)]
    Duration { job: usize, position: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum FormatErrorKind {
    /// The token stream ended before all declared data was read
    #[display(fmt = "unexpected end of input while reading {}", _0)]
    UnexpectedEof(Field),
    /// A token could not be read as a non-negative integer
    #[display(fmt = "expected a non-negative integer for {}, found '{}'", field, token)]
    ExpectedInt { field: Field, token: String },
    /// A token is an integer, but too large for the field
    #[display(fmt = "'{}' is out of range for {}, which is at most {}", token, field, max)]
    OutOfRange { field: Field, token: String, max: u64 },
    /// The numbers parse, but do not describe a valid instance
    #[display(fmt = "{}", _0)]
    Invalid(ConstructionError),
}

/// A malformed, truncated or semantically invalid instance description.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display(fmt = "malformed instance '{}': {}", instance, kind)]
pub struct FormatError {
    /// The label of the offending instance
    pub instance: String,
    pub kind: FormatErrorKind,
}

impl std::error::Error for FormatError {}

/// An unsigned integer type a token can be read as.
trait Count: FromStr {
    const MAX: u64;
}

impl Count for usize {
    const MAX: u64 = usize::MAX as u64;
}

impl Count for u32 {
    const MAX: u64 = u32::MAX as u64;
}

struct Tokens<'s> {
    inner: SplitAsciiWhitespace<'s>,
}

impl<'s> Tokens<'s> {
    fn next<T: Count>(&mut self, field: Field) -> Result<T, FormatErrorKind> {
        let token = self
            .inner
            .next()
            .ok_or(FormatErrorKind::UnexpectedEof(field))?;

        token.parse().map_err(|_| {
            let token = token.to_string();
            if token.bytes().all(|b| b.is_ascii_digit()) {
                FormatErrorKind::OutOfRange {
                    field,
                    token,
                    max: T::MAX,
                }
            } else {
                FormatErrorKind::ExpectedInt { field, token }
            }
        })
    }
}

/// Parses an instance from a stream of whitespace-delimited integers:
/// `J M`, then for every job `H_j` followed by `H_j` operations, each given as
/// `k` and `k` pairs of `machine duration`.
pub fn parse_instance(name: &str, text: &str) -> Result<Instance, FormatError> {
    parse_tokens(name, text).map_err(|kind| FormatError {
        instance: name.to_string(),
        kind,
    })
}

fn parse_tokens(name: &str, text: &str) -> Result<Instance, FormatErrorKind> {
    let mut tokens = Tokens {
        inner: text.split_ascii_whitespace(),
    };

    let jobs: usize = tokens.next(Field::JobCount)?;
    let machines: usize = tokens.next(Field::MachineCount)?;

    // The declared counts are untrusted, so capacities are bounded by the input length.
    let cap = |n: usize| n.min(text.len());

    let mut routes = Vec::with_capacity(cap(jobs));
    for job in 0..jobs {
        let operations: usize = tokens.next(Field::OperationCount { job })?;
        let mut route = Vec::with_capacity(cap(operations));

        for position in 0..operations {
            let k: usize = tokens.next(Field::AlternativeCount { job, position })?;
            let mut alternatives: Alternatives = Vec::with_capacity(cap(k));
            for _ in 0..k {
                let machine: usize = tokens.next(Field::Machine { job, position })?;
                let duration: ProcessingTime = tokens.next(Field::Duration { job, position })?;
                alternatives.push((MachineIndex::from(machine), duration));
            }
            route.push(alternatives);
        }

        routes.push(route);
    }

    let trailing = tokens.inner.count();
    if trailing > 0 {
        warn!("{name}: ignoring {trailing} trailing tokens");
    }

    Instance::new(name, machines, routes).map_err(FormatErrorKind::Invalid)
}

/// Reads and parses the instance stored at `path`, labelled by its file name.
pub fn read_instance(path: impl AsRef<Path>) -> Result<Instance, Error> {
    let path = path.as_ref();
    let name = instance_label(path);
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;

    let instance = parse_instance(&name, &text)?;
    debug!(
        "Read {}: {} jobs, {} machines, {} operations",
        name,
        instance.jobs(),
        instance.machines(),
        instance.operations().len()
    );

    Ok(instance)
}

/// The label used for an instance file: its file name.
pub fn instance_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Finds instance files below `root`. A file is returned as-is; a directory is
/// searched recursively for files with one of the `INSTANCE_EXTENSIONS`. If
/// `prefer` is given and any path contains it (ignoring case), only those paths
/// are kept. The result is sorted.
pub fn find_instances(root: &Path, prefer: Option<&str>) -> std::io::Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files = Vec::new();
    walk(root, &mut files)?;

    if let Some(pattern) = prefer.map(str::to_lowercase) {
        let preferred: Vec<PathBuf> = files
            .iter()
            .filter(|path| path.to_string_lossy().to_lowercase().contains(&pattern))
            .cloned()
            .collect();

        if !preferred.is_empty() {
            files = preferred;
        }
    }

    files.sort();
    Ok(files)
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk(&path, files)?;
        } else if has_instance_extension(&path) {
            files.push(path);
        }
    }

    Ok(())
}

fn has_instance_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map_or(false, |ext| INSTANCE_EXTENSIONS.contains(&ext.as_str()))
}

/// Writes `instance` back in the token format read by `parse_instance`, one job per line.
pub fn to_instance_text(instance: &Instance) -> String {
    let mut out = format!("{} {}\n", instance.jobs(), instance.machines());
    for route in instance.routes() {
        out.push_str(&route.len().to_string());
        for &o in route {
            let alternatives = instance.operation(o).alternatives();
            out.push_str(&format!(" {}", alternatives.len()));
            for (i, p) in alternatives {
                out.push_str(&format!(" {i} {p}"));
            }
        }
        out.push('\n');
    }
    out
}
