//! Interactive CSV picker.
//!
//! This is intentionally kept separate from clap parsing:
//! - clap handles structured flags/subcommands
//! - the picker provides the "run `lsm fit` and choose a CSV" UX
//!
//! The picker searches for `*.csv` files under the current working directory,
//! skipping build and VCS directories.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Default directory recursion depth for finding CSV files.
const DEFAULT_SEARCH_DEPTH: usize = 4;

/// What a CSV looks like from its header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Partition,
    Ratios,
    Unknown,
}

impl TableKind {
    fn label(self) -> &'static str {
        match self {
            TableKind::Partition => "partition table",
            TableKind::Ratios => "ratio table",
            TableKind::Unknown => "?",
        }
    }
}

/// Classify a CSV by its header row without loading the rows.
pub fn sniff_table_kind(path: &Path) -> TableKind {
    let Ok(mut reader) = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path) else {
        return TableKind::Unknown;
    };
    let Ok(headers) = reader.headers() else {
        return TableKind::Unknown;
    };
    let names: Vec<String> = headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_lowercase())
        .collect();
    let has = |alias: &[&str]| names.iter().any(|n| alias.contains(&n.as_str()));
    if has(&["element"]) && has(&["di", "d"]) {
        TableKind::Partition
    } else if has(&["radii"]) {
        TableKind::Ratios
    } else {
        TableKind::Unknown
    }
}

/// Prompt the user to select a partition CSV from the current directory tree.
///
/// Behavior:
/// - list discovered `*.csv` files, tagged with their table kind
/// - accept either a number (from the list) or an explicit path
/// - `q` cancels
pub fn prompt_for_csv_path() -> Result<PathBuf, AppError> {
    let files = discover_csv_files();
    if files.is_empty() {
        return Err(AppError::new(
            2,
            "No .csv files found. Provide one with `lsm fit -f <file.csv>`.",
        ));
    }

    println!("Found {} CSV file(s):", files.len());
    for (idx, path) in files.iter().enumerate() {
        println!("{:>3}) {} [{}]", idx + 1, pretty_path(path), sniff_table_kind(path).label());
    }

    loop {
        print!("Select a file by number (1-{}) or type a path (q to quit): ", files.len());
        io::stdout()
            .flush()
            .map_err(|e| AppError::new(2, format!("Failed to write prompt: {e}")))?;

        let mut input = String::new();
        let bytes = io::stdin()
            .read_line(&mut input)
            .map_err(|e| AppError::new(2, format!("Failed to read input: {e}")))?;

        if bytes == 0 {
            return Err(AppError::new(
                2,
                "No input received. Provide a CSV path with `lsm fit -f <file.csv>`.",
            ));
        }

        let input = input.trim();
        if input.eq_ignore_ascii_case("q") {
            return Err(AppError::new(2, "Canceled."));
        }

        if let Ok(choice) = input.parse::<usize>() {
            if (1..=files.len()).contains(&choice) {
                return validate_csv_path(&files[choice - 1]);
            }
            println!("Invalid choice: {choice}. Enter a number between 1 and {}.", files.len());
            continue;
        }

        let candidate = PathBuf::from(input);
        match validate_csv_path(&candidate) {
            Ok(path) => return Ok(path),
            Err(err) => {
                println!("{err}");
                continue;
            }
        }
    }
}

/// Validate the provided path points to a `.csv` file.
pub fn validate_csv_path(path: &Path) -> Result<PathBuf, AppError> {
    if !path.exists() {
        return Err(AppError::new(
            2,
            format!("CSV file not found: {}", path.display()),
        ));
    }
    if path.is_dir() {
        return Err(AppError::new(
            2,
            format!("Expected a file, got a directory: {}", path.display()),
        ));
    }
    if path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        != Some(true)
    {
        return Err(AppError::new(
            2,
            format!(
                "Expected a .csv file (got: {}). Use -f to pass a CSV path.",
                path.display()
            ),
        ));
    }

    Ok(path.to_path_buf())
}

/// Discover `*.csv` files under the current directory (deterministic order).
pub fn discover_csv_files() -> Vec<PathBuf> {
    find_csv_files(Path::new("."), DEFAULT_SEARCH_DEPTH)
}

fn find_csv_files(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut out = Vec::new();
    find_csv_files_inner(root, 0, max_depth, &mut out);
    out.sort_by(|a, b| pretty_path(a).cmp(&pretty_path(b)));
    out
}

fn find_csv_files_inner(root: &Path, depth: usize, max_depth: usize, out: &mut Vec<PathBuf>) {
    if depth > max_depth {
        return;
    }

    let Ok(entries) = fs::read_dir(root) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(_) => continue,
        };

        if file_type.is_dir() {
            if should_skip_dir(&path) {
                continue;
            }
            find_csv_files_inner(&path, depth + 1, max_depth, out);
            continue;
        }

        if file_type.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                == Some(true)
        {
            out.push(path);
        }
    }
}

fn should_skip_dir(path: &Path) -> bool {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    matches!(name, ".git" | "target" | "node_modules")
}

fn pretty_path(path: &Path) -> String {
    let stripped = path.strip_prefix("./").unwrap_or(path);
    stripped.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lsm-picker-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn finds_csv_files_and_skips_build_dirs() {
        let root = scratch("find");
        fs::create_dir_all(root.join("runs")).unwrap();
        fs::create_dir_all(root.join("target")).unwrap();
        fs::write(root.join("b.csv"), "x").unwrap();
        fs::write(root.join("runs").join("a.CSV"), "x").unwrap();
        fs::write(root.join("target").join("skip.csv"), "x").unwrap();
        fs::write(root.join("notes.txt"), "x").unwrap();

        let found = find_csv_files(&root, DEFAULT_SEARCH_DEPTH);
        fs::remove_dir_all(&root).ok();

        let names: Vec<String> = found
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"b.csv".to_string()));
        assert!(names.contains(&"a.CSV".to_string()));
    }

    #[test]
    fn sniffs_table_kind_from_header() {
        let root = scratch("sniff");
        let partition = root.join("p.csv");
        let ratios = root.join("r.csv");
        let other = root.join("o.csv");
        fs::write(&partition, "\u{feff}Element,ri,Di,1s,T [C],P [GPa]\nLu,0.977,45,3,1000,1\n").unwrap();
        fs::write(&ratios, "radii,zrn-1\n0.977,2.0\n").unwrap();
        fs::write(&other, "a,b\n1,2\n").unwrap();

        assert_eq!(sniff_table_kind(&partition), TableKind::Partition);
        assert_eq!(sniff_table_kind(&ratios), TableKind::Ratios);
        assert_eq!(sniff_table_kind(&other), TableKind::Unknown);
        assert_eq!(sniff_table_kind(&root.join("missing.csv")), TableKind::Unknown);
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn rejects_non_csv_paths() {
        let root = scratch("validate");
        let txt = root.join("table.txt");
        fs::write(&txt, "x").unwrap();

        assert_eq!(validate_csv_path(&txt).unwrap_err().exit_code(), 2);
        assert_eq!(validate_csv_path(&root).unwrap_err().exit_code(), 2);
        assert_eq!(validate_csv_path(&root.join("missing.csv")).unwrap_err().exit_code(), 2);
        fs::remove_dir_all(&root).ok();
    }
}
