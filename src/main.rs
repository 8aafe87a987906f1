//! Source Line Counting Tool
//!
//! Walks a directory tree, assigns each file to a language by its extension,
//! and reports total, blank, comment and code line counts aggregated per
//! language, with an optional per-file breakdown.
//!
//! Supported languages: Python, JavaScript, TypeScript, Java, C, C++, C#,
//! PHP, Ruby, Go, Rust, Swift, Kotlin, Scala, Shell, Bash, Zsh, Fish,
//! PowerShell, R, Objective-C/MATLAB, Objective-C++, Perl, Lua, Dart, Elm,
//! Elixir, Clojure, Haskell, OCaml, F#, Visual Basic, Pascal, D, Nim,
//! Crystal, Julia, Zig.

use clap::Parser;
use std::collections::{HashMap, HashSet};
use std::env;
use std::ffi::OsString;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use colored::*;

// Column widths for the per-language table.
const LANG_WIDTH: usize = 15;
const FILES_WIDTH: usize = 8;
const COUNT_WIDTH: usize = 10;
const COMMENT_WIDTH: usize = 12;
const RULE_WIDTH: usize = 80;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Count source lines by language across a directory tree",
    long_about = "Counts total, blank, comment and code lines for every recognized source \
file below a directory, aggregated per language. Version-control, dependency and \
build-output directories are always skipped; hidden files and directories are skipped \
unless --all is given."
)]
struct Args {
    /// Directory to scan
    #[arg(default_value = ".")]
    directory: String,

    /// Show a per-file detail section after the summary
    #[arg(short, long)]
    files: bool,

    /// Include hidden files and directories
    #[arg(short, long)]
    all: bool,

    /// Additional directory names to exclude (merged with the built-in set)
    #[arg(short, long, value_name = "NAME", num_args = 1..)]
    exclude: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct LineCounts {
    total: u64,
    empty: u64,
    comment: u64,
    code: u64,
}

impl LineCounts {
    fn add(&mut self, other: &LineCounts) {
        self.total += other.total;
        self.empty += other.empty;
        self.comment += other.comment;
        self.code += other.code;
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct LanguageTotals {
    files: u64,
    counts: LineCounts,
}

#[derive(Debug)]
struct FileRecord {
    path: PathBuf,
    language: &'static str,
    counts: LineCounts,
}

#[derive(Debug, Default)]
struct ScanResult {
    totals: HashMap<&'static str, LanguageTotals>,
    files: Vec<FileRecord>,
}

/// Comment markers for one extension: at most one single-line marker and at
/// most one block pair.
#[derive(Debug, Default, Clone, Copy)]
struct CommentSyntax {
    line: Option<&'static str>,
    block: Option<(&'static str, &'static str)>,
}

/// Identify the language from a lowercased extension (without the dot).
/// Returns a static string to avoid allocations; callers can `.to_string()`
/// when needed. Unknown extensions yield `None` and the file is skipped.
fn language_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "py" => Some("Python"),
        "js" => Some("JavaScript"),
        "ts" => Some("TypeScript"),
        "java" => Some("Java"),
        "c" => Some("C"),
        "cpp" | "cc" | "cxx" => Some("C++"),
        "h" => Some("C/C++ Header"),
        "hpp" => Some("C++ Header"),
        "cs" => Some("C#"),
        "php" => Some("PHP"),
        "rb" => Some("Ruby"),
        "go" => Some("Go"),
        "rs" => Some("Rust"),
        "swift" => Some("Swift"),
        "kt" => Some("Kotlin"),
        "scala" => Some("Scala"),
        "sh" => Some("Shell"),
        "bash" => Some("Bash"),
        "zsh" => Some("Zsh"),
        "fish" => Some("Fish"),
        "ps1" => Some("PowerShell"),
        "r" => Some("R"),
        "m" => Some("Objective-C/MATLAB"),
        "mm" => Some("Objective-C++"),
        "pl" => Some("Perl"),
        "lua" => Some("Lua"),
        "dart" => Some("Dart"),
        "elm" => Some("Elm"),
        "ex" | "exs" => Some("Elixir"),
        "clj" => Some("Clojure"),
        "hs" => Some("Haskell"),
        "ml" => Some("OCaml"),
        "fs" => Some("F#"),
        "vb" => Some("Visual Basic"),
        "pas" => Some("Pascal"),
        "d" => Some("D"),
        "nim" => Some("Nim"),
        "cr" => Some("Crystal"),
        "jl" => Some("Julia"),
        "zig" => Some("Zig"),
        _ => None,
    }
}

/// Comment markers for a lowercased extension. Extensions without an entry
/// here still count, every non-blank line is code for them.
fn comment_syntax_for_extension(ext: &str) -> CommentSyntax {
    let line = match ext {
        "py" | "sh" | "bash" | "zsh" | "fish" | "r" | "pl" | "nim" | "jl" => Some("#"),
        "js" | "ts" | "java" | "c" | "cpp" | "cc" | "cxx" | "h" | "hpp" | "cs" | "php"
        | "go" | "rs" | "swift" | "kt" | "scala" | "dart" | "d" | "zig" => Some("//"),
        "clj" => Some(";"),
        "hs" | "elm" | "lua" => Some("--"),
        "m" => Some("%"),
        "vb" => Some("'"),
        "ml" | "fs" | "pas" => Some("(*"),
        _ => None,
    };
    // A single block style per extension. Languages with a second legal
    // block form (Python's ''' next to """) keep only the first listed;
    // changing this would change observable counts on ambiguous lines.
    let block = match ext {
        "js" | "ts" | "java" | "c" | "cpp" | "cc" | "cxx" | "h" | "hpp" | "cs" | "php"
        | "go" | "rs" | "swift" | "kt" | "scala" | "dart" | "d" => Some(("/*", "*/")),
        "py" => Some(("\"\"\"", "\"\"\"")),
        "rb" => Some(("=begin", "=end")),
        "lua" => Some(("--[[", "--]]")),
        "hs" | "elm" => Some(("{-", "-}")),
        "ml" | "fs" | "pas" => Some(("(*", "*)")),
        _ => None,
    };
    CommentSyntax { line, block }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Empty,
    Comment,
    Code,
}

/// Classifies the lines of one file in order. Carries the only piece of
/// cross-line state: whether the scan is currently inside a block comment.
struct LineClassifier {
    syntax: CommentSyntax,
    in_block: bool,
}

impl LineClassifier {
    fn new(syntax: CommentSyntax) -> Self {
        LineClassifier {
            syntax,
            in_block: false,
        }
    }

    fn classify(&mut self, line: &str) -> LineKind {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return LineKind::Empty;
        }
        if let Some((start, end)) = self.syntax.block {
            if self.in_block {
                if trimmed.contains(end) {
                    self.in_block = false;
                }
                return LineKind::Comment;
            }
            if let Some(start_pos) = trimmed.find(start) {
                // The block closes on its opening line only when the end
                // marker sits strictly after the start marker; a symmetric
                // marker ("""...) therefore stays open. Trailing text after
                // a close never counts as code.
                self.in_block = true;
                if let Some(end_pos) = trimmed.find(end) {
                    if end_pos > start_pos {
                        self.in_block = false;
                    }
                }
                return LineKind::Comment;
            }
        }
        if let Some(marker) = self.syntax.line {
            if trimmed.starts_with(marker) {
                return LineKind::Comment;
            }
        }
        LineKind::Code
    }
}

/// Reads a file's content as lines, dropping invalid UTF-8 byte sequences
/// rather than failing on them.
struct LenientLineReader {
    reader: BufReader<Box<dyn Read + Send>>,
    buffer: Vec<u8>,
}

impl LenientLineReader {
    fn new(file: fs::File) -> Self {
        Self::from_reader(Box::new(file))
    }

    fn from_reader(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader: BufReader::new(reader),
            buffer: Vec::with_capacity(8 * 1024),
        }
    }

    #[cfg(test)]
    fn with_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self::from_reader(Box::new(reader))
    }
}

fn decode_dropping_invalid(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;
    while !rest.is_empty() {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                break;
            }
            Err(err) => {
                let (valid, after) = rest.split_at(err.valid_up_to());
                if let Ok(text) = std::str::from_utf8(valid) {
                    out.push_str(text);
                }
                let skip = err.error_len().unwrap_or(after.len());
                rest = &after[skip..];
            }
        }
    }
    out
}

impl Iterator for LenientLineReader {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buffer.clear();
        match self.reader.read_until(b'\n', &mut self.buffer) {
            Ok(0) => None,
            Ok(_) => {
                let text = decode_dropping_invalid(&self.buffer);
                // An unterminated tail that decodes to nothing is not a line.
                if !self.buffer.ends_with(b"\n") && text.is_empty() {
                    return None;
                }
                let line = text.trim_end_matches(['\n', '\r']).to_string();
                Some(Ok(line))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

/// Count the lines of a single file. `total` is the number of physical lines
/// read; every physical line lands in exactly one of the other buckets.
fn count_lines_in_file(path: &Path, syntax: CommentSyntax) -> io::Result<LineCounts> {
    let file = fs::File::open(path)?;
    let mut counts = LineCounts::default();
    let mut classifier = LineClassifier::new(syntax);
    for line_result in LenientLineReader::new(file) {
        let line = line_result?;
        counts.total += 1;
        match classifier.classify(&line) {
            LineKind::Empty => counts.empty += 1,
            LineKind::Comment => counts.comment += 1,
            LineKind::Code => counts.code += 1,
        }
    }
    Ok(counts)
}

/// Directory names that are never traversed, regardless of --exclude.
fn default_excluded_dirs() -> HashSet<String> {
    [
        ".git",
        ".svn",
        ".hg",
        "__pycache__",
        "node_modules",
        ".vscode",
        ".idea",
        "build",
        "dist",
        "target",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

fn process_file(path: &Path, result: &mut ScanResult) {
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => ext.to_lowercase(),
        None => return,
    };
    let language = match language_for_extension(&ext) {
        Some(language) => language,
        None => return,
    };
    let counts = match count_lines_in_file(path, comment_syntax_for_extension(&ext)) {
        Ok(counts) => counts,
        Err(err) => {
            eprintln!("Warning: cannot read file {}: {}", path.display(), err);
            return;
        }
    };
    let entry = result.totals.entry(language).or_default();
    entry.files += 1;
    entry.counts.add(&counts);
    result.files.push(FileRecord {
        path: path.to_path_buf(),
        language,
        counts,
    });
}

fn scan_directory_impl(
    dir: &Path,
    excluded: &HashSet<String>,
    include_hidden: bool,
    result: &mut ScanResult,
) -> io::Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            eprintln!("Warning: cannot read directory {}: {}", dir.display(), err);
            return Ok(());
        }
    };

    for entry_result in entries {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                eprintln!("Warning: cannot read entry in {}: {}", dir.display(), err);
                continue;
            }
        };
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let entry_path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(err) => {
                eprintln!("Warning: cannot stat {}: {}", entry_path.display(), err);
                continue;
            }
        };

        if file_type.is_dir() {
            if excluded.contains(name.as_ref()) {
                continue;
            }
            if !include_hidden && is_hidden_name(&name) {
                continue;
            }
            scan_directory_impl(&entry_path, excluded, include_hidden, result)?;
        } else if entry_path.is_file() {
            // is_file() follows symlinks; directory symlinks fall through
            // both branches and are never traversed.
            if !include_hidden && is_hidden_name(&name) {
                continue;
            }
            process_file(&entry_path, result);
        }
    }

    Ok(())
}

/// Walk `root` and every non-excluded subdirectory, scanning recognized
/// files. The root itself is never subject to the exclusion or hidden-name
/// filters.
fn scan_directory(
    root: &Path,
    excluded: &HashSet<String>,
    include_hidden: bool,
) -> io::Result<ScanResult> {
    let mut result = ScanResult::default();
    scan_directory_impl(root, excluded, include_hidden, &mut result)?;
    Ok(result)
}

fn format_path_display(path: &Path, current_dir: &Path) -> String {
    match path.strip_prefix(current_dir) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.to_string_lossy().into_owned(),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

fn format_counts_row(
    label: &str,
    files: u64,
    counts: &LineCounts,
) -> String {
    format!(
        "{:<lang$} {:<files$} {:<count$} {:<count$} {:<comment$} {:<count$}",
        label,
        files,
        counts.total,
        counts.empty,
        counts.comment,
        counts.code,
        lang = LANG_WIDTH,
        files = FILES_WIDTH,
        count = COUNT_WIDTH,
        comment = COMMENT_WIDTH,
    )
}

fn build_summary_report(result: &ScanResult, show_files: bool, current_dir: &Path) -> String {
    let mut output = String::new();

    if result.totals.is_empty() {
        let _ = writeln!(output, "No source files found.");
        return output;
    }

    let _ = writeln!(output, "\n{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(output, "{}", "Line count summary".bold());
    let _ = writeln!(output, "{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{:<lang$} {:<files$} {:<count$} {:<count$} {:<comment$} {:<count$}",
        "Language",
        "Files",
        "Total",
        "Blank",
        "Comment",
        "Code",
        lang = LANG_WIDTH,
        files = FILES_WIDTH,
        count = COUNT_WIDTH,
        comment = COMMENT_WIDTH,
    );
    let _ = writeln!(output, "{}", "-".repeat(RULE_WIDTH));

    // Code-descending; name breaks ties so repeated runs print identically.
    let mut rows: Vec<_> = result.totals.iter().collect();
    rows.sort_by(|(a_name, a), (b_name, b)| {
        b.counts
            .code
            .cmp(&a.counts.code)
            .then_with(|| a_name.cmp(b_name))
    });

    let mut grand = LanguageTotals::default();
    for (language, totals) in &rows {
        let _ = writeln!(
            output,
            "{}",
            format_counts_row(language, totals.files, &totals.counts)
        );
        grand.files += totals.files;
        grand.counts.add(&totals.counts);
    }

    let _ = writeln!(output, "{}", "-".repeat(RULE_WIDTH));
    let _ = writeln!(
        output,
        "{}",
        format_counts_row("Total", grand.files, &grand.counts)
    );

    if show_files && !result.files.is_empty() {
        let _ = writeln!(output, "\n{}", "=".repeat(RULE_WIDTH));
        let _ = writeln!(output, "{}", "Per-file details".bold());
        let _ = writeln!(output, "{}", "=".repeat(RULE_WIDTH));

        let mut records: Vec<_> = result.files.iter().collect();
        records.sort_by(|a, b| b.counts.code.cmp(&a.counts.code));

        for record in records {
            let _ = writeln!(
                output,
                "\nFile: {}",
                format_path_display(&record.path, current_dir)
            );
            let _ = writeln!(output, "Language: {}", record.language);
            let _ = writeln!(
                output,
                "Total: {}, Blank: {}, Comment: {}, Code: {}",
                record.counts.total, record.counts.empty, record.counts.comment, record.counts.code
            );
        }
    }

    output
}

fn main() -> io::Result<()> {
    run_with_args(env::args_os())
}

fn run_with_args<I, T>(args: I) -> io::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = Args::parse_from(args);
    run_cli(&args)
}

fn run_cli(args: &Args) -> io::Result<()> {
    println!(
        "{} {}",
        env!("CARGO_PKG_NAME").bright_cyan().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_yellow()
    );

    let path = Path::new(&args.directory);
    if !path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Directory does not exist: {}", path.display()),
        ));
    }

    let mut excluded = default_excluded_dirs();
    excluded.extend(args.exclude.iter().cloned());

    let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    println!("Scanning directory: {}", absolute.display());
    let mut excluded_names: Vec<_> = excluded.iter().map(String::as_str).collect();
    excluded_names.sort_unstable();
    println!("Excluded directories: {}", excluded_names.join(", "));

    let current_dir = env::current_dir()?;
    let result = scan_directory(path, &excluded, args.all)?;
    let report = build_summary_report(&result, args.files, &current_dir);
    print!("{}", report);

    Ok(())
}
