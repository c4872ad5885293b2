use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// Severity tag for a classified output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
    Dim,
}

/// Counter changes produced by a single line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatDelta {
    pub downloaded: u64,
    pub failed: u64,
    pub retried: u64,
}

/// One line of gallery-dl output, classified
#[derive(Debug, Clone)]
pub struct ClassifiedEvent {
    /// The line exactly as read from the process
    pub raw_line: String,
    /// The line as it should be shown in the log view
    pub rendered_line: String,
    pub severity: Severity,
    /// Human-readable record for the Failed Items view
    pub failure_record: Option<String>,
    pub delta: StatDelta,
    /// In-flight output file detected on this line
    pub observed_path: Option<PathBuf>,
    /// Transfer-rate token, e.g. "2.4 MB/s"
    pub speed: Option<String>,
}

// gallery-dl output patterns. Compiled once; classification runs per line.
static HTTP_ERR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([45]\d{2})\b").unwrap());
static RETRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Retrying\s+(\d+)/(\d+)").unwrap());
static SKIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bskipping\b|\bskipped\b").unwrap());
static PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"#\s*\d+\s+([^\s'"<>{}|\\^~\[\]`]+)"#).unwrap());
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s'"<>{}|\\^~\[\]`]+"#).unwrap());
static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#\s*\d+").unwrap());
static SPEED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*\s*\w+/s)").unwrap());
static ERROR_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\[error\]").unwrap());
static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'([^']*)'").unwrap());

/// Classify one output line.
///
/// Pure: the only state carried between calls is `last_url`, the most
/// recently seen URL, which the caller threads through. Returns the event
/// and the updated last-URL.
///
/// Rules are checked in fixed priority order, first match wins:
/// retry, skip, generic error, warning marker, numbered marker, separator,
/// default. Path capture is a side channel: it sets `observed_path` and the
/// cascade continues, so a numbered line carrying a path still counts as a
/// download.
pub fn classify(line: &str, last_url: Option<&str>) -> (ClassifiedEvent, Option<String>) {
    let line = line.trim_end();
    let url_in_line = URL_RE.find(line).map(|m| m.as_str().to_string());
    let new_last_url = url_in_line
        .clone()
        .or_else(|| last_url.map(str::to_string));
    let http_code = HTTP_ERR_RE
        .captures(line)
        .map(|c| c[1].to_string());
    let speed = SPEED_RE.captures(line).map(|c| c[1].to_string());
    let observed_path = capture_path(line);

    let event = if let Some(caps) = RETRY_RE.captures(line) {
        let code_str = http_code
            .as_deref()
            .map(|c| format!(" (HTTP {c})"))
            .unwrap_or_default();
        ClassifiedEvent {
            raw_line: line.to_string(),
            rendered_line: format!("🔄 Retry {}/{}{}: {}", &caps[1], &caps[2], code_str, line),
            severity: Severity::Warning,
            failure_record: None,
            delta: StatDelta {
                retried: 1,
                ..StatDelta::default()
            },
            observed_path,
            speed,
        }
    } else if SKIP_RE.is_match(line) && line.contains('[') {
        let code_str = http_code
            .as_deref()
            .map(|c| format!(" HTTP {c}"))
            .unwrap_or_default();
        let rendered = format!("⏭ Skip{code_str}: {line}");
        let cur_url = url_in_line.as_deref().or(last_url);
        let record = match cur_url {
            Some(url) => format!("{rendered} | URL: {url}"),
            None => rendered.clone(),
        };
        ClassifiedEvent {
            raw_line: line.to_string(),
            rendered_line: rendered,
            severity: Severity::Error,
            failure_record: Some(record),
            delta: StatDelta {
                failed: 1,
                ..StatDelta::default()
            },
            observed_path,
            speed,
        }
    } else if is_error_line(line, http_code.as_deref()) {
        let (rendered, record) =
            describe_failure(line, http_code.as_deref(), url_in_line.as_deref().or(last_url));
        ClassifiedEvent {
            raw_line: line.to_string(),
            rendered_line: rendered,
            severity: Severity::Error,
            failure_record: Some(record),
            delta: StatDelta {
                failed: 1,
                ..StatDelta::default()
            },
            observed_path,
            speed,
        }
    } else {
        let severity = if line.to_lowercase().contains("[warning]") {
            Severity::Warning
        } else if NUMBERED_RE.is_match(line) {
            Severity::Success
        } else if line.starts_with('─') || line.starts_with('-') {
            Severity::Dim
        } else {
            Severity::Info
        };
        let delta = if severity == Severity::Success {
            StatDelta {
                downloaded: 1,
                ..StatDelta::default()
            }
        } else {
            StatDelta::default()
        };
        ClassifiedEvent {
            raw_line: line.to_string(),
            rendered_line: line.to_string(),
            severity,
            failure_record: None,
            delta,
            observed_path,
            speed,
        }
    };

    (event, new_last_url)
}

/// Error marker, error keywords, or an embedded HTTP 4xx/5xx code
fn is_error_line(line: &str, http_code: Option<&str>) -> bool {
    let low = line.to_lowercase();
    ERROR_MARKER_RE.is_match(line)
        || low.contains("failed")
        || low.contains("exception")
        || http_code.is_some()
}

/// Build the rendered line and failure record for a generic error line.
///
/// The description is taken from the first single-quoted substring, else the
/// text after the `[error]` marker, else the whole line. An HTTP code not
/// already embedded is appended in brackets. The record is the description
/// alone when the known URL already occurs inside it, `desc | URL: <url>`
/// otherwise, and the URL alone when the description is empty.
fn describe_failure(line: &str, http_code: Option<&str>, url: Option<&str>) -> (String, String) {
    let code_str = http_code
        .map(|c| format!(" [HTTP {c}]"))
        .unwrap_or_default();

    let mut desc = if let Some(caps) = QUOTED_RE.captures(line) {
        caps[1].to_string()
    } else if let Some(m) = ERROR_MARKER_RE.find(line) {
        line[m.end()..].trim().to_string()
    } else {
        line.to_string()
    };
    if let Some(code) = http_code
        && !desc.contains(code)
    {
        desc.push_str(&code_str);
    }

    let record = match url {
        Some(url) if desc.is_empty() => url.to_string(),
        Some(url) if desc.contains(url) => desc.clone(),
        Some(url) => format!("{desc} | URL: {url}"),
        None => desc.clone(),
    };

    let rendered = match http_code {
        Some(code) if !line.contains(code) => format!("{line}  [HTTP {code}]"),
        _ => line.to_string(),
    };

    (rendered, record)
}

/// Numbered marker followed by a path-like token whose basename looks like a
/// file (contains a dot)
fn capture_path(line: &str) -> Option<PathBuf> {
    let caps = PATH_RE.captures(line)?;
    let token = &caps[1];
    let looks_like_file = Path::new(token)
        .file_name()
        .is_some_and(|name| name.to_string_lossy().contains('.'));
    looks_like_file.then(|| PathBuf::from(token))
}
