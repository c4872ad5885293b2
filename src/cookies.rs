use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};

pub const COOKIE_DIR: &str = "cookies";
pub const JSON_INPUT_DIR: &str = "json_input";
pub const DOWNLOAD_DIR: &str = "DownloadData";

/// One cookie as exported by browser extensions (JSON array of these)
#[derive(Debug, Deserialize)]
struct BrowserCookie {
    #[serde(default)]
    domain: String,
    #[serde(default, rename = "hostOnly")]
    host_only: bool,
    #[serde(default = "default_cookie_path")]
    path: String,
    #[serde(default)]
    secure: bool,
    #[serde(default)]
    expiry: Option<f64>,
    #[serde(default, rename = "expirationDate")]
    expiration_date: Option<f64>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

impl BrowserCookie {
    fn expiry_seconds(&self) -> i64 {
        self.expiry.or(self.expiration_date).unwrap_or(0.0) as i64
    }

    fn netscape_line(&self) -> String {
        let flag = if self.host_only { "FALSE" } else { "TRUE" };
        let secure = if self.secure { "TRUE" } else { "FALSE" };
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.domain,
            flag,
            self.path,
            secure,
            self.expiry_seconds(),
            self.name,
            self.value
        )
    }
}

/// Result of converting one JSON file
#[derive(Debug)]
pub struct Conversion {
    pub source: PathBuf,
    pub result: Result<PathBuf>,
}

/// Create the working directories the tool expects next to it
pub fn ensure_dirs() -> std::io::Result<()> {
    for dir in [COOKIE_DIR, JSON_INPUT_DIR, DOWNLOAD_DIR] {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Convert every `*.json` in `json_dir` to a Netscape cookie file in
/// `cookie_dir`, deleting the JSON on success. Per-file failures are
/// reported, not fatal to the batch.
pub fn convert_dir(json_dir: &Path, cookie_dir: &Path) -> std::io::Result<Vec<Conversion>> {
    let mut sources: Vec<PathBuf> = fs::read_dir(json_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().is_some_and(|ext| ext == "json")
        })
        .collect();
    sources.sort();

    fs::create_dir_all(cookie_dir)?;
    Ok(sources
        .into_iter()
        .map(|source| {
            let result = convert_file(&source, cookie_dir);
            Conversion { source, result }
        })
        .collect())
}

/// Convert one browser-exported JSON cookie file to Netscape format
pub fn convert_file(json_path: &Path, cookie_dir: &Path) -> Result<PathBuf> {
    let stem = json_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cookies".to_string());

    let data = fs::read_to_string(json_path)?;
    let cookies: Vec<BrowserCookie> =
        serde_json::from_str(&data).map_err(|source| Error::CookieParse {
            path: json_path.to_path_buf(),
            source,
        })?;

    let txt_path = cookie_dir.join(format!("{stem}.txt"));
    let mut out = fs::File::create(&txt_path)?;
    writeln!(out, "# Netscape HTTP Cookie File")?;
    writeln!(out, "# Converted by gdl-tui")?;
    writeln!(out)?;
    for cookie in &cookies {
        writeln!(out, "{}", cookie.netscape_line())?;
    }

    fs::remove_file(json_path)?;
    info!(source = %json_path.display(), output = %txt_path.display(), "converted cookie file");
    Ok(txt_path)
}

/// Sorted `*.txt` file names available for the cookie picker
pub fn list_cookie_files(cookie_dir: &Path) -> std::io::Result<Vec<String>> {
    if !cookie_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<String> = fs::read_dir(cookie_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().is_some_and(|ext| ext == "txt")
        })
        .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    files.sort();
    Ok(files)
}
