use std::path::Path;

/// Retry count handed to gallery-dl
pub const DEFAULT_RETRIES: u32 = 10;

/// A ready-to-spawn command line plus environment overrides.
///
/// Immutable once constructed; the supervisor owns it for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadCommand {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

impl DownloadCommand {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            envs: Vec::new(),
        }
    }

    /// Build the gallery-dl invocation for one URL.
    ///
    /// gallery-dl is a Python tool; the env overrides keep its output
    /// unbuffered and UTF-8.
    pub fn gallery_dl(
        url: &str,
        cookie_file: Option<&Path>,
        retries: u32,
        config_path: &Path,
    ) -> Self {
        let mut args = Vec::new();
        if let Some(cookie) = cookie_file {
            args.push("--cookies".to_string());
            args.push(cookie.display().to_string());
        }
        args.push("--config".to_string());
        args.push(config_path.display().to_string());
        args.push("--retries".to_string());
        args.push(retries.to_string());
        args.push(url.to_string());

        Self {
            program: "gallery-dl".to_string(),
            args,
            envs: vec![
                ("PYTHONIOENCODING".to_string(), "utf-8".to_string()),
                ("PYTHONUTF8".to_string(), "1".to_string()),
                ("PYTHONUNBUFFERED".to_string(), "1".to_string()),
            ],
        }
    }

    /// The command as a single line for the log header
    pub fn display_line(&self) -> String {
        let mut out = self.program.clone();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn command_gallery_dl_without_cookies() {
        let cmd = DownloadCommand::gallery_dl(
            "https://example.com/gallery",
            None,
            DEFAULT_RETRIES,
            Path::new("gallery-dl.conf"),
        );

        assert_eq!(cmd.program, "gallery-dl");
        assert_eq!(
            cmd.args,
            vec![
                "--config",
                "gallery-dl.conf",
                "--retries",
                "10",
                "https://example.com/gallery",
            ]
        );
    }

    #[test]
    fn command_gallery_dl_prepends_cookie_args() {
        let cookie = PathBuf::from("cookies/site.txt");
        let cmd = DownloadCommand::gallery_dl(
            "https://example.com/gallery",
            Some(&cookie),
            5,
            Path::new("gallery-dl.conf"),
        );

        assert_eq!(cmd.args[0], "--cookies");
        assert_eq!(cmd.args[1], "cookies/site.txt");
        assert!(cmd.args.contains(&"5".to_string()));
    }

    #[test]
    fn command_sets_python_env_overrides() {
        let cmd = DownloadCommand::gallery_dl(
            "https://example.com",
            None,
            DEFAULT_RETRIES,
            Path::new("gallery-dl.conf"),
        );

        assert!(cmd
            .envs
            .iter()
            .any(|(k, v)| k == "PYTHONUNBUFFERED" && v == "1"));
    }

    #[test]
    fn command_display_line_joins_program_and_args() {
        let cmd = DownloadCommand::new("sh", ["-c", "echo hi"]);
        assert_eq!(cmd.display_line(), "sh -c echo hi");
    }
}
