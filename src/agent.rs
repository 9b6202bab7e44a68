//! launchd integration: run the detector as a per-user LaunchAgent.

use crate::config::Config;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// launchd label of the agent.
pub const AGENT_LABEL: &str = "com.github.idle-detector";

/// Errors raised while managing the LaunchAgent.
#[derive(Debug)]
pub enum AgentError {
    IoError(String),
    /// `launchctl` (or `id`) failed
    Launchctl(String),
    /// The detector binary could not be located
    MissingProgram(String),
    /// No plist is installed
    NotInstalled(PathBuf),
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::IoError(e) => write!(f, "IO error: {e}"),
            AgentError::Launchctl(e) => write!(f, "launchctl error: {e}"),
            AgentError::MissingProgram(e) => write!(f, "Cannot locate idle-detector binary: {e}"),
            AgentError::NotInstalled(path) => {
                write!(f, "The agent file does not exist at: {}", path.display())
            }
        }
    }
}

impl std::error::Error for AgentError {}

/// A LaunchAgent definition for the detector.
#[derive(Debug, Clone)]
pub struct LaunchAgent {
    program: PathBuf,
    plist_path: PathBuf,
    log_dir: PathBuf,
    path_env: String,
}

impl LaunchAgent {
    /// An agent that runs `program start`.
    pub fn new(program: PathBuf, config: &Config) -> Self {
        let plist_path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Library")
            .join("LaunchAgents")
            .join(format!("{AGENT_LABEL}.plist"));

        Self {
            program,
            plist_path,
            log_dir: config.log_dir(),
            path_env: std::env::var("PATH").unwrap_or_else(|_| "/usr/bin:/bin:/usr/sbin:/sbin".into()),
        }
    }

    /// An agent for the currently running binary.
    pub fn for_current_exe(config: &Config) -> Result<Self, AgentError> {
        let program =
            std::env::current_exe().map_err(|e| AgentError::MissingProgram(e.to_string()))?;
        Ok(Self::new(program, config))
    }

    pub fn with_plist_path(mut self, path: PathBuf) -> Self {
        self.plist_path = path;
        self
    }

    pub fn plist_path(&self) -> &Path {
        &self.plist_path
    }

    pub fn stdout_log(&self) -> PathBuf {
        self.log_dir.join("idle-detector.out.log")
    }

    pub fn stderr_log(&self) -> PathBuf {
        self.log_dir.join("idle-detector.err.log")
    }

    /// The plist XML launchd will load.
    pub fn render_plist(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>Label</key>
	<string>{label}</string>
	<key>ProgramArguments</key>
	<array>
		<string>{program}</string>
		<string>start</string>
	</array>
	<key>EnvironmentVariables</key>
	<dict>
		<key>PATH</key>
		<string>{path}</string>
	</dict>
	<key>RunAtLoad</key>
	<true/>
	<key>KeepAlive</key>
	<true/>
	<key>StandardOutPath</key>
	<string>{stdout}</string>
	<key>StandardErrorPath</key>
	<string>{stderr}</string>
</dict>
</plist>
"#,
            label = AGENT_LABEL,
            program = xml_escape(&self.program.display().to_string()),
            path = xml_escape(&self.path_env),
            stdout = xml_escape(&self.stdout_log().display().to_string()),
            stderr = xml_escape(&self.stderr_log().display().to_string()),
        )
    }

    /// Write the plist and make sure the log directory exists.
    pub fn write_plist(&self) -> Result<(), AgentError> {
        if let Some(parent) = self.plist_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AgentError::IoError(e.to_string()))?;
        }
        std::fs::create_dir_all(&self.log_dir).map_err(|e| AgentError::IoError(e.to_string()))?;
        std::fs::write(&self.plist_path, self.render_plist())
            .map_err(|e| AgentError::IoError(e.to_string()))
    }

    /// Whether the plist is on disk.
    pub fn is_installed(&self) -> bool {
        self.plist_path.exists()
    }

    /// Whether launchd currently has the agent loaded.
    pub fn is_loaded(&self) -> Result<bool, AgentError> {
        let listing = launchctl(&["list"])?;
        Ok(listing
            .lines()
            .any(|line| line.split('\t').any(|field| field.trim() == AGENT_LABEL)))
    }

    /// Write the plist, then bootstrap, enable and start the agent.
    pub fn install(&self) -> Result<(), AgentError> {
        if !self.program.exists() {
            return Err(AgentError::MissingProgram(self.program.display().to_string()));
        }

        self.write_plist()?;
        let domain = gui_domain()?;
        let plist = self.plist_path.display().to_string();
        let service = format!("{domain}/{AGENT_LABEL}");

        if self.is_loaded()? {
            debug!("Agent already loaded, booting it out first");
            launchctl(&["bootout", &domain, &plist])?;
        }

        launchctl(&["bootstrap", &domain, &plist])?;
        launchctl(&["enable", &service])?;
        launchctl(&["kickstart", &service])?;

        info!(plist = %plist, "LaunchAgent installed");
        Ok(())
    }

    /// Boot the agent out of launchd and delete the plist.
    pub fn uninstall(&self) -> Result<(), AgentError> {
        if !self.is_installed() {
            return Err(AgentError::NotInstalled(self.plist_path.clone()));
        }

        let plist = self.plist_path.display().to_string();
        if self.is_loaded()? {
            let domain = gui_domain()?;
            launchctl(&["bootout", &domain, &plist])?;
        }

        std::fs::remove_file(&self.plist_path).map_err(|e| AgentError::IoError(e.to_string()))?;
        info!(plist = %plist, "LaunchAgent removed");
        Ok(())
    }
}

/// `gui/<uid>` launchd domain of the current user.
fn gui_domain() -> Result<String, AgentError> {
    let output = Command::new("id")
        .arg("-u")
        .output()
        .map_err(|e| AgentError::Launchctl(format!("id -u: {e}")))?;
    let uid = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !output.status.success() || uid.is_empty() {
        return Err(AgentError::Launchctl("could not determine user id".into()));
    }
    Ok(format!("gui/{uid}"))
}

fn launchctl(args: &[&str]) -> Result<String, AgentError> {
    debug!(?args, "launchctl");
    let output = Command::new("launchctl")
        .args(args)
        .output()
        .map_err(|e| AgentError::Launchctl(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AgentError::Launchctl(format!(
            "`launchctl {}` exited with {}: {}",
            args.join(" "),
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> LaunchAgent {
        let config = Config {
            data_path: PathBuf::from("/Users/me/Library/Application Support/idle-detector"),
            ..Config::default()
        };
        LaunchAgent::new(PathBuf::from("/usr/local/bin/idle-detector"), &config)
    }

    #[test]
    fn test_plist_contents() {
        let plist = agent().render_plist();
        assert!(plist.contains("<string>com.github.idle-detector</string>"));
        assert!(plist.contains(
            "<string>/usr/local/bin/idle-detector</string>\n\t\t<string>start</string>"
        ));
        assert!(plist.contains("<key>RunAtLoad</key>\n\t<true/>"));
        assert!(plist.contains("<key>KeepAlive</key>\n\t<true/>"));
        assert!(plist.contains(
            "/Users/me/Library/Application Support/idle-detector/logs/idle-detector.err.log"
        ));
    }

    #[test]
    fn test_plist_escapes_paths() {
        let config = Config {
            data_path: PathBuf::from("/tmp/a&b"),
            ..Config::default()
        };
        let plist = LaunchAgent::new(PathBuf::from("/opt/<bin>/idle-detector"), &config).render_plist();
        assert!(plist.contains("/opt/&lt;bin&gt;/idle-detector"));
        assert!(plist.contains("/tmp/a&amp;b/logs"));
    }

    #[test]
    fn test_write_plist_and_uninstall_missing() {
        let dir = std::env::temp_dir().join(format!("idle-detector-agent-test-{}", std::process::id()));
        let path = dir.join("agent.plist");
        let agent = agent().with_plist_path(path.clone());

        assert!(!agent.is_installed());
        assert!(matches!(agent.uninstall(), Err(AgentError::NotInstalled(_))));

        // write only the plist; log dir points outside the temp tree
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(&path, agent.render_plist()).unwrap();
        assert!(agent.is_installed());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_plist_path_label() {
        let path = agent().plist_path().to_path_buf();
        assert!(path.ends_with("Library/LaunchAgents/com.github.idle-detector.plist"));
    }
}
