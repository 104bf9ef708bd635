//! Invocation construction.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::HarnessConfig;

/// Environment entry pointing the authoring tool at the user-scripts root.
///
/// Set on the child process only; the harness process environment is
/// never modified.
pub const USER_SCRIPTS_ENV: &str = "BLENDER_USER_SCRIPTS";

/// Flags disabling UI and audio and loading the addon from a clean state.
const BATCH_FLAGS: &[&str] = &["-b", "--factory-startup"];
const NO_AUDIO_FLAG: &str = "-noaudio";

/// What the automation script is asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationMode {
    /// Open `scene` and export it
    Export {
        /// Authored source scene
        scene: Option<PathBuf>,
    },
    /// Import `artifact` and export it again
    Reimport {
        /// Artifact produced by an earlier export
        artifact: PathBuf,
    },
}

/// A fully specified authoring tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable path or command name
    pub tool: PathBuf,
    /// Export or reimport
    pub mode: InvocationMode,
    /// Directory the automation script writes artifacts to
    pub output_dir: PathBuf,
    /// Automation script run by the tool
    pub script: String,
    /// Opaque arguments appended verbatim
    pub extra_args: Vec<String>,
    /// User-scripts root the addon is loaded from
    pub user_scripts_dir: PathBuf,
    /// Addon module enabled at startup
    pub addon_module: String,
}

impl Invocation {
    /// Argument vector, excluding the executable itself.
    ///
    /// Everything after `--` is read by the automation script; the output
    /// directory travels through this channel rather than the environment.
    pub fn argv(&self) -> Vec<OsString> {
        let mut argv: Vec<OsString> = BATCH_FLAGS.iter().map(OsString::from).collect();
        argv.push("--addons".into());
        argv.push(self.addon_module.clone().into());
        argv.push(NO_AUDIO_FLAG.into());

        if let InvocationMode::Export { scene: Some(scene) } = &self.mode {
            argv.push(scene.clone().into_os_string());
        }

        argv.push("--python".into());
        argv.push(self.script.clone().into());
        argv.push("--".into());

        if let InvocationMode::Reimport { artifact } = &self.mode {
            argv.push(artifact.clone().into_os_string());
        }
        argv.push(self.output_dir.clone().into_os_string());
        argv.extend(self.extra_args.iter().map(OsString::from));
        argv
    }

    /// Environment entries set on the child process.
    pub fn env(&self) -> Vec<(OsString, OsString)> {
        vec![(
            USER_SCRIPTS_ENV.into(),
            self.user_scripts_dir.clone().into_os_string(),
        )]
    }

    /// Shell-like rendering for logs.
    pub fn command_line(&self) -> String {
        let mut line = self.tool.display().to_string();
        for arg in self.argv() {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Builds invocations from the harness configuration.
#[derive(Debug, Clone)]
pub struct InvocationBuilder {
    user_scripts_dir: PathBuf,
    addon_module: String,
    export_script: String,
    roundtrip_script: String,
}

impl InvocationBuilder {
    /// Builder with script names and user-scripts root taken from `config`.
    ///
    /// A relative user-scripts root is made absolute against the current
    /// directory so the child sees the same location whatever its own cwd.
    pub fn from_config(config: &HarnessConfig) -> Self {
        let user_scripts_dir = if config.user_scripts_dir.is_absolute() {
            config.user_scripts_dir.clone()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&config.user_scripts_dir))
                .unwrap_or_else(|_| config.user_scripts_dir.clone())
        };
        Self {
            user_scripts_dir,
            addon_module: config.addon_module.clone(),
            export_script: config.export_script.clone(),
            roundtrip_script: config.roundtrip_script.clone(),
        }
    }

    /// Override the user-scripts root.
    pub fn with_user_scripts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_scripts_dir = dir.into();
        self
    }

    /// Export `scene` (or the tool's startup scene when `None`) into `output_dir`.
    pub fn export(
        &self,
        tool: &Path,
        scene: Option<&Path>,
        output_dir: &Path,
        extra_args: &[String],
    ) -> Invocation {
        self.build(
            tool,
            InvocationMode::Export {
                scene: scene.map(Path::to_path_buf),
            },
            output_dir,
            &self.export_script,
            extra_args,
        )
    }

    /// Import `artifact` and export it again into `output_dir`.
    pub fn reimport(
        &self,
        tool: &Path,
        artifact: &Path,
        output_dir: &Path,
        extra_args: &[String],
    ) -> Invocation {
        self.build(
            tool,
            InvocationMode::Reimport {
                artifact: artifact.to_path_buf(),
            },
            output_dir,
            &self.roundtrip_script,
            extra_args,
        )
    }

    /// Invocation running an arbitrary automation script.
    pub fn build(
        &self,
        tool: &Path,
        mode: InvocationMode,
        output_dir: &Path,
        script: &str,
        extra_args: &[String],
    ) -> Invocation {
        Invocation {
            tool: tool.to_path_buf(),
            mode,
            output_dir: output_dir.to_path_buf(),
            script: script.to_string(),
            extra_args: extra_args.to_vec(),
            user_scripts_dir: self.user_scripts_dir.clone(),
            addon_module: self.addon_module.clone(),
        }
    }
}
