//! Robot command resolution.
//!
//! Every robot lives in its own folder under the robots root and ships its
//! own virtual environment:
//!
//! ```text
//! <root>/<robot>/main.py
//! <root>/<robot>/.venv/Scripts/python.exe   (Windows)
//! <root>/<robot>/.venv/bin/python           (elsewhere)
//! ```

use std::path::{Path, PathBuf};

use crate::error::DispatchError;

/// Folder holding the robot's isolated runtime.
pub const VENV_DIR: &str = ".venv";

/// Script started inside the robot folder.
pub const ENTRY_POINT: &str = "main.py";

#[cfg(windows)]
const INTERPRETER: [&str; 2] = ["Scripts", "python.exe"];
#[cfg(not(windows))]
const INTERPRETER: [&str; 2] = ["bin", "python"];

/// Longest robot name accepted.
const MAX_ROBOT_NAME_LEN: usize = 128;

/// Allowed robot name characters: alphanumeric, hyphen, underscore, dot.
/// The name ends up in a shell command line, so nothing else gets through.
pub fn is_safe_robot_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_ROBOT_NAME_LEN
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Robots root used when `ROBOTS_ROOT` is not configured.
pub fn default_robots_root() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\RPA")
    } else {
        PathBuf::from("/opt/rpa")
    }
}

/// Fully resolved invocation of one robot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotCommand {
    pub robot: String,
    /// `<root>/<robot>`; also the process working directory.
    pub workdir: PathBuf,
    pub interpreter: PathBuf,
    pub entry_point: PathBuf,
}

impl RobotCommand {
    pub fn resolve(root: &Path, robot: &str) -> Result<Self, DispatchError> {
        if !is_safe_robot_name(robot) {
            return Err(DispatchError::InvalidRobotName(robot.to_string()));
        }

        let workdir = root.join(robot);
        let interpreter = INTERPRETER
            .iter()
            .fold(workdir.join(VENV_DIR), |path, part| path.join(part));
        let entry_point = workdir.join(ENTRY_POINT);

        Ok(Self {
            robot: robot.to_string(),
            workdir,
            interpreter,
            entry_point,
        })
    }

    /// Command line handed to the shell, with both paths quoted.
    pub fn shell_line(&self) -> String {
        format!(
            "\"{}\" \"{}\"",
            self.interpreter.display(),
            self.entry_point.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn safe_robot_names() {
        assert!(is_safe_robot_name("Billing"));
        assert!(is_safe_robot_name("nf-e_import.v2"));
    }

    #[test]
    fn unsafe_robot_names() {
        assert!(!is_safe_robot_name(""));
        assert!(!is_safe_robot_name("."));
        assert!(!is_safe_robot_name(".."));
        assert!(!is_safe_robot_name("../etc"));
        assert!(!is_safe_robot_name("Billing & del *"));
        assert!(!is_safe_robot_name("$(evil)"));
        assert!(!is_safe_robot_name(&"a".repeat(200)));
    }

    #[test]
    fn resolve_follows_folder_convention() {
        let root = Path::new("robots");
        let cmd = RobotCommand::resolve(root, "Billing").unwrap();

        assert_eq!(cmd.workdir, root.join("Billing"));
        assert_eq!(cmd.entry_point, root.join("Billing").join("main.py"));
        assert!(cmd.interpreter.starts_with(root.join("Billing").join(".venv")));
        assert!(cmd.shell_line().contains("main.py\""));
    }

    #[test]
    fn resolve_rejects_unsafe_names() {
        assert_matches!(
            RobotCommand::resolve(Path::new("robots"), "a;b"),
            Err(DispatchError::InvalidRobotName(name)) if name == "a;b"
        );
    }
}
