use std::fmt;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: &'static str,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check prerequisites for the `go` toolchain.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_go_prereqs() -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    if !command_exists("go") {
        missing.push(MissingPrereq {
            name: "go",
            purpose: "building the toolchain, init, and listing package dependencies",
            install_hint: "https://go.dev/dl | apt install golang | dnf install golang | pacman -S go",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nramfs requires these tools to build an initramfs.");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prereq_display() {
        let m = MissingPrereq {
            name: "go",
            purpose: "building binaries",
            install_hint: "apt install golang",
        };
        let s = format!("{m}");
        assert!(s.contains("go"));
        assert!(s.contains("building binaries"));
        assert!(s.contains("apt install golang"));
    }

    #[test]
    fn format_missing_produces_readable_output() {
        let items = vec![MissingPrereq {
            name: "go",
            purpose: "builds",
            install_hint: "apt install golang",
        }];
        let output = format_missing(&items);
        assert!(output.contains("missing prerequisites:"));
        assert!(output.contains("go"));
        assert!(output.contains("initramfs"));
    }
}
