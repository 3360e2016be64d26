use std::path::Path;
use std::process::Command;

use cc_tunnel_summary_model::GitSummary;

/// Summarise the git checkout at `dir`, or `None` if it isn't one or git is unavailable.
pub fn git_summary(dir: &Path) -> Option<GitSummary> {
    let commit = git(dir, &["rev-parse", "HEAD"])?;
    let status = git(dir, &["status", "--porcelain"])?;

    Some(GitSummary {
        commit: commit.trim().to_string(),
        dirty: !status.trim().is_empty(),
    })
}

fn git(dir: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .inspect_err(|e| log::debug!("Failed to run git: {e}"))
        .ok()?;
    if !output.status.success() {
        log::debug!("'git {}' failed in {}", args.join(" "), dir.display());
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_should_not_summarise_plain_directory() {
        let dir = TempDir::new().unwrap();
        assert_eq!(git_summary(dir.path()), None);
    }
}
