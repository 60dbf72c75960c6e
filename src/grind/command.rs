//! Keygen Command
//!
//! Argument encoding and preflight checks for the external search tool.

use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{GrindError, GrindResult};
use crate::pattern::PatternSpec;

/// Build `grind` arguments for a validated spec.
///
/// One keypair is requested per constraint (`:1`). A both-sides spec with an
/// empty side falls back to the single constraint that remains.
pub fn grind_args(spec: &PatternSpec) -> Vec<String> {
    let mut args = vec!["grind".to_string()];

    if !spec.case_sensitive() {
        args.push("--ignore-case".to_string());
    }

    match (spec.prefix(), spec.suffix()) {
        (prefix, "") => {
            args.push("--starts-with".to_string());
            args.push(format!("{}:1", prefix));
        }
        ("", suffix) => {
            args.push("--ends-with".to_string());
            args.push(format!("{}:1", suffix));
        }
        (prefix, suffix) => {
            args.push("--starts-and-ends-with".to_string());
            args.push(format!("{}:{}:1", prefix, suffix));
        }
    }

    args
}

/// Resolve the tool and make sure it actually runs.
///
/// Returns the resolved executable path.
pub async fn preflight(tool: &Path, timeout: Duration) -> GrindResult<PathBuf> {
    let resolved = which::which(tool).map_err(|e| {
        GrindError::Configuration(format!("{} not found or not executable: {}", tool.display(), e))
    })?;

    let child = Command::new(&resolved)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            GrindError::Configuration(format!("failed to run {}: {}", resolved.display(), e))
        })?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| {
            GrindError::Configuration(format!(
                "{} --version did not finish within {:?}",
                resolved.display(),
                timeout
            ))
        })?
        .map_err(|e| GrindError::Configuration(format!("{} --version failed: {}", resolved.display(), e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!("{} --version exited with {}: {}", resolved.display(), output.status, stderr);
        return Err(GrindError::Configuration(format!(
            "{} --version exited with {}",
            resolved.display(),
            output.status
        )));
    }

    debug!(
        "Search tool ok: {} ({})",
        resolved.display(),
        String::from_utf8_lossy(&output.stdout).trim()
    );
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{validate, MatchMode};

    #[test]
    fn test_starts_with_args() {
        let spec = validate("AB", MatchMode::StartsWith, None, true).unwrap();
        assert_eq!(grind_args(&spec), vec!["grind", "--starts-with", "AB:1"]);
    }

    #[test]
    fn test_ends_with_ignore_case_args() {
        let spec = validate("xyz", MatchMode::EndsWith, None, false).unwrap();
        assert_eq!(
            grind_args(&spec),
            vec!["grind", "--ignore-case", "--ends-with", "xyz:1"]
        );
    }

    #[test]
    fn test_both_sides_args() {
        let spec = validate("AB,yz", MatchMode::StartsAndEndsWith, None, true).unwrap();
        assert_eq!(
            grind_args(&spec),
            vec!["grind", "--starts-and-ends-with", "AB:yz:1"]
        );

        let spec = validate(",yz", MatchMode::StartsAndEndsWith, None, true).unwrap();
        assert_eq!(grind_args(&spec), vec!["grind", "--ends-with", "yz:1"]);
    }

    #[tokio::test]
    async fn test_preflight_missing_tool() {
        let err = preflight(Path::new("/definitely/not/here/solana-keygen"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_preflight_checks_version() {
        use crate::grind::testing::write_executable;

        let dir = tempfile::tempdir().unwrap();

        let good = dir.path().join("good-keygen");
        write_executable(&good, "#!/bin/sh\necho 'solana-keygen 1.18.0'\n");
        assert_eq!(preflight(&good, Duration::from_secs(5)).await.unwrap(), good);

        let broken = dir.path().join("broken-keygen");
        write_executable(&broken, "#!/bin/sh\necho boom >&2\nexit 3\n");
        assert!(preflight(&broken, Duration::from_secs(5))
            .await
            .unwrap_err()
            .is_configuration());

        let not_exec = dir.path().join("plain-file");
        std::fs::write(&not_exec, "not a program").unwrap();
        assert!(preflight(&not_exec, Duration::from_secs(5))
            .await
            .unwrap_err()
            .is_configuration());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_preflight_times_out() {
        use crate::grind::testing::write_executable;

        let dir = tempfile::tempdir().unwrap();
        let slow = dir.path().join("slow-keygen");
        let flag = dir.path().join("hang");
        write_executable(
            &slow,
            &format!("#!/bin/sh\nif [ -f '{}' ]; then exec sleep 30; fi\necho ok\n", flag.display()),
        );
        std::fs::write(&flag, "").unwrap();

        let started = std::time::Instant::now();
        let err = preflight(&slow, Duration::from_millis(300)).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
