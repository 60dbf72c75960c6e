//! Fake search tools for process tests.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// A shell script standing in for `solana-keygen`.
///
/// `--version` always succeeds. Every other invocation appends its argv to a
/// runs file and then executes `grind_body`.
pub(crate) struct FakeKeygen {
    dir: TempDir,
    pub path: PathBuf,
    runs_file: PathBuf,
}

impl FakeKeygen {
    pub fn new(grind_body: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("solana-keygen");
        let runs_file = dir.path().join("runs.log");

        let script = format!(
            "#!/bin/sh\n\
             if [ \"$1\" = \"--version\" ]; then echo 'solana-keygen 1.18.0 (fake)'; exit 0; fi\n\
             echo \"$@\" >> '{}'\n\
             {}\n",
            runs_file.display(),
            grind_body
        );
        write_executable(&path, &script);

        Self {
            dir,
            path,
            runs_file,
        }
    }

    /// Prints the success marker and exits
    pub fn succeeding() -> Self {
        Self::new("echo 'Searched 100 keypairs in 0s. 0 matches found.'\necho 'Wrote keypair to ABfake.json'")
    }

    /// Runs until signalled
    pub fn long_running() -> Self {
        Self::new("exec sleep 30")
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Argv of every grind invocation so far
    pub fn runs(&self) -> Vec<String> {
        std::fs::read_to_string(&self.runs_file)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Wait until at least `n` grind invocations have been recorded
    pub async fn wait_for_runs(&self, n: usize) -> Vec<String> {
        for _ in 0..250 {
            let runs = self.runs();
            if runs.len() >= n {
                return runs;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("expected {} runs, saw {:?}", n, self.runs());
    }
}

/// Write a script and wait until the kernel lets us execute it.
///
/// Another test thread forking while the file is open for writing makes exec
/// fail with ETXTBSY for a moment.
pub(crate) fn write_executable(path: &Path, content: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, content).expect("write script");
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    for _ in 0..50 {
        match std::process::Command::new(path).arg("--version").output() {
            Err(e) if e.raw_os_error() == Some(libc::ETXTBSY) => {
                std::thread::sleep(Duration::from_millis(20))
            }
            _ => return,
        }
    }
}
