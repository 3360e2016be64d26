#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

/// A scratch harness checkout: a registry, a wrappers directory and a data directory.
pub struct Harness {
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        std::fs::create_dir_all(dir.path().join("wrappers")).unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.path().join("data")
    }

    pub fn config(&self) -> PathBuf {
        self.path().join("schemes.toml")
    }

    /// Marker files written by the wrappers.
    pub fn marker(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    pub fn write_registry(&self, schemes: &[&str]) {
        let content: String = schemes
            .iter()
            .map(|s| format!("[[scheme]]\nname = \"{s}\"\n\n"))
            .collect();
        std::fs::write(self.config(), content).unwrap();
    }

    /// Write a wrapper that says the receiver runs first and records each endpoint's pid and
    /// arguments before running the given shell snippet.
    pub fn write_wrapper(&self, name: &str, receiver: &str, sender: &str) -> PathBuf {
        let dir = self.path().display();
        let script = format!(
            r#"#!/bin/sh
case "$1" in
  run_first) echo receiver ;;
  receiver)
    echo "$@" > "{dir}/{name}.receiver.args"
    echo $$ > "{dir}/{name}.receiver.pid"
    {receiver}
    ;;
  sender)
    echo "$@" > "{dir}/{name}.sender.args"
    echo $$ > "{dir}/{name}.sender.pid"
    {sender}
    ;;
  *) exit 2 ;;
esac
"#
        );
        self.write_executable(&format!("wrappers/{name}"), &script)
    }

    /// A stand-in for `mm-link` that records its arguments, sets the peer address variable and
    /// runs whatever follows `--`.
    pub fn write_fake_mm_link(&self) -> PathBuf {
        let dir = self.path().display();
        let script = format!(
            r#"#!/bin/sh
echo "$@" > "{dir}/mm-link.args"
while [ "$#" -gt 0 ] && [ "$1" != "--" ]; do shift; done
shift
MAHIMAHI_BASE=100.64.0.1 exec "$@"
"#
        );
        self.write_executable("bin/mm-link", &script)
    }

    pub fn write_executable(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    pub fn read_marker(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.marker(name))
            .ok()
            .map(|s| s.trim().to_string())
    }

    pub fn pid(&self, name: &str) -> u32 {
        self.read_marker(name)
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| panic!("no pid recorded in {name}"))
    }
}

/// Zombies count as dead, they are only waiting to be reaped.
pub fn pid_alive(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(')')
            .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
            .unwrap_or(false),
        Err(_) => false,
    }
}

pub fn wait_until_dead(pid: u32) -> bool {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while pid_alive(pid) {
        if std::time::Instant::now() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    true
}
