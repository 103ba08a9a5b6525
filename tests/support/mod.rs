// ABOUTME: Test support utilities.
// ABOUTME: Tracing setup and a MemoryFs laid out like the agent container.

use std::io;
use std::sync::{Arc, Once};

use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

use crio_hook_installer::fs::MemoryFs;
use crio_hook_installer::hooks::{DEFAULT_SOURCE_DECL, DEFAULT_SOURCE_SCRIPT};

#[allow(dead_code)]
pub const MAIN_CONFIG: &str = "/host/etc/crio/crio.conf";
#[allow(dead_code)]
pub const DROP_IN_DIR: &str = "/host/etc/crio/crio.conf.d";

#[allow(dead_code)]
pub const HOOK_SCRIPT: &str = "#!/bin/bash
set -e
# Prestart hook: enable swap for burstable pods.
pid=$(runc state \"$1\" | jq .pid)
runc update --memory-swap -1 \"$1\"
";

#[allow(dead_code)]
pub const HOOK_DECL: &str = r#"{
  "version": "1.0.0",
  "hook": { "path": "/opt/oci-hook-swap.sh" },
  "when": { "annotations": { "io.kubernetes.cri-o.TrustedSandbox": "true" } },
  "stages": ["prestart"]
}
"#;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("crio_hook_installer=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Agent container filesystem: hook sources present, host mount points present,
/// no CRI-O configuration yet.
#[allow(dead_code)]
pub fn agent_fs() -> MemoryFs {
    MemoryFs::new()
        .with_file(DEFAULT_SOURCE_SCRIPT, HOOK_SCRIPT)
        .with_file_mode(DEFAULT_SOURCE_DECL, HOOK_DECL, 0o644)
        .with_dir("/tmp")
        .with_dir("/host/opt")
        .with_dir("/host/run/containers/oci/hooks.d")
        .with_dir("/host/var/run/crio")
}

/// TOML setting `crio.runtime.default_runtime`.
#[allow(dead_code)]
pub fn runtime_toml(name: &str) -> String {
    format!("[crio.runtime]\ndefault_runtime = \"{name}\"\n")
}

/// Formatted log output captured while running a closure.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

#[allow(dead_code)]
impl CapturedLogs {
    /// Captured lines at `level` (e.g. "INFO") that contain `needle`.
    pub fn lines_at(&self, level: &str, needle: &str) -> Vec<String> {
        let text = String::from_utf8_lossy(&self.0.lock()).into_owned();
        text.lines()
            .filter(|line| line.split_whitespace().next() == Some(level))
            .filter(|line| line.contains(needle))
            .map(str::to_owned)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with a thread-local subscriber that records every event at DEBUG and above.
#[allow(dead_code)]
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, CapturedLogs) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs)
}
