use serde::Serialize;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppPresence {
    pub process_name: String,
    pub pids: Vec<u32>,
}

impl AppPresence {
    pub fn is_running(&self) -> bool {
        !self.pids.is_empty()
    }
}

/// Looks for the monitored application among running processes. A stalled
/// pipeline with no process behind it needs no further diagnosis.
pub struct AppPresenceProbe {
    system: System,
    process_name: String,
    own_pid: u32,
}

impl AppPresenceProbe {
    pub fn new(process_name: impl Into<String>) -> Self {
        Self {
            system: System::new(),
            process_name: process_name.into(),
            own_pid: std::process::id(),
        }
    }

    pub fn scan(&mut self) -> AppPresence {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            ProcessRefreshKind::new().with_exe(sysinfo::UpdateKind::OnlyIfNotSet),
        );

        let mut pids: Vec<u32> = self
            .system
            .processes()
            .iter()
            .filter(|(pid, _)| pid.as_u32() != self.own_pid)
            .filter(|(_, process)| {
                let exe = process.exe().map(|path| path.to_string_lossy().into_owned());
                matches_process(
                    &self.process_name,
                    &process.name().to_string_lossy(),
                    exe.as_deref(),
                )
            })
            .map(|(pid, _)| pid.as_u32())
            .collect();
        pids.sort_unstable();

        log_debug!(
            "{} process scan: {} match(es) among {} processes",
            self.process_name,
            pids.len(),
            self.system.processes().len()
        );

        AppPresence {
            process_name: self.process_name.clone(),
            pids,
        }
    }
}

/// Name match is case-insensitive and ignores punctuation, so development
/// builds named `eco-paste` match `EcoPaste`. The executable path also matches
/// when one of its components (such as the `.app` bundle) carries the name.
fn matches_process(wanted: &str, name: &str, exe: Option<&str>) -> bool {
    let wanted = normalise(wanted);
    if wanted.is_empty() {
        return false;
    }
    if normalise(name) == wanted {
        return true;
    }
    exe.map(|exe| {
        exe.split('/')
            .map(|part| part.strip_suffix(".app").unwrap_or(part))
            .any(|part| normalise(part) == wanted)
    })
    .unwrap_or(false)
}

fn normalise(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_release_and_dev_names() {
        assert!(matches_process("EcoPaste", "EcoPaste", None));
        assert!(matches_process("EcoPaste", "eco-paste", None));
        assert!(matches_process("EcoPaste", "ecopaste", None));
        assert!(!matches_process("EcoPaste", "EcoPasteHelper", None));
        assert!(!matches_process("", "anything", None));
    }

    #[test]
    fn matches_bundle_path() {
        let exe = "/Applications/EcoPaste.app/Contents/MacOS/launcher";
        assert!(matches_process("EcoPaste", "launcher", Some(exe)));
        assert!(!matches_process("Maccy", "launcher", Some(exe)));
    }

    #[test]
    fn own_process_is_never_reported() {
        let mut probe = AppPresenceProbe::new("pastewatch-definitely-not-running");
        let presence = probe.scan();
        assert!(!presence.is_running());
        assert_eq!(presence.process_name, "pastewatch-definitely-not-running");
    }
}
