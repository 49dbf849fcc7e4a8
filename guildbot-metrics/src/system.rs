use serde::{Deserialize, Serialize};
use sysinfo::{ProcessesToUpdate, System};
use tracing::debug;

/// Memory held by the current process, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub resident_bytes: u64,
    pub virtual_bytes: u64,
}

/// Samples this process's memory use. Keeps one `System` around so repeated samples
/// only refresh the current process.
#[derive(Debug)]
pub(crate) struct ProcessSampler {
    system: System,
}

impl ProcessSampler {
    pub(crate) fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// Zeroed when the platform does not expose process information.
    pub(crate) fn sample(&mut self) -> MemorySnapshot {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => pid,
            Err(reason) => {
                debug!(reason, "Process memory unavailable");
                return MemorySnapshot::default();
            }
        };

        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        self.system
            .process(pid)
            .map(|process| MemorySnapshot {
                resident_bytes: process.memory(),
                virtual_bytes: process.virtual_memory(),
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_reports_resident_memory() {
        let mut sampler = ProcessSampler::new();
        let snapshot = sampler.sample();

        if cfg!(target_os = "linux") {
            assert!(snapshot.resident_bytes > 0);
        }
    }
}
