use async_trait::async_trait;
use pandora_core::{ModelStatus, PandoraError, Result};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

/// Capability shared by every model backend: turn a prompt into raw text.
///
/// The request pipeline only ever sees this trait, so it does not know
/// whether inference runs in-process or behind an HTTP API.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Produce raw generated text for a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// One-time startup work (e.g. loading weights). Remote backends have none.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Current readiness of the backend
    fn status(&self) -> ModelStatus;

    /// Short identifier of the backend variant ("local", "gemini", "ollama")
    fn backend_name(&self) -> &str;

    /// Model identifier reported in status responses
    fn model_name(&self) -> &str;
}

/// Map a transport-level reqwest failure onto the network error kind
pub(crate) fn transport_error(
    provider: &str,
    timeout: std::time::Duration,
    err: reqwest::Error,
) -> PandoraError {
    if err.is_timeout() {
        PandoraError::Network(format!("{} request timeout after {:?}", provider, timeout))
    } else {
        PandoraError::Network(format!("{} request failed: {}", provider, err))
    }
}

/// Resident memory of this process in MiB, or 0.0 when it cannot be sampled
pub fn process_memory_mib() -> f64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0.0;
    };

    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing().with_memory(),
    );

    system
        .process(pid)
        .map(|process| process.memory() as f64 / (1024.0 * 1024.0))
        .unwrap_or(0.0)
}
