//! Installer orchestrator.
//!
//! Runs an `InstallationJob` through dependency checks, the package-manager
//! command and credential staging. Jobs for different servers share nothing
//! but the ledger, which is only touched between steps; two requests for the
//! same server run one after the other.
//!
//! The installed set is written through the `DefinitionStore` port so it
//! survives restarts. Staged credential values never leave memory.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use toolmux_core::{
    CredentialStore, DefinitionStore, EventEmitter, InstallFailure, InstallStatus, InstallationJob, PackageRunner,
    RuntimeEvent, RuntimeSettings, ServerDefinition, StoreError,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::registry::ServerRegistry;

/// Finished and running jobs remembered per server; older ones are dropped.
pub const JOBS_KEPT_PER_SERVER: usize = 8;

#[derive(Default)]
struct Ledger {
    jobs: HashMap<Uuid, InstallationJob>,
    /// Job ids per server, oldest first.
    history: HashMap<String, VecDeque<Uuid>>,
    staged_env: HashMap<String, HashMap<String, String>>,
    installed: HashSet<String>,
}

/// Executes installation jobs and remembers their outcome.
pub struct Installer {
    registry: Arc<ServerRegistry>,
    store: Arc<dyn DefinitionStore>,
    runner: Arc<dyn PackageRunner>,
    credentials: Arc<dyn CredentialStore>,
    emitter: Arc<dyn EventEmitter>,
    install_timeout: Duration,
    install_root: Option<PathBuf>,
    ledger: Mutex<Ledger>,
    server_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    /// Orders writes of the installed set.
    persist_lock: tokio::sync::Mutex<()>,
}

impl Installer {
    pub fn new(
        registry: Arc<ServerRegistry>,
        store: Arc<dyn DefinitionStore>,
        runner: Arc<dyn PackageRunner>,
        credentials: Arc<dyn CredentialStore>,
        emitter: Arc<dyn EventEmitter>,
        settings: &RuntimeSettings,
    ) -> Self {
        Self {
            registry,
            store,
            runner,
            credentials,
            emitter,
            install_timeout: settings.install_timeout(),
            install_root: settings.install_root.clone(),
            ledger: Mutex::new(Ledger::default()),
            server_locks: Mutex::new(HashMap::new()),
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn server_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.server_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Store the job and announce its latest step.
    fn record(&self, job: &InstallationJob) {
        {
            let mut ledger = self.ledger();
            if ledger.jobs.insert(job.id, job.clone()).is_none() {
                let history = ledger.history.entry(job.server.clone()).or_default();
                history.push_back(job.id);
                let excess = history.len().saturating_sub(JOBS_KEPT_PER_SERVER);
                let evicted: Vec<Uuid> = history.drain(..excess).collect();
                for id in evicted {
                    ledger.jobs.remove(&id);
                }
            }
        }
        let message = job.log.last().map(|s| s.message.clone()).unwrap_or_default();
        self.emitter.emit(RuntimeEvent::InstallStatusChanged {
            server: job.server.clone(),
            job_id: job.id,
            status: job.status,
            message,
        });
    }

    fn advance(&self, job: &mut InstallationJob, to: InstallStatus, message: impl Into<String>) {
        if let Err(e) = job.advance(to, message) {
            warn!(server = %job.server, error = %e, "install job rejected status change");
        }
        self.record(job);
    }

    fn fail(&self, job: &mut InstallationJob, failure: InstallFailure) -> InstallationJob {
        warn!(server = %job.server, job_id = %job.id, error = %failure, "Installation failed");
        if let Err(e) = job.fail(failure) {
            warn!(server = %job.server, error = %e, "install job already finished");
        }
        self.record(job);
        job.clone()
    }

    /// Install `name` and return the finished job (`Done` or `Failed`).
    pub async fn install(&self, name: &str) -> InstallationJob {
        let mut job = InstallationJob::new(name);
        self.record(&job);

        let definition = match self.registry.get(name).await {
            Ok(definition) => definition,
            Err(_) => {
                return self.fail(
                    &mut job,
                    InstallFailure::UnknownServer {
                        name: name.to_string(),
                    },
                );
            }
        };

        let lock = self.server_lock(name);
        let _guard = lock.lock().await;
        info!(server = %name, job_id = %job.id, "Installation started");

        if let Err(failure) = self.check_dependencies(&mut job, &definition).await {
            return self.fail(&mut job, failure);
        }
        if let Err(failure) = self.run_install(&mut job, &definition).await {
            return self.fail(&mut job, failure);
        }
        let staged = match self.configure_keys(&mut job, &definition).await {
            Ok(staged) => staged,
            Err(failure) => return self.fail(&mut job, failure),
        };

        {
            let mut ledger = self.ledger();
            ledger.installed.insert(name.to_string());
            ledger.staged_env.insert(name.to_string(), staged);
        }
        self.persist_installed().await;
        self.advance(&mut job, InstallStatus::Done, "installed");
        info!(server = %name, job_id = %job.id, "Installation finished");
        job
    }

    async fn check_dependencies(&self, job: &mut InstallationJob, definition: &ServerDefinition) -> Result<(), InstallFailure> {
        let programs: Vec<&str> = match &definition.install {
            Some(spec) => spec.method.required_programs().to_vec(),
            None => vec![definition.launch.command.as_str()],
        };
        self.advance(
            job,
            InstallStatus::CheckingDependencies,
            format!("checking for {}", programs.join(", ")),
        );

        for program in programs {
            match self.runner.probe(program).await {
                Some(path) => job.note(format!("found {program} at {}", path.display())),
                None => {
                    return Err(InstallFailure::MissingDependency {
                        program: program.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn run_install(&self, job: &mut InstallationJob, definition: &ServerDefinition) -> Result<(), InstallFailure> {
        let Some(spec) = &definition.install else {
            job.note("no package to install");
            return Ok(());
        };

        let command = spec
            .method
            .install_command(&spec.package, self.install_root.as_deref());
        self.advance(job, InstallStatus::Installing, format!("running `{command}`"));

        match self.runner.run(&command, self.install_timeout).await {
            Ok(output) => {
                if !output.stdout_tail.is_empty() {
                    job.note(output.stdout_tail);
                }
                Ok(())
            }
            Err(failure) => Err(InstallFailure::InstallCommandFailed {
                command: command.to_string(),
                failure,
            }),
        }
    }

    async fn configure_keys(
        &self,
        job: &mut InstallationJob,
        definition: &ServerDefinition,
    ) -> Result<HashMap<String, String>, InstallFailure> {
        let mut staged = HashMap::new();
        if definition.required_env.is_empty() {
            return Ok(staged);
        }

        self.advance(
            job,
            InstallStatus::ConfiguringKeys,
            format!("resolving {}", definition.required_env.join(", ")),
        );
        for key in &definition.required_env {
            match self.credentials.get(key).await {
                Ok(Some(value)) => {
                    staged.insert(key.clone(), value);
                }
                Ok(None) => return Err(InstallFailure::MissingCredential { key: key.clone() }),
                Err(e) => {
                    warn!(server = %definition.name, key = %key, error = %e, "credential lookup failed");
                    return Err(InstallFailure::MissingCredential { key: key.clone() });
                }
            }
        }
        job.note(format!("staged {} credential(s)", staged.len()));
        Ok(staged)
    }

    /// Load the installed set recorded by earlier runs, keeping only servers
    /// that are still registered. Returns how many were restored.
    pub async fn restore(&self) -> Result<usize, StoreError> {
        let mut restored = Vec::new();
        for name in self.store.load_installed().await? {
            if self.registry.contains(&name).await {
                restored.push(name);
            } else {
                debug!(server = %name, "dropping install record of unregistered server");
            }
        }
        let count = restored.len();
        self.ledger().installed.extend(restored);
        Ok(count)
    }

    /// Write the installed set. A failed write only costs a reinstall later.
    async fn persist_installed(&self) {
        let _guard = self.persist_lock.lock().await;
        let mut names: Vec<String> = self.ledger().installed.iter().cloned().collect();
        names.sort();
        if let Err(e) = self.store.save_installed(&names).await {
            warn!(error = %e, "Failed to persist installed servers");
        }
    }

    /// Whether a job for `name` has completed successfully.
    pub fn is_installed(&self, name: &str) -> bool {
        self.ledger().installed.contains(name)
    }

    /// Credentials staged by the last successful install of `name`.
    pub fn staged_env(&self, name: &str) -> HashMap<String, String> {
        self.ledger().staged_env.get(name).cloned().unwrap_or_default()
    }

    pub fn job(&self, id: Uuid) -> Option<InstallationJob> {
        self.ledger().jobs.get(&id).cloned()
    }

    pub fn latest_job(&self, name: &str) -> Option<InstallationJob> {
        let ledger = self.ledger();
        ledger
            .history
            .get(name)
            .and_then(VecDeque::back)
            .and_then(|id| ledger.jobs.get(id))
            .cloned()
    }

    /// Remembered jobs for `name`, oldest first.
    pub fn jobs_for(&self, name: &str) -> Vec<InstallationJob> {
        let ledger = self.ledger();
        ledger
            .history
            .get(name)
            .map(|ids| ids.iter().filter_map(|id| ledger.jobs.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    /// Drop everything known about `name` (after it was removed from the registry).
    pub async fn forget(&self, name: &str) {
        let was_installed = {
            let mut ledger = self.ledger();
            ledger.staged_env.remove(name);
            if let Some(ids) = ledger.history.remove(name) {
                for id in ids {
                    ledger.jobs.remove(&id);
                }
            }
            ledger.installed.remove(name)
        };
        self.server_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        if was_installed {
            self.persist_installed().await;
        }
    }
}
