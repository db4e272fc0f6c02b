//! In-memory query cache for contract data, invalidated by terminal progress
//! steps and by starting a reanalysis.
//!
//! Entries are keyed like the service's read endpoints. The contract list is
//! not stored here; consumers watch [`QueryCache::list_epoch`] and refetch
//! their list when it moves.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clausemap_core::{Contract, ContractId, Finding, ProgressStep, TerminalHook};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Findings(ContractId),
    Contract(ContractId),
    ContractList,
}

#[derive(Default)]
struct Entries {
    contracts: HashMap<ContractId, Contract>,
    findings: HashMap<ContractId, Arc<Vec<Finding>>>,
    list_epoch: u64,
}

/// Shared cache of contracts and finding lists.
///
/// Safe to share between the progress feed task and readers.
#[derive(Default)]
pub struct QueryCache {
    entries: Mutex<Entries>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contract(&self, id: ContractId) -> Option<Contract> {
        self.lock().contracts.get(&id).cloned()
    }

    pub fn put_contract(&self, contract: Contract) {
        self.lock().contracts.insert(contract.id, contract);
    }

    pub fn findings(&self, id: ContractId) -> Option<Arc<Vec<Finding>>> {
        self.lock().findings.get(&id).cloned()
    }

    pub fn put_findings(&self, id: ContractId, findings: Vec<Finding>) -> Arc<Vec<Finding>> {
        let findings = Arc::new(findings);
        self.lock().findings.insert(id, Arc::clone(&findings));
        findings
    }

    /// Drop one entry. Invalidating [`CacheKey::ContractList`] bumps the list epoch.
    pub fn invalidate(&self, key: CacheKey) {
        let mut entries = self.lock();
        match key {
            CacheKey::Findings(id) => {
                entries.findings.remove(&id);
            }
            CacheKey::Contract(id) => {
                entries.contracts.remove(&id);
            }
            CacheKey::ContractList => entries.list_epoch += 1,
        }
    }

    /// Counter bumped every time the contract list goes stale.
    pub fn list_epoch(&self) -> u64 {
        self.lock().list_epoch
    }
}

/// Keys made stale by a job ending with `step`.
pub fn stale_keys(job: ContractId, step: ProgressStep) -> Vec<CacheKey> {
    match step {
        ProgressStep::Completed => vec![
            CacheKey::Findings(job),
            CacheKey::Contract(job),
            CacheKey::ContractList,
        ],
        ProgressStep::Failed => vec![CacheKey::Findings(job), CacheKey::Contract(job)],
        _ => Vec::new(),
    }
}

/// Keys made stale by queuing a new analysis job for `job`.
pub fn reanalysis_keys(job: ContractId) -> Vec<CacheKey> {
    vec![
        CacheKey::Contract(job),
        CacheKey::Findings(job),
        CacheKey::ContractList,
    ]
}

impl QueryCache {
    /// Drop everything a restarted analysis of `job` will replace.
    pub fn reanalysis_started(&self, job: ContractId) {
        let keys = reanalysis_keys(job);
        info!(job, invalidated = ?keys, "reanalysis started, invalidating cached queries");
        for key in keys {
            self.invalidate(key);
        }
    }
}

impl TerminalHook for QueryCache {
    fn on_terminal(&self, job: ContractId, step: ProgressStep) {
        let keys = stale_keys(job, step);
        info!(job, step = %step, invalidated = ?keys, "invalidating cached queries");
        for key in keys {
            self.invalidate(key);
        }
    }
}

#[cfg(feature = "http")]
mod fetch {
    use super::*;
    use crate::http::{ApiClient, Reanalysis, SyncError};
    use tracing::debug;

    /// Read-through wrapper: serve from the cache, fetch on a miss.
    #[derive(Clone)]
    pub struct CachedClient {
        client: ApiClient,
        cache: Arc<QueryCache>,
    }

    impl CachedClient {
        pub fn new(client: ApiClient, cache: Arc<QueryCache>) -> Self {
            Self { client, cache }
        }

        pub fn client(&self) -> &ApiClient {
            &self.client
        }

        pub fn cache(&self) -> &Arc<QueryCache> {
            &self.cache
        }

        pub async fn contract(&self, id: ContractId) -> Result<Contract, SyncError> {
            if let Some(contract) = self.cache.contract(id) {
                debug!(id, "contract served from cache");
                return Ok(contract);
            }
            let contract = self.client.contract(id).await?;
            self.cache.put_contract(contract.clone());
            Ok(contract)
        }

        pub async fn findings(&self, id: ContractId) -> Result<Arc<Vec<Finding>>, SyncError> {
            if let Some(findings) = self.cache.findings(id) {
                debug!(id, "findings served from cache");
                return Ok(findings);
            }
            let findings = self.client.findings(id).await?;
            Ok(self.cache.put_findings(id, findings))
        }

        /// Queue a new analysis job and drop the cached views it will replace.
        pub async fn reanalyze(&self, id: ContractId) -> Result<Reanalysis, SyncError> {
            let ack = self.client.reanalyze(id).await?;
            self.cache.reanalysis_started(id);
            Ok(ack)
        }
    }
}

#[cfg(feature = "http")]
pub use fetch::CachedClient;
