// RenterStore: crash-safe persistence for renter-side storage contracts
//
// SPDX-License-Identifier: Apache-2.0
//
// Written in 2025 by RenterStore developers
//
// Copyright (C) 2025 RenterStore developers.
// All rights under the above copyrights are reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except
// in compliance with the License. You may obtain a copy of the License at
//
//        http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express
// or implied. See the License for the specific language governing permissions and limitations under
// the License.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rentertypes::{ContractId, Hash256};

use crate::contract::txn_contract_id;
use crate::wal::{LogError, LogTxn, UpdateLog};
use crate::{
    Config, ContractError, ContractHeader, ContractMeta, FileLog, PersistentContract, CONTRACT_EXTENSION,
};

/// Registry entry. The header handle stays here while the contract itself is leased out.
struct Entry<L: UpdateLog> {
    header: Arc<Mutex<ContractHeader>>,
    contract: Option<PersistentContract<L>>,
}

/// Registry of all contracts stored in a directory.
///
/// Contracts are mutated only through a [`Lease`], and at most one lease per contract exists at a
/// time. Metadata can be read at any moment with [`Self::view`], even while the contract is leased.
pub struct ContractSet<L: UpdateLog> {
    dir: PathBuf,
    log: L,
    contracts: Mutex<BTreeMap<ContractId, Entry<L>>>,
    returned: Condvar,
}

/// Contract set over a directory with a file-backed update log.
pub type ContractDir = ContractSet<FileLog>;

impl<L: UpdateLog> ContractSet<L> {
    /// Creates an empty set over `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>, log: L) -> Result<Self, SetError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, log, contracts: none!(), returned: Condvar::new() })
    }

    /// Loads all contract files from `dir`, attaching the transactions recovered from the update
    /// log to the contracts they belong to.
    ///
    /// A single unreadable or invalid contract file fails the whole load. Recovered transactions
    /// which belong to no contract in the directory are left in the log.
    pub fn load(dir: impl AsRef<Path>, log: L, recovered: Vec<L::Txn>) -> Result<Self, SetError> {
        let set = Self::new(dir, log)?;

        let mut by_contract = BTreeMap::<ContractId, Vec<L::Txn>>::new();
        for txn in recovered {
            match txn_contract_id(&txn)? {
                Some(id) => by_contract.entry(id).or_default().push(txn),
                None => warn!("recovered log transaction {} has no updates and is ignored", txn.id()),
            }
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&set.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == CONTRACT_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut contracts = BTreeMap::new();
        for path in paths {
            let mut contract = PersistentContract::load(&path, set.log.clone())
                .map_err(|error| SetError::Load { file: path.display().to_string(), error })?;
            let id = contract.id();
            if contracts.contains_key(&id) {
                return Err(SetError::DuplicateContract(id));
            }
            for txn in by_contract.remove(&id).unwrap_or_default() {
                contract.attach_recovered(txn);
            }
            contracts.insert(id, Entry { header: contract.header_handle(), contract: Some(contract) });
        }
        info!("loaded {} contract(s) from '{}'", contracts.len(), set.dir.display());
        *set.contracts.lock() = contracts;

        for (id, txns) in by_contract {
            warn!("{} recovered log transaction(s) refer to unknown contract {id}; leaving them in the log", txns.len());
        }

        Ok(set)
    }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn log(&self) -> &L { &self.log }

    pub fn len(&self) -> usize { self.contracts.lock().len() }

    pub fn is_empty(&self) -> bool { self.contracts.lock().is_empty() }

    pub fn ids(&self) -> Vec<ContractId> { self.contracts.lock().keys().copied().collect() }

    pub fn contains(&self, id: ContractId) -> bool { self.contracts.lock().contains_key(&id) }

    /// Creates a new contract file and adds the contract to the set.
    ///
    /// Fails with an I/O error of kind [`io::ErrorKind::AlreadyExists`] if the contract file is
    /// already present.
    pub fn insert_contract(&self, header: ContractHeader, roots: &[Hash256]) -> Result<ContractMeta, SetError> {
        let contract = PersistentContract::create(&self.dir, header, roots, self.log.clone())?;
        let meta = contract.metadata();
        self.contracts
            .lock()
            .insert(meta.id, Entry { header: contract.header_handle(), contract: Some(contract) });
        info!("added contract {} to the set", meta.id);
        Ok(meta)
    }

    /// Leases the contract, blocking while it is leased by someone else.
    pub fn acquire(&self, id: ContractId) -> Result<Lease<'_, L>, SetError> {
        let mut contracts = self.contracts.lock();
        loop {
            let entry = contracts.get_mut(&id).ok_or(SetError::NotFound(id))?;
            if let Some(contract) = entry.contract.take() {
                return Ok(Lease { set: self, contract: Some(contract) });
            }
            self.returned.wait(&mut contracts);
        }
    }

    /// Leases the contract if it is not leased by someone else.
    pub fn try_acquire(&self, id: ContractId) -> Result<Option<Lease<'_, L>>, SetError> {
        let mut contracts = self.contracts.lock();
        let entry = contracts.get_mut(&id).ok_or(SetError::NotFound(id))?;
        Ok(entry
            .contract
            .take()
            .map(|contract| Lease { set: self, contract: Some(contract) }))
    }

    /// Ends the lease. Same as dropping it.
    pub fn return_contract(&self, lease: Lease<'_, L>) { drop(lease) }

    fn release(&self, contract: PersistentContract<L>) {
        {
            let mut contracts = self.contracts.lock();
            if let Some(entry) = contracts.get_mut(&contract.id()) {
                entry.contract = Some(contract);
            }
        }
        self.returned.notify_all();
    }

    /// Snapshot of the contract metadata; does not require a lease.
    pub fn view(&self, id: ContractId) -> Result<ContractMeta, SetError> {
        let header = self
            .contracts
            .lock()
            .get(&id)
            .map(|entry| entry.header.clone())
            .ok_or(SetError::NotFound(id))?;
        let meta = ContractMeta::from(&*header.lock());
        Ok(meta)
    }

    pub fn view_all(&self) -> Vec<ContractMeta> {
        let headers = self
            .contracts
            .lock()
            .values()
            .map(|entry| entry.header.clone())
            .collect::<Vec<_>>();
        headers
            .iter()
            .map(|header| ContractMeta::from(&*header.lock()))
            .collect()
    }

    /// Replays unapplied log transactions of every contract. Returns the number of replayed
    /// transactions.
    pub fn apply_pending(&self) -> Result<usize, SetError> {
        let mut count = 0usize;
        for id in self.ids() {
            let mut lease = self.acquire(id)?;
            count += lease.commit_txns()?;
        }
        if count > 0 {
            info!("replayed {count} unapplied log transaction(s)");
        }
        Ok(count)
    }
}

impl ContractSet<FileLog> {
    /// Opens the update log and loads the contract directory described by `config`.
    pub fn open(config: &Config) -> Result<Self, SetError> {
        fs::create_dir_all(&config.dir)?;
        let (log, recovered) = FileLog::open(config.log_path())?;
        let set = Self::load(&config.dir, log, recovered)?;
        if config.replay_on_load {
            set.apply_pending()?;
        }
        Ok(set)
    }
}

/// Exclusive access to a contract of a [`ContractSet`]. The contract returns to the set when the
/// lease is dropped.
pub struct Lease<'set, L: UpdateLog> {
    set: &'set ContractSet<L>,
    contract: Option<PersistentContract<L>>,
}

impl<L: UpdateLog> Deref for Lease<'_, L> {
    type Target = PersistentContract<L>;
    fn deref(&self) -> &Self::Target { self.contract.as_ref().expect("lease holds the contract until dropped") }
}

impl<L: UpdateLog> DerefMut for Lease<'_, L> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.contract
            .as_mut()
            .expect("lease holds the contract until dropped")
    }
}

impl<L: UpdateLog> Drop for Lease<'_, L> {
    fn drop(&mut self) {
        if let Some(contract) = self.contract.take() {
            self.set.release(contract);
        }
    }
}

#[derive(Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum SetError {
    #[from]
    #[display(inner)]
    Io(io::Error),

    /// unable to load contract file '{file}' - {error}
    Load { file: String, error: ContractError },

    #[from]
    #[display(inner)]
    Contract(ContractError),

    #[from]
    #[display(inner)]
    Log(LogError),

    /// unknown contract {0}.
    NotFound(ContractId),

    /// contract {0} is missing from the set right after it was added.
    MissingContract(ContractId),

    /// contract {0} is stored in more than one file.
    DuplicateContract(ContractId),
}
