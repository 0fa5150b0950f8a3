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

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use amplify::confinement::{TinyString, TinyVec, U16};
use amplify::Wrapper;
use parking_lot::Mutex;
use rentertypes::{ContractId, Currency, FileContractRevision, Hash256, MerkleRootSet, Transaction, HASH_SIZE};
use strict_encoding::{DecodeError, DeserializeError, SerializeError, StrictDeserialize, StrictSerialize};

use crate::wal::{LogError, LogTxn, Update, UpdateLog};
use crate::{ContractHeader, ContractMeta, InvalidContract, CONTRACT_HEADER_SIZE, LIB_NAME_RENTERSTORE};

/// Extension of contract files inside a contract directory.
pub const CONTRACT_EXTENSION: &str = "contract";

pub const UPDATE_NAME_SET_HEADER: &str = "setHeader";
pub const UPDATE_NAME_SET_ROOT: &str = "setRoot";

const HEADER_SIZE: u64 = CONTRACT_HEADER_SIZE as u64;
const ROOT_SIZE: u64 = HASH_SIZE as u64;

fn root_offset(index: u64) -> u64 { HEADER_SIZE + index * ROOT_SIZE }

/// Replaces the header slot of a contract.
#[derive(Clone, Eq, PartialEq, Debug)]
#[derive(StrictType, StrictDumb, StrictEncode, StrictDecode)]
#[strict_type(lib = LIB_NAME_RENTERSTORE)]
pub struct UpdateSetHeader {
    pub id: ContractId,
    pub header: ContractHeader,
}

/// Writes a Merkle root at the given position: appends it if `index` equals the number of roots,
/// overwrites an existing root otherwise.
#[derive(Clone, Eq, PartialEq, Debug)]
#[derive(StrictType, StrictDumb, StrictEncode, StrictDecode)]
#[strict_type(lib = LIB_NAME_RENTERSTORE)]
pub struct UpdateSetRoot {
    pub id: ContractId,
    pub root: Hash256,
    pub index: u64,
}

impl StrictSerialize for UpdateSetHeader {}
impl StrictDeserialize for UpdateSetHeader {}
impl StrictSerialize for UpdateSetRoot {}
impl StrictDeserialize for UpdateSetRoot {}

/// Decoded form of a log [`Update`] produced by a contract.
#[derive(Clone, Eq, PartialEq, Debug, From)]
pub enum ContractUpdate {
    #[from]
    SetHeader(UpdateSetHeader),
    #[from]
    SetRoot(UpdateSetRoot),
}

impl ContractUpdate {
    pub fn contract_id(&self) -> ContractId {
        match self {
            ContractUpdate::SetHeader(update) => update.id,
            ContractUpdate::SetRoot(update) => update.id,
        }
    }

    pub fn to_update(&self) -> Result<Update, ContractError> {
        let (name, data) = match self {
            ContractUpdate::SetHeader(update) => (UPDATE_NAME_SET_HEADER, update.to_strict_serialized::<U16>()?),
            ContractUpdate::SetRoot(update) => (UPDATE_NAME_SET_ROOT, update.to_strict_serialized::<U16>()?),
        };
        let name = TinyString::try_from(name.to_owned()).map_err(LogError::from)?;
        Ok(Update { name, instructions: data })
    }

    pub fn from_update(update: &Update) -> Result<Self, ContractError> {
        let data = update.instructions.clone();
        match update.name.as_str() {
            UPDATE_NAME_SET_HEADER => Ok(UpdateSetHeader::from_strict_serialized::<U16>(data)?.into()),
            UPDATE_NAME_SET_ROOT => Ok(UpdateSetRoot::from_strict_serialized::<U16>(data)?.into()),
            other => Err(ContractError::UnknownUpdate(other.to_owned())),
        }
    }
}

/// Returns the contract a log transaction belongs to, checking that all of its updates agree.
///
/// Transactions without updates belong to no contract.
pub(crate) fn txn_contract_id(txn: &impl LogTxn) -> Result<Option<ContractId>, ContractError> {
    let mut first = None;
    for update in txn.updates() {
        let id = ContractUpdate::from_update(update)?.contract_id();
        match first {
            None => first = Some(id),
            Some(first) if first != id => {
                return Err(ContractError::MixedTransaction { txn: txn.id(), first, other: id });
            }
            Some(_) => {}
        }
    }
    Ok(first)
}

/// What a revision intent is going to change once committed.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RevisionKind {
    Upload { root: Hash256, index: u64, storage_cost: Currency, bandwidth_cost: Currency },
    Download { bandwidth_cost: Currency },
}

/// Proof that a revision was recorded in the update log, required to commit it.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct RevisionIntent {
    txn: u64,
    kind: RevisionKind,
}

impl RevisionIntent {
    /// Number of the log transaction which holds the intent.
    pub fn txn(&self) -> u64 { self.txn }
    pub fn kind(&self) -> RevisionKind { self.kind }
}

/// Contract backed by its own file and protected by the write-ahead log.
///
/// The file holds the header slot of [`CONTRACT_HEADER_SIZE`] bytes followed by the Merkle roots,
/// 32 bytes each. The file is modified only when a logged transaction is applied, either by
/// [`Self::commit`] or by [`Self::commit_txns`]; the in-memory header changes only after the file
/// was synced.
pub struct PersistentContract<L: UpdateLog> {
    id: ContractId,
    header: Arc<Mutex<ContractHeader>>,
    root_count: u64,
    unapplied: Vec<L::Txn>,
    needs_recovery: bool,
    file: File,
    path: PathBuf,
    log: L,
}

impl<L: UpdateLog> PersistentContract<L> {
    pub(crate) fn create(
        dir: &Path,
        header: ContractHeader,
        roots: &[Hash256],
        log: L,
    ) -> Result<Self, ContractError> {
        header.validate()?;
        let slot = header.to_slot()?;
        let id = header.id();
        let path = dir.join(format!("{id}.{CONTRACT_EXTENSION}"));

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(ContractError::Create)?;
        if let Err(err) = Self::write_new(&mut file, &slot, roots) {
            drop(file);
            if let Err(e) = fs::remove_file(&path) {
                warn!("unable to remove partially written contract file '{}': {e}", path.display());
            }
            return Err(err);
        }
        debug!("created contract {id} with {} Merkle root(s)", roots.len());

        Ok(Self {
            id,
            header: Arc::new(Mutex::new(header)),
            root_count: roots.len() as u64,
            unapplied: vec![],
            needs_recovery: false,
            file,
            path,
            log,
        })
    }

    fn write_new(file: &mut File, slot: &[u8], roots: &[Hash256]) -> Result<(), ContractError> {
        file.set_len(root_offset(roots.len() as u64))
            .map_err(ContractError::WriteHeader)?;
        file.write_all(slot).map_err(ContractError::WriteHeader)?;
        let blob = MerkleRootSet::from(roots.to_vec()).to_blob();
        file.write_all(&blob).map_err(ContractError::WriteRoot)?;
        file.sync_all().map_err(ContractError::Sync)
    }

    pub(crate) fn load(path: &Path, log: L) -> Result<Self, ContractError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(ContractError::Open)?;

        let mut slot = vec![0u8; CONTRACT_HEADER_SIZE];
        file.read_exact(&mut slot)
            .map_err(ContractError::ReadHeader)?;
        let header = ContractHeader::from_slot(&slot)?;
        header.validate()?;

        let root_count = read_roots(&file)?.len() as u64;
        let id = header.id();
        debug!("loaded contract {id} with {root_count} Merkle root(s) from '{}'", path.display());

        Ok(Self {
            id,
            header: Arc::new(Mutex::new(header)),
            root_count,
            unapplied: vec![],
            needs_recovery: false,
            file,
            path: path.to_path_buf(),
            log,
        })
    }

    /// Attaches a transaction recovered from the log at startup. New intents are refused until
    /// the recovered transactions are applied or discarded.
    pub(crate) fn attach_recovered(&mut self, txn: L::Txn) {
        debug!("contract {} has unapplied log transaction {} from a previous run", self.id, txn.id());
        self.unapplied.push(txn);
        self.needs_recovery = true;
    }

    pub(crate) fn header_handle(&self) -> Arc<Mutex<ContractHeader>> { self.header.clone() }

    pub fn id(&self) -> ContractId { self.id }

    pub fn path(&self) -> &Path { &self.path }

    pub fn header(&self) -> ContractHeader { self.header.lock().clone() }

    pub fn metadata(&self) -> ContractMeta { ContractMeta::from(&*self.header.lock()) }

    pub fn root_count(&self) -> u64 { self.root_count }

    /// Numbers of log transactions which were set up but not yet applied, in log order.
    pub fn unapplied_txns(&self) -> Vec<u64> { self.unapplied.iter().map(LogTxn::id).collect() }

    pub fn needs_recovery(&self) -> bool { self.needs_recovery }

    /// Reads all Merkle roots from the file.
    pub fn merkle_roots(&self) -> Result<Vec<Hash256>, ContractError> {
        let roots = read_roots(&self.file)?;
        if roots.len() as u64 != self.root_count {
            error!(
                "contract {} has {} Merkle root(s) on disk while {} are tracked",
                self.id,
                roots.len(),
                self.root_count
            );
            return Err(ContractError::RootCountMismatch {
                id: self.id,
                on_disk: roots.len() as u64,
                tracked: self.root_count,
            });
        }
        Ok(roots.into_inner())
    }

    pub fn merkle_root(&self, index: u64) -> Result<Hash256, ContractError> {
        if index >= self.root_count {
            return Err(ContractError::RootIndexOutOfRange { index, count: self.root_count });
        }
        let mut file = &self.file;
        let mut buf = [0u8; HASH_SIZE];
        file.seek(SeekFrom::Start(root_offset(index)))
            .map_err(ContractError::ReadRoot)?;
        file.read_exact(&mut buf).map_err(ContractError::ReadRoot)?;
        Ok(Hash256::from(buf))
    }

    /// Latest header carried by the unapplied transactions, if any of them sets it.
    pub fn unapplied_header(&self) -> Result<Option<ContractHeader>, ContractError> {
        let mut header = None;
        for txn in &self.unapplied {
            for update in txn.updates() {
                if let ContractUpdate::SetHeader(update) = ContractUpdate::from_update(update)? {
                    header = Some(update.header);
                }
            }
        }
        Ok(header)
    }

    /// Logs the intent to revise the contract with a new sector upload.
    ///
    /// The contract file is not touched: the revision takes effect only with [`Self::commit`] or
    /// on replay.
    pub fn record_upload_intent(
        &mut self,
        revision: FileContractRevision,
        root: Hash256,
        storage_cost: Currency,
        bandwidth_cost: Currency,
    ) -> Result<RevisionIntent, ContractError> {
        let mut header = self.revised_header(revision)?;
        header.storage_spending += storage_cost;
        header.upload_spending += bandwidth_cost;
        header.validate()?;

        let index = self.root_count;
        let updates = vec![
            ContractUpdate::from(UpdateSetHeader { id: self.id, header }).to_update()?,
            ContractUpdate::from(UpdateSetRoot { id: self.id, root, index }).to_update()?,
        ];
        let txn = self.begin(updates)?;
        Ok(RevisionIntent { txn, kind: RevisionKind::Upload { root, index, storage_cost, bandwidth_cost } })
    }

    /// Logs the intent to revise the contract for a download.
    pub fn record_download_intent(
        &mut self,
        revision: FileContractRevision,
        bandwidth_cost: Currency,
    ) -> Result<RevisionIntent, ContractError> {
        let mut header = self.revised_header(revision)?;
        header.download_spending += bandwidth_cost;
        header.validate()?;

        let updates = vec![ContractUpdate::from(UpdateSetHeader { id: self.id, header }).to_update()?];
        let txn = self.begin(updates)?;
        Ok(RevisionIntent { txn, kind: RevisionKind::Download { bandwidth_cost } })
    }

    /// Current header carrying `revision` instead of the latest revision.
    fn revised_header(&self, revision: FileContractRevision) -> Result<ContractHeader, ContractError> {
        if self.needs_recovery {
            return Err(ContractError::PendingRecovery(self.id));
        }
        self.check_owner(revision.parent_id)?;
        let mut header = self.header();
        header.transaction.file_contract_revisions = TinyVec::from_checked(vec![revision]);
        Ok(header)
    }

    fn check_owner(&self, id: ContractId) -> Result<(), ContractError> {
        if id != self.id {
            return Err(ContractError::ForeignRevision { expected: self.id, found: id });
        }
        Ok(())
    }

    fn begin(&mut self, updates: Vec<Update>) -> Result<u64, ContractError> {
        let mut txn = self.log.new_transaction(updates)?;
        txn.signal_setup_complete()?;
        let id = txn.id();
        debug!("contract {} recorded revision intent as log transaction {id}", self.id);
        self.unapplied.push(txn);
        Ok(id)
    }

    /// Applies a previously recorded intent together with the final signed transaction.
    ///
    /// All other unapplied transactions of the contract were built against the header which is
    /// now replaced, so they are released from the log as well.
    pub fn commit(&mut self, intent: &RevisionIntent, signed_txn: Transaction) -> Result<(), ContractError> {
        if !self.unapplied.iter().any(|txn| txn.id() == intent.txn) {
            return Err(ContractError::UnknownIntent(intent.txn));
        }

        let mut header = self.header();
        header.transaction = signed_txn;
        match intent.kind {
            RevisionKind::Upload { storage_cost, bandwidth_cost, .. } => {
                header.storage_spending += storage_cost;
                header.upload_spending += bandwidth_cost;
            }
            RevisionKind::Download { bandwidth_cost } => header.download_spending += bandwidth_cost,
        }
        header.validate()?;
        self.check_owner(header.id())?;

        self.write_header(&header)?;
        if let RevisionKind::Upload { root, index, .. } = intent.kind {
            self.write_root(root, index)?;
        }
        self.sync()?;
        *self.header.lock() = header;

        let released = self.release_unapplied()?;
        debug!("contract {} committed log transaction {} ({released} released)", self.id, intent.txn);
        Ok(())
    }

    /// Applies all unapplied transactions in log order.
    ///
    /// A transaction is checked as a whole before any of its updates is written: every update and
    /// every header it carries must belong to this contract.
    ///
    /// Each transaction is signaled as applied only once its updates are synced, so a failure
    /// leaves the remaining transactions pending and the call can be repeated. Returns the number
    /// of applied transactions.
    pub fn commit_txns(&mut self) -> Result<usize, ContractError> {
        let mut count = 0usize;
        while let Some(txn) = self.unapplied.first() {
            let updates = txn
                .updates()
                .iter()
                .map(ContractUpdate::from_update)
                .collect::<Result<Vec<_>, _>>()?;
            for update in &updates {
                self.check_owner(update.contract_id())?;
                if let ContractUpdate::SetHeader(update) = update {
                    update.header.validate()?;
                    self.check_owner(update.header.id())?;
                }
            }

            let mut header = None;
            for update in updates {
                match update {
                    ContractUpdate::SetHeader(update) => {
                        self.write_header(&update.header)?;
                        header = Some(update.header);
                    }
                    ContractUpdate::SetRoot(update) => self.write_root(update.root, update.index)?,
                }
            }
            self.sync()?;
            if let Some(header) = header {
                *self.header.lock() = header;
            }

            self.unapplied[0].signal_updates_applied()?;
            let txn = self.unapplied.remove(0);
            debug!("contract {} replayed log transaction {}", self.id, txn.id());
            count += 1;
        }
        self.needs_recovery = false;
        Ok(count)
    }

    /// Drops all unapplied transactions without applying them. Returns their number.
    pub fn discard_unapplied(&mut self) -> Result<usize, ContractError> {
        let count = self.release_unapplied()?;
        self.needs_recovery = false;
        if count > 0 {
            info!("contract {} discarded {count} unapplied log transaction(s)", self.id);
        }
        Ok(count)
    }

    fn release_unapplied(&mut self) -> Result<usize, ContractError> {
        let mut count = 0usize;
        while let Some(txn) = self.unapplied.first_mut() {
            txn.signal_updates_applied()?;
            self.unapplied.remove(0);
            count += 1;
        }
        Ok(count)
    }

    fn write_header(&mut self, header: &ContractHeader) -> Result<(), ContractError> {
        let slot = header.to_slot()?;
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(ContractError::WriteHeader)?;
        self.file
            .write_all(&slot)
            .map_err(ContractError::WriteHeader)
    }

    fn write_root(&mut self, root: Hash256, index: u64) -> Result<(), ContractError> {
        if index > self.root_count {
            return Err(ContractError::RootIndexOutOfRange { index, count: self.root_count });
        }
        self.file
            .seek(SeekFrom::Start(root_offset(index)))
            .map_err(ContractError::WriteRoot)?;
        self.file
            .write_all(&root.to_bytes())
            .map_err(ContractError::WriteRoot)?;
        if index == self.root_count {
            self.root_count += 1;
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<(), ContractError> { self.file.sync_all().map_err(ContractError::Sync) }
}

fn read_roots(mut file: &File) -> Result<MerkleRootSet, ContractError> {
    file.seek(SeekFrom::Start(HEADER_SIZE))
        .map_err(ContractError::ReadRoot)?;
    let mut blob = Vec::new();
    file.read_to_end(&mut blob)
        .map_err(ContractError::ReadRoot)?;
    MerkleRootSet::from_blob(&blob)
        .ok_or_else(|| ContractError::ReadRoot(io::Error::new(io::ErrorKind::UnexpectedEof, "partial Merkle root")))
}

#[derive(Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum ContractError {
    /// unable to create contract file - {0}
    Create(io::Error),

    /// unable to open contract file - {0}
    Open(io::Error),

    /// unable to read contract header - {0}
    ReadHeader(io::Error),

    /// unable to write contract header - {0}
    WriteHeader(io::Error),

    /// unable to read Merkle roots - {0}
    ReadRoot(io::Error),

    /// unable to write Merkle root - {0}
    WriteRoot(io::Error),

    /// unable to sync contract file - {0}
    Sync(io::Error),

    /// unable to encode contract data - {0}
    #[from]
    HeaderEncoding(SerializeError),

    /// contract header is corrupted - {0}
    #[from]
    HeaderDecoding(DecodeError),

    /// unable to decode an update from the log - {0}
    #[from]
    UpdateDecoding(DeserializeError),

    /// invalid contract - {0}
    #[from]
    Invalid(InvalidContract),

    /// update log failure - {0}
    #[from]
    Log(LogError),

    /// contract {id} has {on_disk} Merkle roots on disk while {tracked} are tracked in memory.
    RootCountMismatch { id: ContractId, on_disk: u64, tracked: u64 },

    /// Merkle root index {index} is out of range for a contract with {count} roots.
    RootIndexOutOfRange { index: u64, count: u64 },

    /// revision of contract {found} can't be applied to contract {expected}.
    ForeignRevision { expected: ContractId, found: ContractId },

    /// log transaction {0} is not pending for this contract.
    UnknownIntent(u64),

    /// contract {0} has unapplied log transactions from a previous run; replay or discard them first.
    PendingRecovery(ContractId),

    /// log transaction {txn} mixes updates for contracts {first} and {other}.
    MixedTransaction { txn: u64, first: ContractId, other: ContractId },

    /// unknown update '{0}' in the update log.
    UnknownUpdate(String),
}
