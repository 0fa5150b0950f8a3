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

//! Write-ahead update log.
//!
//! The log stores named, opaque updates grouped into transactions. A transaction goes through two
//! durable steps: setup (its updates are persisted and will be recovered after a crash) and
//! applied (the caller has written the updates to their final place, so they must never be
//! replayed again).

use std::io;

use amplify::confinement::{self, SmallBlob, TinyString};
use strict_encoding::{DeserializeError, SerializeError};

use crate::LIB_NAME_RENTERSTORE;

/// Single named update. The log never interprets the instructions.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[derive(StrictType, StrictDumb, StrictEncode, StrictDecode)]
#[strict_type(lib = LIB_NAME_RENTERSTORE)]
pub struct Update {
    pub name: TinyString,
    pub instructions: SmallBlob,
}

impl Update {
    pub fn new(name: &str, instructions: Vec<u8>) -> Result<Self, confinement::Error> {
        Ok(Self { name: TinyString::try_from(name.to_owned())?, instructions: SmallBlob::try_from(instructions)? })
    }
}

/// Handle to a write-ahead log shared between all contracts of a registry.
///
/// Implementations must guarantee that the updates of a transaction become durable all together or
/// not at all, and that a transaction which has completed its setup is returned on recovery until
/// it is signaled as applied.
pub trait UpdateLog: Clone + Send + Sync {
    type Txn: LogTxn;

    /// Creates a new transaction. Nothing is persisted until [`LogTxn::signal_setup_complete`].
    fn new_transaction(&self, updates: Vec<Update>) -> Result<Self::Txn, LogError>;
}

pub trait LogTxn: Send {
    /// Transaction number, unique within the log and growing with each new transaction.
    fn id(&self) -> u64;

    fn updates(&self) -> &[Update];

    /// Returns only once the transaction is durable.
    fn signal_setup_complete(&mut self) -> Result<(), LogError>;

    /// Marks the transaction as applied; after this it is never recovered again.
    fn signal_updates_applied(&mut self) -> Result<(), LogError>;
}

#[derive(Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum LogError {
    #[from]
    #[display(inner)]
    Io(io::Error),

    /// unable to encode log record - {0}
    #[from]
    Encoding(SerializeError),

    /// log record has a valid checksum but can't be decoded - {0}
    #[from]
    Decoding(DeserializeError),

    /// log transaction exceeds size limits - {0}
    #[from]
    Confinement(confinement::Error),

    /// log transaction must contain at least one update.
    EmptyTransaction,

    /// log transaction {0} was not set up before being signaled as applied.
    SetupIncomplete(u64),

    /// log transaction {0} has already completed its setup.
    AlreadySetup(u64),

    /// log transaction {0} has already been applied.
    AlreadyApplied(u64),
}

pub mod file {
    //! File-backed update log.
    //!
    //! The log file starts with a binfile header followed by framed records:
    //! `u32 LE length | SHA-256 of the body | body`. A record which is cut short or fails its
    //! checksum marks the torn tail left by a crash; it and everything after it is dropped.

    use std::collections::BTreeMap;
    use std::fs::{self, File, OpenOptions};
    use std::io::{Read, Write};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use amplify::confinement::{Confined, SmallVec, U24};
    use binfile::BinFile;
    use commit_verify::{DigestExt, Sha256};
    use indexmap::IndexSet;
    use parking_lot::Mutex;
    use strict_encoding::{StrictDeserialize, StrictSerialize};

    use super::*;

    pub const LOG_MAGIC: u64 = u64::from_be_bytes(*b"RSUPDLOG");
    pub const LOG_VERSION: u16 = 0;

    const FRAME_PREFIX: usize = 4 + 32;

    #[derive(Clone, Eq, PartialEq, Debug)]
    #[derive(StrictType, StrictDumb, StrictEncode, StrictDecode)]
    #[strict_type(lib = LIB_NAME_RENTERSTORE)]
    struct LogSetup {
        txn: u64,
        updates: SmallVec<Update>,
    }

    #[derive(Clone, Eq, PartialEq, Debug)]
    #[derive(StrictType, StrictDumb, StrictEncode, StrictDecode)]
    #[strict_type(lib = LIB_NAME_RENTERSTORE, tags = custom, dumb = Self::Applied(strict_dumb!()))]
    enum LogRecord {
        /// Written first into a compacted log: number of the next transaction.
        #[strict_type(tag = 0x00)]
        Checkpoint(u64),

        #[strict_type(tag = 0x01)]
        Setup(LogSetup),

        #[strict_type(tag = 0x02)]
        Applied(u64),
    }

    impl StrictSerialize for LogRecord {}
    impl StrictDeserialize for LogRecord {}

    impl LogRecord {
        fn to_frame(&self) -> Result<Vec<u8>, LogError> {
            let body = self.to_strict_serialized::<U24>()?;
            let mut hasher = Sha256::default();
            hasher.input_raw(body.as_slice());
            let mut frame = Vec::with_capacity(FRAME_PREFIX + body.len());
            frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
            frame.extend_from_slice(&hasher.finish());
            frame.extend_from_slice(body.as_slice());
            Ok(frame)
        }
    }

    struct LogInner {
        path: PathBuf,
        file: File,
        next_txn: u64,
        pending: IndexSet<u64>,
    }

    impl LogInner {
        fn append(&mut self, record: &LogRecord) -> Result<(), LogError> {
            let frame = record.to_frame()?;
            self.file.write_all(&frame)?;
            self.file.sync_data()?;
            Ok(())
        }
    }

    /// Update log kept in a single append-only file. Cloning produces another handle to the same
    /// log.
    #[derive(Clone)]
    pub struct FileLog(Arc<Mutex<LogInner>>);

    impl FileLog {
        /// Opens the log at `path`, creating it if it does not exist.
        ///
        /// Returns the log together with all transactions which completed their setup but were
        /// never applied, in the order they were set up.
        pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<FileTxn>), LogError> {
            let path = path.as_ref().to_path_buf();
            if !path.exists() {
                BinFile::<LOG_MAGIC, LOG_VERSION>::create_new(&path)?;
                info!("created new update log at '{}'", path.display());
            }

            let mut data = Vec::new();
            BinFile::<LOG_MAGIC, LOG_VERSION>::open(&path)?.read_to_end(&mut data)?;

            let mut next_txn = 1u64;
            let mut setups = BTreeMap::<u64, LogSetup>::new();
            let mut applied = 0usize;
            let mut pos = 0usize;
            let mut torn = false;
            while pos < data.len() {
                let Some(body) = Self::read_frame(&data[pos..]) else {
                    warn!(
                        "dropping torn tail of the update log '{}' at offset {pos} ({} bytes)",
                        path.display(),
                        data.len() - pos
                    );
                    torn = true;
                    break;
                };
                pos += FRAME_PREFIX + body.len();
                let body = Confined::try_from(body.to_vec())?;
                match LogRecord::from_strict_serialized::<U24>(body)? {
                    LogRecord::Checkpoint(next) => next_txn = next_txn.max(next),
                    LogRecord::Setup(setup) => {
                        next_txn = next_txn.max(setup.txn + 1);
                        setups.insert(setup.txn, setup);
                    }
                    LogRecord::Applied(txn) => {
                        next_txn = next_txn.max(txn + 1);
                        setups.remove(&txn);
                        applied += 1;
                    }
                }
            }

            if torn || applied > 0 {
                Self::compact(&path, next_txn, setups.values())?;
            }

            let file = OpenOptions::new().append(true).open(&path)?;
            let pending = setups.keys().copied().collect();
            let log = FileLog(Arc::new(Mutex::new(LogInner { path, file, next_txn, pending })));
            let recovered = setups
                .into_values()
                .map(|setup| FileTxn {
                    txn: setup.txn,
                    updates: setup.updates.release(),
                    state: TxnState::SetUp,
                    log: log.clone(),
                })
                .collect::<Vec<_>>();
            debug!("update log opened with {} pending transaction(s)", recovered.len());
            Ok((log, recovered))
        }

        /// Parses a single frame; `None` if the frame is incomplete or its checksum doesn't match.
        fn read_frame(data: &[u8]) -> Option<&[u8]> {
            if data.len() < FRAME_PREFIX {
                return None;
            }
            let mut len = [0u8; 4];
            len.copy_from_slice(&data[..4]);
            let len = u32::from_le_bytes(len) as usize;
            let body = data.get(FRAME_PREFIX..FRAME_PREFIX + len)?;
            let mut hasher = Sha256::default();
            hasher.input_raw(body);
            if hasher.finish() != data[4..FRAME_PREFIX] {
                return None;
            }
            Some(body)
        }

        /// Rewrites the log so it contains only pending transactions and atomically replaces the
        /// old file.
        fn compact<'a>(
            path: &Path,
            next_txn: u64,
            pending: impl IntoIterator<Item = &'a LogSetup>,
        ) -> Result<(), LogError> {
            let tmp = path.with_extension("compact");
            if tmp.exists() {
                fs::remove_file(&tmp)?;
            }
            let mut file = BinFile::<LOG_MAGIC, LOG_VERSION>::create_new(&tmp)?;
            file.write_all(&LogRecord::Checkpoint(next_txn).to_frame()?)?;
            let mut count = 0usize;
            for setup in pending {
                file.write_all(&LogRecord::Setup(setup.clone()).to_frame()?)?;
                count += 1;
            }
            file.flush()?;
            drop(file);
            File::open(&tmp)?.sync_all()?;
            fs::rename(&tmp, path)?;
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                File::open(dir)?.sync_all()?;
            }
            debug!("compacted update log '{}' down to {count} pending transaction(s)", path.display());
            Ok(())
        }

        pub fn path(&self) -> PathBuf { self.0.lock().path.clone() }

        /// Number of transactions which completed setup and were not applied yet.
        pub fn pending_count(&self) -> usize { self.0.lock().pending.len() }

        pub fn pending_txns(&self) -> Vec<u64> { self.0.lock().pending.iter().copied().collect() }
    }

    impl UpdateLog for FileLog {
        type Txn = FileTxn;

        fn new_transaction(&self, updates: Vec<Update>) -> Result<FileTxn, LogError> {
            if updates.is_empty() {
                return Err(LogError::EmptyTransaction);
            }
            SmallVec::<Update>::try_from(updates.clone())?;
            let mut inner = self.0.lock();
            let txn = inner.next_txn;
            inner.next_txn += 1;
            Ok(FileTxn { txn, updates, state: TxnState::Created, log: self.clone() })
        }
    }

    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    enum TxnState {
        Created,
        SetUp,
        Applied,
    }

    pub struct FileTxn {
        txn: u64,
        updates: Vec<Update>,
        state: TxnState,
        log: FileLog,
    }

    impl LogTxn for FileTxn {
        fn id(&self) -> u64 { self.txn }

        fn updates(&self) -> &[Update] { &self.updates }

        fn signal_setup_complete(&mut self) -> Result<(), LogError> {
            if self.state != TxnState::Created {
                return Err(LogError::AlreadySetup(self.txn));
            }
            let updates = SmallVec::try_from(self.updates.clone())?;
            let record = LogRecord::Setup(LogSetup { txn: self.txn, updates });
            let mut inner = self.log.0.lock();
            inner.append(&record)?;
            inner.pending.insert(self.txn);
            self.state = TxnState::SetUp;
            Ok(())
        }

        fn signal_updates_applied(&mut self) -> Result<(), LogError> {
            match self.state {
                TxnState::Created => return Err(LogError::SetupIncomplete(self.txn)),
                TxnState::Applied => return Err(LogError::AlreadyApplied(self.txn)),
                TxnState::SetUp => {}
            }
            let mut inner = self.log.0.lock();
            inner.append(&LogRecord::Applied(self.txn))?;
            inner.pending.shift_remove(&self.txn);
            self.state = TxnState::Applied;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs::OpenOptions;
    use std::io::Write;

    use tempfile::tempdir;

    use super::file::FileLog;
    use super::*;

    fn update(name: &str, byte: u8) -> Update { Update::new(name, vec![byte; 40]).unwrap() }

    #[test]
    fn setup_is_recovered() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let (log, recovered) = FileLog::open(&path).unwrap();
        assert!(recovered.is_empty());

        let mut txn = log
            .new_transaction(vec![update("a", 1), update("b", 2)])
            .unwrap();
        txn.signal_setup_complete().unwrap();
        assert_eq!(log.pending_count(), 1);
        drop(log);

        let (_, recovered) = FileLog::open(&path).unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].id(), txn.id());
        assert_eq!(recovered[0].updates(), &[update("a", 1), update("b", 2)]);
    }

    #[test]
    fn applied_is_not_recovered() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let (log, _) = FileLog::open(&path).unwrap();

        let mut first = log.new_transaction(vec![update("a", 1)]).unwrap();
        let mut second = log.new_transaction(vec![update("b", 2)]).unwrap();
        first.signal_setup_complete().unwrap();
        second.signal_setup_complete().unwrap();
        first.signal_updates_applied().unwrap();
        assert_eq!(log.pending_txns(), vec![second.id()]);

        let (_, recovered) = FileLog::open(&path).unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].id(), second.id());
    }

    #[test]
    fn unsetup_transaction_is_not_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let (log, _) = FileLog::open(&path).unwrap();
        let _txn = log.new_transaction(vec![update("a", 1)]).unwrap();
        let (_, recovered) = FileLog::open(&path).unwrap();
        assert!(recovered.is_empty());
    }

    #[test]
    fn signal_order_is_enforced() {
        let dir = tempdir().unwrap();
        let (log, _) = FileLog::open(dir.path().join("test.wal")).unwrap();
        assert!(matches!(log.new_transaction(vec![]), Err(LogError::EmptyTransaction)));

        let mut txn = log.new_transaction(vec![update("a", 1)]).unwrap();
        let id = txn.id();
        assert!(matches!(txn.signal_updates_applied(), Err(LogError::SetupIncomplete(n)) if n == id));
        txn.signal_setup_complete().unwrap();
        assert!(matches!(txn.signal_setup_complete(), Err(LogError::AlreadySetup(n)) if n == id));
        txn.signal_updates_applied().unwrap();
        assert!(matches!(txn.signal_updates_applied(), Err(LogError::AlreadyApplied(n)) if n == id));
    }

    #[test]
    fn ids_survive_restart_and_compaction() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let (log, _) = FileLog::open(&path).unwrap();
        let mut txn = log.new_transaction(vec![update("a", 1)]).unwrap();
        txn.signal_setup_complete().unwrap();
        txn.signal_updates_applied().unwrap();
        let last = txn.id();
        drop(log);

        // The first reopen compacts away the applied transaction, the second one reads the
        // compacted file.
        for _ in 0..2 {
            let (log, recovered) = FileLog::open(&path).unwrap();
            assert!(recovered.is_empty());
            let txn = log.new_transaction(vec![update("b", 2)]).unwrap();
            assert!(txn.id() > last);
        }
    }

    #[test]
    fn torn_tail_is_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let (log, _) = FileLog::open(&path).unwrap();
        let mut txn = log.new_transaction(vec![update("a", 1)]).unwrap();
        txn.signal_setup_complete().unwrap();
        drop(log);

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0x30, 0, 0, 0, 0xDE, 0xAD]).unwrap();
        drop(file);

        let (log, recovered) = FileLog::open(&path).unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].id(), txn.id());

        // The tail is gone after compaction, so further appends stay readable.
        let mut next = log.new_transaction(vec![update("b", 2)]).unwrap();
        next.signal_setup_complete().unwrap();
        let (_, recovered) = FileLog::open(&path).unwrap();
        assert_eq!(recovered.len(), 2);
    }

    #[test]
    fn corrupted_checksum_ends_scan() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let (log, _) = FileLog::open(&path).unwrap();
        let mut txn = log.new_transaction(vec![update("a", 1)]).unwrap();
        txn.signal_setup_complete().unwrap();
        drop(log);

        let mut data = std::fs::read(&path).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        std::fs::write(&path, data).unwrap();

        let (_, recovered) = FileLog::open(&path).unwrap();
        assert!(recovered.is_empty());
    }

    #[test]
    fn foreign_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        std::fs::write(&path, b"definitely not an update log").unwrap();
        assert!(FileLog::open(&path).is_err());
    }
}
