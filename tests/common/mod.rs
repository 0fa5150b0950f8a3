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

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use amplify::confinement::Confined;
use renterstore::{
    Config, ContractDir, ContractHeader, ContractId, Currency, FileContractRevision, Hash256, PublicKey, SecretKey,
    SiacoinOutput, Transaction, TransactionSignature, UnlockConditions,
};

pub fn random_root() -> Hash256 { Hash256::from(rand::random::<[u8; 32]>()) }

pub fn random_roots(count: usize) -> Vec<Hash256> { (0..count).map(|_| random_root()).collect() }

pub fn random_id() -> ContractId { ContractId::from(rand::random::<[u8; 32]>()) }

pub fn revision(id: ContractId, number: u64) -> FileContractRevision {
    FileContractRevision {
        parent_id: id,
        unlock_conditions: UnlockConditions {
            timelock: 0,
            public_keys: Confined::from_checked(vec![PublicKey::from([0x11u8; 32]), PublicKey::from([0x22u8; 32])]),
            signatures_required: 2,
        },
        new_revision_number: number,
        new_file_size: 0,
        new_file_merkle_root: Hash256::default(),
        new_window_start: 50_000,
        new_window_end: 50_144,
        new_valid_proof_outputs: Confined::from_checked(vec![
            SiacoinOutput { value: Currency::new(1_000_000), unlock_hash: Hash256::from([1u8; 32]) },
            SiacoinOutput { value: Currency::new(0), unlock_hash: Hash256::from([2u8; 32]) },
        ]),
        new_missed_proof_outputs: Confined::from_checked(vec![SiacoinOutput {
            value: Currency::new(1_000_000),
            unlock_hash: Hash256::from([1u8; 32]),
        }]),
        new_unlock_hash: Hash256::from([3u8; 32]),
    }
}

pub fn unsigned(revision: FileContractRevision) -> Transaction {
    Transaction { file_contract_revisions: Confined::from_checked(vec![revision]), signatures: none!() }
}

/// Transaction carrying the revision together with renter and host signatures.
pub fn signed(revision: FileContractRevision) -> Transaction {
    let parent_id = Hash256::from(revision.parent_id.to_bytes());
    let signatures = (0..2u64)
        .map(|index| TransactionSignature {
            parent_id,
            public_key_index: index,
            signature: Confined::from_checked(vec![index as u8 + 1; 64]),
        })
        .collect::<Vec<_>>();
    Transaction {
        file_contract_revisions: Confined::from_checked(vec![revision]),
        signatures: Confined::from_checked(signatures),
    }
}

pub fn header(id: ContractId) -> ContractHeader {
    ContractHeader {
        transaction: signed(revision(id, 1)),
        secret_key: SecretKey::from([0x55u8; 64]),
        start_height: 49_000,
        download_spending: Currency::ZERO,
        storage_spending: Currency::ZERO,
        upload_spending: Currency::ZERO,
        total_cost: Currency::new(1_200_000),
        contract_fee: Currency::new(100_000),
        txn_fee: Currency::new(50_000),
        siafund_fee: Currency::new(50_000),
    }
}

/// Revision following the latest one of the header.
pub fn next_revision(header: &ContractHeader) -> FileContractRevision {
    let mut revision = header.last_revision().clone();
    revision.new_revision_number += 1;
    revision.new_file_size += 1 << 22;
    revision
}

pub fn open(dir: &Path) -> ContractDir { ContractDir::open(&Config::with_dir(dir)).expect("unable to open contract dir") }

pub fn contract_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "contract"))
        .collect::<Vec<_>>();
    files.sort();
    files
}
