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

//! Import of contracts persisted by v1.3.0 renters as JSON documents.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use amplify::confinement::TinyVec;
use rentertypes::{
    BlockHeight, ContractId, Currency, FileContractRevision, MerkleRootSet, PublicKey, SecretKey, Transaction,
};
use serde::de::DeserializeOwned;

use crate::wal::UpdateLog;
use crate::{ContractError, ContractHeader, ContractMeta, ContractSet, SetError};

/// Contract in the v1.3.0 format.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct V130Contract {
    #[serde(rename = "hostpublickey")]
    pub host_public_key: PublicKey,
    pub id: ContractId,
    #[serde(rename = "lastrevision")]
    pub last_revision: FileContractRevision,
    #[serde(rename = "lastrevisiontxn")]
    pub last_revision_txn: Transaction,
    #[serde(rename = "merkleroots")]
    pub merkle_roots: MerkleRootSet,
    #[serde(rename = "secretkey")]
    pub secret_key: SecretKey,
    #[serde(rename = "startheight")]
    pub start_height: BlockHeight,
    #[serde(rename = "downloadspending")]
    pub download_spending: Currency,
    #[serde(rename = "storagespending")]
    pub storage_spending: Currency,
    #[serde(rename = "uploadspending")]
    pub upload_spending: Currency,
    #[serde(rename = "totalcost")]
    pub total_cost: Currency,
    #[serde(rename = "contractfee")]
    pub contract_fee: Currency,
    #[serde(rename = "txnfee")]
    pub txn_fee: Currency,
    #[serde(rename = "siafundfee")]
    pub siafund_fee: Currency,
}

impl V130Contract {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LegacyError> { load_json(path) }

    /// Height at which the host is no longer obliged to store the contract data.
    pub fn end_height(&self) -> BlockHeight { self.last_revision.new_window_start }

    /// Renter payout of the latest revision. Revisions with less than two valid outputs are
    /// considered to have no renter funds.
    pub fn renter_funds(&self) -> Currency {
        match self.last_revision.new_valid_proof_outputs.as_slice() {
            [renter, _, ..] => renter.value,
            _ => Currency::ZERO,
        }
    }

    fn header(&self) -> ContractHeader {
        ContractHeader {
            transaction: self.last_revision_txn.clone(),
            secret_key: self.secret_key,
            start_height: self.start_height,
            download_spending: self.download_spending,
            storage_spending: self.storage_spending,
            upload_spending: self.upload_spending,
            total_cost: self.total_cost,
            contract_fee: self.contract_fee,
            txn_fee: self.txn_fee,
            siafund_fee: self.siafund_fee,
        }
    }
}

/// Revision which a v1.3.0 renter negotiated but did not finish applying.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct V130CachedRevision {
    pub revision: FileContractRevision,
    #[serde(rename = "merkleroots")]
    pub merkle_roots: MerkleRootSet,
}

impl V130CachedRevision {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LegacyError> { load_json(path) }
}

fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, LegacyError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

impl<L: UpdateLog> ContractSet<L> {
    /// Stores a v1.3.0 contract as a regular contract file.
    ///
    /// A cached revision with a non-zero revision number is recorded as an unapplied intent with
    /// zero costs: an upload intent if it carries exactly one root more than the contract, a
    /// download intent otherwise. The intent is left pending for the caller to replay or discard.
    ///
    /// The cached revision is checked against the contract before the contract file is created, so
    /// an import refused for a bad cached revision leaves nothing on disk and can be retried.
    pub fn convert_v130_contract(
        &self,
        contract: V130Contract,
        cached: Option<V130CachedRevision>,
    ) -> Result<ContractMeta, SetError> {
        let header = contract.header();
        let cached = cached.filter(|cached| cached.revision.new_revision_number != 0);
        if let Some(cached) = &cached {
            check_cached(&header, &cached.revision)?;
        }
        let meta = self.insert_contract(header, &contract.merkle_roots)?;

        let Some(cached) = cached else {
            return Ok(meta);
        };

        let mut lease = self.acquire(meta.id).map_err(|err| match err {
            SetError::NotFound(id) => SetError::MissingContract(id),
            err => err,
        })?;
        let last_root = cached.merkle_roots.last().copied();
        let intent = match last_root {
            Some(root) if cached.merkle_roots.len() as u64 == lease.root_count() + 1 => {
                lease.record_upload_intent(cached.revision, root, Currency::ZERO, Currency::ZERO)?
            }
            _ => lease.record_download_intent(cached.revision, Currency::ZERO)?,
        };
        info!("imported v1.3.0 contract {} with cached revision as log transaction {}", meta.id, intent.txn());
        Ok(meta)
    }
}

/// Ensures the cached revision can be recorded as an intent of the contract with `header`.
fn check_cached(header: &ContractHeader, revision: &FileContractRevision) -> Result<(), ContractError> {
    header.validate()?;
    if revision.parent_id != header.id() {
        return Err(ContractError::ForeignRevision { expected: header.id(), found: revision.parent_id });
    }
    let mut revised = header.clone();
    revised.transaction.file_contract_revisions = TinyVec::from_checked(vec![revision.clone()]);
    revised.validate()?;
    Ok(())
}

#[derive(Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum LegacyError {
    #[from]
    #[display(inner)]
    Io(io::Error),

    /// invalid legacy contract document - {0}
    #[from]
    Json(serde_json::Error),
}
