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

use rentertypes::{BlockHeight, ContractId, Currency, FileContractRevision, PublicKey, SecretKey, Transaction};
use strict_encoding::{DecodeError, SerializeError, StreamReader, StrictDecode, StrictDeserialize, StrictSerialize};

use crate::LIB_NAME_RENTERSTORE;

/// Size of the header slot at the beginning of each contract file. Merkle roots start right after
/// it.
pub const CONTRACT_HEADER_SIZE: usize = 4096;

/// Everything the renter knows about a contract except its Merkle roots.
///
/// Spending counters only grow; total cost, fees and start height are fixed at creation.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
#[derive(StrictType, StrictEncode, StrictDecode)]
#[strict_type(lib = LIB_NAME_RENTERSTORE)]
pub struct ContractHeader {
    /// Latest revision transaction; may lack the host signature if the revision is not yet
    /// committed.
    pub transaction: Transaction,
    pub secret_key: SecretKey,
    pub start_height: BlockHeight,
    pub download_spending: Currency,
    pub storage_spending: Currency,
    pub upload_spending: Currency,
    pub total_cost: Currency,
    pub contract_fee: Currency,
    pub txn_fee: Currency,
    pub siafund_fee: Currency,
}

impl StrictSerialize for ContractHeader {}
impl StrictDeserialize for ContractHeader {}

impl ContractHeader {
    pub fn validate(&self) -> Result<(), InvalidContract> {
        let revision = self
            .transaction
            .first_revision()
            .ok_or(InvalidContract::NoRevision)?;
        if revision.new_valid_proof_outputs.is_empty() {
            return Err(InvalidContract::NoValidOutputs);
        }
        let keys = revision.unlock_conditions.public_keys.len();
        if keys != 2 {
            return Err(InvalidContract::UnlockKeyCount(keys));
        }
        Ok(())
    }

    /// # Panics
    ///
    /// If the header was not validated and has no revision.
    pub fn last_revision(&self) -> &FileContractRevision {
        self.transaction
            .first_revision()
            .expect("contract header must be validated before use")
    }

    pub fn id(&self) -> ContractId { self.last_revision().parent_id }

    /// # Panics
    ///
    /// If the header was not validated.
    pub fn host_public_key(&self) -> PublicKey { self.last_revision().unlock_conditions.public_keys[1] }

    /// # Panics
    ///
    /// If the header was not validated.
    pub fn renter_funds(&self) -> Currency { self.last_revision().new_valid_proof_outputs[0].value }

    pub fn end_height(&self) -> BlockHeight { self.last_revision().new_window_start }

    /// Encodes the header into a full zero-padded header slot.
    pub fn to_slot(&self) -> Result<Vec<u8>, SerializeError> {
        let data = self.to_strict_serialized::<CONTRACT_HEADER_SIZE>()?;
        let mut slot = data.release();
        slot.resize(CONTRACT_HEADER_SIZE, 0);
        Ok(slot)
    }

    /// Decodes the header from a header slot, ignoring the padding.
    pub fn from_slot(slot: &[u8]) -> Result<Self, DecodeError> {
        Self::strict_read(StreamReader::new::<CONTRACT_HEADER_SIZE>(slot))
    }
}

/// Consistent snapshot of contract metadata, taken under the header lock.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMeta {
    pub id: ContractId,
    pub transaction: Transaction,
    pub host_public_key: PublicKey,
    pub start_height: BlockHeight,
    pub end_height: BlockHeight,
    pub renter_funds: Currency,
    pub download_spending: Currency,
    pub storage_spending: Currency,
    pub upload_spending: Currency,
    pub total_cost: Currency,
    pub contract_fee: Currency,
    pub txn_fee: Currency,
    pub siafund_fee: Currency,
}

impl From<&ContractHeader> for ContractMeta {
    fn from(header: &ContractHeader) -> Self {
        ContractMeta {
            id: header.id(),
            transaction: header.transaction.clone(),
            host_public_key: header.host_public_key(),
            start_height: header.start_height,
            end_height: header.end_height(),
            renter_funds: header.renter_funds(),
            download_spending: header.download_spending,
            storage_spending: header.storage_spending,
            upload_spending: header.upload_spending,
            total_cost: header.total_cost,
            contract_fee: header.contract_fee,
            txn_fee: header.txn_fee,
            siafund_fee: header.siafund_fee,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum InvalidContract {
    /// contract transaction has no file contract revision.
    NoRevision,

    /// contract revision has no valid proof outputs.
    NoValidOutputs,

    /// contract revision must have exactly two unlock keys, while it has {0}.
    UnlockKeyCount(usize),
}

#[cfg(test)]
mod tests {
    use amplify::confinement::Confined;
    use rentertypes::{Hash256, SiacoinOutput, UnlockConditions};

    use super::*;

    fn revision() -> FileContractRevision {
        FileContractRevision {
            parent_id: ContractId::from([9u8; 32]),
            unlock_conditions: UnlockConditions {
                timelock: 0,
                public_keys: Confined::from_checked(vec![PublicKey::from([1u8; 32]), PublicKey::from([2u8; 32])]),
                signatures_required: 2,
            },
            new_revision_number: 1,
            new_window_start: 1000,
            new_window_end: 1144,
            new_valid_proof_outputs: Confined::from_checked(vec![
                SiacoinOutput { value: Currency::new(500), unlock_hash: Hash256::default() },
                SiacoinOutput { value: Currency::new(10), unlock_hash: Hash256::default() },
            ]),
            ..default!()
        }
    }

    fn with_revision(revision: FileContractRevision) -> ContractHeader {
        ContractHeader {
            transaction: Transaction { file_contract_revisions: Confined::from_checked(vec![revision]), ..default!() },
            start_height: 900,
            total_cost: Currency::new(600),
            ..default!()
        }
    }

    fn header() -> ContractHeader { with_revision(revision()) }

    #[test]
    fn derived_fields() {
        let header = header();
        header.validate().unwrap();
        assert_eq!(header.id(), ContractId::from([9u8; 32]));
        assert_eq!(header.host_public_key(), PublicKey::from([2u8; 32]));
        assert_eq!(header.renter_funds(), Currency::new(500));
        assert_eq!(header.end_height(), 1000);

        let meta = ContractMeta::from(&header);
        assert_eq!(meta.id, header.id());
        assert_eq!(meta.start_height, 900);
        assert_eq!(meta.total_cost, Currency::new(600));
    }

    #[test]
    fn validation() {
        assert_eq!(ContractHeader::default().validate(), Err(InvalidContract::NoRevision));

        let no_outputs = with_revision(FileContractRevision { new_valid_proof_outputs: none!(), ..revision() });
        assert_eq!(no_outputs.validate(), Err(InvalidContract::NoValidOutputs));

        let mut one_key = revision();
        one_key.unlock_conditions.public_keys = Confined::from_checked(vec![PublicKey::from([1u8; 32])]);
        assert_eq!(with_revision(one_key).validate(), Err(InvalidContract::UnlockKeyCount(1)));
    }

    #[test]
    fn slot_is_padded_and_decodable() {
        let header = header();
        let slot = header.to_slot().unwrap();
        assert_eq!(slot.len(), CONTRACT_HEADER_SIZE);
        assert_eq!(ContractHeader::from_slot(&slot).unwrap(), header);
    }

    #[test]
    fn zeroed_slot_fails_validation() {
        let decoded = ContractHeader::from_slot(&[0u8; CONTRACT_HEADER_SIZE]).unwrap();
        assert_eq!(decoded.validate(), Err(InvalidContract::NoRevision));
    }

    #[test]
    fn oversized_header_rejected() {
        let mut header = header();
        let huge = vec![0xFFu8; CONTRACT_HEADER_SIZE];
        header.transaction.signatures = Confined::from_checked(vec![rentertypes::TransactionSignature {
            signature: Confined::from_checked(huge),
            ..default!()
        }]);
        assert!(header.to_slot().is_err());
    }
}
