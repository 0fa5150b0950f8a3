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

use amplify::confinement::{SmallBlob, TinyVec};

use crate::{BlockHeight, ContractId, Currency, Hash256, PublicKey, LIB_NAME_RENTER_TYPES};

/// Conditions under which an output or a contract may be spent or revised.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
#[derive(StrictType, StrictEncode, StrictDecode)]
#[strict_type(lib = LIB_NAME_RENTER_TYPES)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "camelCase"))]
pub struct UnlockConditions {
    pub timelock: BlockHeight,
    /// For file contracts the first key belongs to the renter and the second one to the host.
    pub public_keys: TinyVec<PublicKey>,
    pub signatures_required: u64,
}

/// Payout created by a storage proof (or by its absence) when the contract expires.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
#[derive(StrictType, StrictEncode, StrictDecode)]
#[strict_type(lib = LIB_NAME_RENTER_TYPES)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "camelCase"))]
pub struct SiacoinOutput {
    pub value: Currency,
    pub unlock_hash: Hash256,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
#[derive(StrictType, StrictEncode, StrictDecode)]
#[strict_type(lib = LIB_NAME_RENTER_TYPES)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "camelCase"))]
pub struct FileContractRevision {
    pub parent_id: ContractId,
    pub unlock_conditions: UnlockConditions,
    pub new_revision_number: u64,
    pub new_file_size: u64,
    pub new_file_merkle_root: Hash256,
    pub new_window_start: BlockHeight,
    pub new_window_end: BlockHeight,
    /// Outputs paid on a successful storage proof. Index 0 is the renter's payout.
    pub new_valid_proof_outputs: TinyVec<SiacoinOutput>,
    pub new_missed_proof_outputs: TinyVec<SiacoinOutput>,
    pub new_unlock_hash: Hash256,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
#[derive(StrictType, StrictEncode, StrictDecode)]
#[strict_type(lib = LIB_NAME_RENTER_TYPES)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "camelCase"))]
pub struct TransactionSignature {
    pub parent_id: Hash256,
    pub public_key_index: u64,
    pub signature: SmallBlob,
}

/// Signed transaction carrying the latest contract revision.
///
/// The store keeps it opaque: only the first revision and its outputs are ever inspected.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
#[derive(StrictType, StrictEncode, StrictDecode)]
#[strict_type(lib = LIB_NAME_RENTER_TYPES)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "camelCase"))]
pub struct Transaction {
    pub file_contract_revisions: TinyVec<FileContractRevision>,
    pub signatures: TinyVec<TransactionSignature>,
}

impl Transaction {
    pub fn first_revision(&self) -> Option<&FileContractRevision> { self.file_contract_revisions.first() }
}

#[cfg(test)]
mod tests {
    use amplify::confinement::Confined;
    use strict_encoding::{StrictDeserialize, StrictSerialize};

    use super::*;

    impl StrictSerialize for Transaction {}
    impl StrictDeserialize for Transaction {}

    fn sample() -> Transaction {
        let revision = FileContractRevision {
            parent_id: ContractId::from([1u8; 32]),
            unlock_conditions: UnlockConditions {
                timelock: 0,
                public_keys: Confined::from_checked(vec![PublicKey::from([2u8; 32]), PublicKey::from([3u8; 32])]),
                signatures_required: 2,
            },
            new_revision_number: 7,
            new_file_size: 1 << 22,
            new_file_merkle_root: Hash256::from([4u8; 32]),
            new_window_start: 100,
            new_window_end: 244,
            new_valid_proof_outputs: Confined::from_checked(vec![SiacoinOutput {
                value: Currency::new(1000),
                unlock_hash: Hash256::from([5u8; 32]),
            }]),
            new_missed_proof_outputs: none!(),
            new_unlock_hash: Hash256::default(),
        };
        Transaction { file_contract_revisions: Confined::from_checked(vec![revision]), signatures: none!() }
    }

    #[test]
    fn strict_encoding_is_lossless() {
        let txn = sample();
        let data = txn.to_strict_serialized::<{ u16::MAX as usize }>().unwrap();
        let decoded = Transaction::from_strict_serialized::<{ u16::MAX as usize }>(data).unwrap();
        assert_eq!(decoded, txn);
        assert_eq!(decoded.first_revision().unwrap().new_window_end, 244);
    }

    #[test]
    fn empty_transaction_has_no_revision() {
        assert!(Transaction::default().first_revision().is_none());
    }
}
