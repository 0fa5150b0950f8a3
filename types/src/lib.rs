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

//! Consensus-side data types which the renter contract store persists but does not interpret:
//! identifiers, keys, currency amounts and revision transactions.

#![deny(
    unsafe_code,
    dead_code,
    unused_variables,
    unused_mut,
    unused_imports,
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case
)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

#[macro_use]
extern crate amplify;
#[macro_use]
extern crate strict_encoding;

#[cfg(feature = "serde")]
#[macro_use]
extern crate serde;

mod ids;
mod currency;
mod transaction;
mod roots;

pub use currency::{Currency, CurrencyParseError};
pub use ids::{ContractId, Hash256, PublicKey, SecretKey, HASH_SIZE};
pub use roots::MerkleRootSet;
pub use transaction::{FileContractRevision, SiacoinOutput, Transaction, TransactionSignature, UnlockConditions};

pub const LIB_NAME_RENTER_TYPES: &str = "RenterTypes";

/// Height of a block in the consensus chain.
pub type BlockHeight = u64;
