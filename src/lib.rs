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

//! Crash-safe persistence of renter-side storage contracts.
//!
//! Each contract lives in its own file: a fixed-size header slot holding the latest signed revision
//! and spending counters, followed by the append-only list of sector Merkle roots. Every mutation
//! goes through a write-ahead [`UpdateLog`] in two phases (intent, then commit), so a crash at any
//! point leaves either the old or the new contract state on disk, never a mix of both. Contracts
//! are kept in a [`ContractSet`] registry, which hands out exclusive [`Lease`]s.

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
#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

mod header;
pub mod wal;
mod contract;
mod set;
mod legacy;
mod config;

pub use config::{Config, ConfigError};
pub use contract::{
    ContractError, ContractUpdate, PersistentContract, RevisionIntent, RevisionKind, UpdateSetHeader, UpdateSetRoot,
    CONTRACT_EXTENSION, UPDATE_NAME_SET_HEADER, UPDATE_NAME_SET_ROOT,
};
pub use header::{ContractHeader, ContractMeta, InvalidContract, CONTRACT_HEADER_SIZE};
pub use legacy::{LegacyError, V130CachedRevision, V130Contract};
pub use rentertypes::*;
pub use set::{ContractDir, ContractSet, Lease, SetError};
pub use wal::file::{FileLog, FileTxn};
pub use wal::{LogError, LogTxn, Update, UpdateLog};

pub const LIB_NAME_RENTERSTORE: &str = "RenterStore";
