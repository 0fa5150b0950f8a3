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

use core::fmt::{self, Debug, Formatter};
use core::str::FromStr;

use amplify::hex::{self, FromHex, ToHex};
use amplify::{Bytes32, Bytes64};

use crate::LIB_NAME_RENTER_TYPES;

/// Size of a [`Hash256`] in bytes, which is also the size of a single Merkle root slot in a
/// contract file.
pub const HASH_SIZE: usize = 32;

/// 32-byte content hash.
///
/// Used for Merkle roots of the sectors stored on a host, for file Merkle roots of a revision and
/// for unlock hashes.
#[derive(Wrapper, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, Display, From)]
#[wrapper(Deref, BorrowSlice, Hex, Index, RangeOps)]
#[display(Self::to_hex)]
#[derive(StrictType, StrictEncode, StrictDecode)]
#[strict_type(lib = LIB_NAME_RENTER_TYPES)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct Hash256(
    #[from]
    #[from([u8; 32])]
    Bytes32,
);

impl FromStr for Hash256 {
    type Err = hex::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::from_hex(s) }
}

impl Hash256 {
    pub fn to_bytes(&self) -> [u8; HASH_SIZE] { self.0.to_byte_array() }
}

/// Identifier of a file contract, equal to the id of the transaction output which created it.
#[derive(Wrapper, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, Display, From)]
#[wrapper(Deref, BorrowSlice, Hex, Index, RangeOps)]
#[display(Self::to_hex)]
#[derive(StrictType, StrictEncode, StrictDecode)]
#[strict_type(lib = LIB_NAME_RENTER_TYPES)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct ContractId(
    #[from]
    #[from([u8; 32])]
    Bytes32,
);

impl FromStr for ContractId {
    type Err = hex::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::from_hex(s) }
}

impl ContractId {
    pub fn to_bytes(&self) -> [u8; 32] { self.0.to_byte_array() }
}

/// Ed25519 public key of a renter or a host.
#[derive(Wrapper, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, Display, From)]
#[wrapper(Deref, BorrowSlice, Hex, Index, RangeOps)]
#[display(Self::to_hex)]
#[derive(StrictType, StrictEncode, StrictDecode)]
#[strict_type(lib = LIB_NAME_RENTER_TYPES)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct PublicKey(
    #[from]
    #[from([u8; 32])]
    Bytes32,
);

impl FromStr for PublicKey {
    type Err = hex::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::from_hex(s) }
}

/// Ed25519 signing key used by the renter to sign contract revisions.
///
/// The key is never printed: neither [`Debug`] nor any display form reveal its bytes.
#[derive(Wrapper, Copy, Clone, Eq, PartialEq, Default, From)]
#[wrapper(Deref, BorrowSlice)]
#[derive(StrictType, StrictEncode, StrictDecode)]
#[strict_type(lib = LIB_NAME_RENTER_TYPES)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct SecretKey(
    #[from]
    #[from([u8; 64])]
    Bytes64,
);

impl Debug for SecretKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { f.write_str("SecretKey(..)") }
}
