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

use crate::{Hash256, HASH_SIZE};

/// Ordered list of sector Merkle roots.
///
/// Serialized form is the concatenation of all roots, encoded as base64 when the format is
/// human-readable. Deserialization additionally accepts the legacy form, which is an array of
/// hex-encoded hashes, as well as `null` for an empty set.
#[derive(Wrapper, WrapperMut, Clone, Eq, PartialEq, Hash, Debug, Default, From)]
#[wrapper(Deref)]
#[wrapper_mut(DerefMut)]
pub struct MerkleRootSet(#[from] Vec<Hash256>);

impl FromIterator<Hash256> for MerkleRootSet {
    fn from_iter<T: IntoIterator<Item = Hash256>>(iter: T) -> Self { Self(iter.into_iter().collect()) }
}

impl IntoIterator for MerkleRootSet {
    type Item = Hash256;
    type IntoIter = std::vec::IntoIter<Hash256>;
    fn into_iter(self) -> Self::IntoIter { self.0.into_iter() }
}

impl MerkleRootSet {
    /// Concatenates all roots into a single byte string.
    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(self.0.len() * HASH_SIZE);
        for root in &self.0 {
            blob.extend_from_slice(&root.to_bytes());
        }
        blob
    }

    /// Splits a concatenation of roots; fails if the length is not a multiple of the hash size.
    pub fn from_blob(blob: &[u8]) -> Option<Self> {
        if blob.len() % HASH_SIZE != 0 {
            return None;
        }
        let roots = blob
            .chunks_exact(HASH_SIZE)
            .map(|chunk| {
                let mut buf = [0u8; HASH_SIZE];
                buf.copy_from_slice(chunk);
                Hash256::from(buf)
            })
            .collect();
        Some(Self(roots))
    }
}

#[cfg(feature = "serde")]
mod _serde {
    use core::fmt::{self, Formatter};

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::de::{self, SeqAccess, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::*;

    impl Serialize for MerkleRootSet {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let blob = self.to_blob();
            if serializer.is_human_readable() {
                serializer.serialize_str(&STANDARD.encode(blob))
            } else {
                serializer.serialize_bytes(&blob)
            }
        }
    }

    impl<'de> Deserialize<'de> for MerkleRootSet {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            if deserializer.is_human_readable() {
                deserializer.deserialize_any(RootSetVisitor)
            } else {
                deserializer.deserialize_byte_buf(RootSetVisitor)
            }
        }
    }

    struct RootSetVisitor;

    impl RootSetVisitor {
        fn from_blob<E: de::Error>(blob: &[u8]) -> Result<MerkleRootSet, E> {
            MerkleRootSet::from_blob(blob).ok_or_else(|| {
                E::custom(format!("merkle root blob length {} is not a multiple of {HASH_SIZE}", blob.len()))
            })
        }
    }

    impl<'de> Visitor<'de> for RootSetVisitor {
        type Value = MerkleRootSet;

        fn expecting(&self, f: &mut Formatter) -> fmt::Result {
            f.write_str("base64-encoded merkle roots or an array of hex-encoded hashes")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            let blob = STANDARD.decode(v).map_err(E::custom)?;
            Self::from_blob(&blob)
        }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> { Self::from_blob(v) }

        fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> { Self::from_blob(&v) }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut roots = Vec::with_capacity(seq.size_hint().unwrap_or_default());
            while let Some(root) = seq.next_element::<Hash256>()? {
                roots.push(root);
            }
            Ok(MerkleRootSet(roots))
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> { Ok(MerkleRootSet::default()) }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> { Ok(MerkleRootSet::default()) }
    }
}
