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

use core::iter::Sum;
use core::num::ParseIntError;
use core::ops::{Add, AddAssign};
use core::str::FromStr;

use crate::LIB_NAME_RENTER_TYPES;

/// Amount of coins, in base units.
///
/// Addition saturates at [`u128::MAX`]: spending accumulators built from currencies never wrap
/// around and never decrease.
#[derive(Wrapper, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, Display, From)]
#[wrapper(Deref)]
#[display(inner)]
#[derive(StrictType, StrictEncode, StrictDecode)]
#[strict_type(lib = LIB_NAME_RENTER_TYPES)]
pub struct Currency(#[from] u128);

impl Currency {
    pub const ZERO: Self = Currency(0);

    pub const fn new(amount: u128) -> Self { Currency(amount) }

    pub fn checked_add(self, other: Self) -> Option<Self> { self.0.checked_add(other.0).map(Currency) }

    pub fn checked_sub(self, other: Self) -> Option<Self> { self.0.checked_sub(other.0).map(Currency) }

    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

impl Add for Currency {
    type Output = Currency;
    fn add(self, rhs: Self) -> Self::Output { Currency(self.0.saturating_add(rhs.0)) }
}

impl AddAssign for Currency {
    fn add_assign(&mut self, rhs: Self) { *self = *self + rhs }
}

impl Sum for Currency {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self { iter.fold(Currency::ZERO, Add::add) }
}

/// invalid currency amount - {0}
#[derive(Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub struct CurrencyParseError(#[from] ParseIntError);

impl FromStr for Currency {
    type Err = CurrencyParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Ok(Currency(u128::from_str(s)?)) }
}

#[cfg(feature = "serde")]
mod _serde {
    use core::fmt::{self, Formatter};

    use serde::de::{self, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::*;

    // Amounts routinely exceed the 53-bit range of JSON numbers, thus they travel as decimal strings.
    impl Serialize for Currency {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for Currency {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(CurrencyVisitor)
        }
    }

    struct CurrencyVisitor;

    impl Visitor<'_> for CurrencyVisitor {
        type Value = Currency;

        fn expecting(&self, f: &mut Formatter) -> fmt::Result { f.write_str("a decimal currency amount") }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> { Currency::from_str(v).map_err(E::custom) }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> { Ok(Currency(v as u128)) }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<Self::Value, E> { Ok(Currency(v)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition_saturates() {
        let max = Currency::new(u128::MAX);
        assert_eq!(max + Currency::new(1), max);
        assert_eq!(max.checked_add(Currency::new(1)), None);
    }

    #[test]
    fn sum_and_assign() {
        let mut total = Currency::ZERO;
        total += Currency::new(5);
        total += Currency::new(7);
        assert_eq!(total, Currency::new(12));
        let sum: Currency = [1u128, 2, 3].into_iter().map(Currency::new).sum();
        assert_eq!(sum, Currency::new(6));
    }

    #[test]
    fn parse_and_display() {
        let amount = Currency::from_str("340282366920938463463374607431768211455").unwrap();
        assert_eq!(amount, Currency::new(u128::MAX));
        assert_eq!(amount.to_string(), "340282366920938463463374607431768211455");
        assert!(Currency::from_str("-1").is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_decimal_string() {
        let amount = Currency::new(1_000_000_000_000_000_000_000_000);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"1000000000000000000000000\"");
        assert_eq!(serde_json::from_str::<Currency>(&json).unwrap(), amount);
        assert_eq!(serde_json::from_str::<Currency>("42").unwrap(), Currency::new(42));
    }
}
