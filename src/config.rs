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

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Location and behavior of a contract directory.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory holding the `*.contract` files.
    pub dir: PathBuf,

    /// Update log file; relative paths are resolved against [`Self::dir`].
    #[serde(default = "Config::default_log_file")]
    pub log_file: PathBuf,

    /// Whether unapplied log transactions are replayed right after loading.
    #[serde(default)]
    pub replay_on_load: bool,
}

impl Config {
    pub const DEFAULT_LOG_FILE: &'static str = "contracts.wal";

    fn default_log_file() -> PathBuf { PathBuf::from(Self::DEFAULT_LOG_FILE) }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Config { dir: dir.into(), log_file: Self::default_log_file(), replay_on_load: false }
    }

    pub fn log_path(&self) -> PathBuf { self.dir.join(&self.log_file) }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Ok(toml::from_str(&data)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let data = toml::to_string(self)?;
        fs::write(path, data)?;
        Ok(())
    }
}

#[derive(Debug, Display, Error, From)]
#[display(inner)]
pub enum ConfigError {
    #[from]
    Io(io::Error),

    #[from]
    TomlDecode(toml::de::Error),

    #[from]
    TomlEncode(toml::ser::Error),
}
