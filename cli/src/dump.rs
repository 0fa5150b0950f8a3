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


use std::fs::{self, File};
use std::path::Path;

use anyhow::Context;
use renterstore::{ContractDir, ContractMeta};
use serde::Serialize;

/// Contract state which is not part of the metadata.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractFile {
    pub path: String,
    pub roots: Vec<String>,
    pub unapplied_txns: Vec<u64>,
    pub pending: Option<ContractMeta>,
}

pub fn dump_dir(set: &ContractDir, dst: impl AsRef<Path>, force: bool) -> anyhow::Result<()> {
    let dst = dst.as_ref();

    if force {
        let _ = fs::remove_dir_all(dst);
    }
    fs::create_dir_all(dst)?;

    println!("Reading contracts from '{}' ... {} found", set.dir().display(), set.len());

    print!("Processing contracts ... none found");
    for (no, id) in set.ids().into_iter().enumerate() {
        let lease = set.acquire(id)?;

        let out = File::create_new(dst.join(format!("{:04}-meta-{id}.yaml", no + 1)))
            .context("can't create dump files; try to use the `--force` flag")?;
        serde_yaml::to_writer(&out, &lease.metadata())?;

        let pending = lease
            .unapplied_header()?
            .filter(|header| header.validate().is_ok())
            .map(|header| ContractMeta::from(&header));
        let file = ContractFile {
            path: lease.path().display().to_string(),
            roots: lease
                .merkle_roots()?
                .iter()
                .map(ToString::to_string)
                .collect(),
            unapplied_txns: lease.unapplied_txns(),
            pending,
        };
        let out = File::create_new(dst.join(format!("{:04}-file-{id}.yaml", no + 1)))?;
        serde_yaml::to_writer(&out, &file)?;
        print!("\rProcessing contracts ... {} processed", no + 1);
    }
    println!();

    print!("Processing update log ... ");
    let log = set.log();
    let out = File::create_new(dst.join("log.yaml"))?;
    serde_yaml::to_writer(&out, &log.pending_txns())?;
    println!("{} pending transaction(s) in '{}'", log.pending_count(), log.path().display());

    Ok(())
}
