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
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use renterstore::{Config, ContractDir, ContractHeader, ContractId, V130CachedRevision, V130Contract};

use crate::dump::dump_dir;
use crate::Args;

#[derive(Subcommand)]
pub enum Cmd {
    /// Create a contract directory with a configuration file and an empty update log
    Init {
        /// Replay unapplied log transactions each time the directory is opened
        #[clap(long)]
        replay_on_load: bool,
    },

    /// List all contracts of the directory
    List,

    /// Print out contract metadata
    Show {
        /// Contract id
        id: ContractId,
    },

    /// Print out the Merkle roots of a contract
    Roots {
        /// Contract id
        id: ContractId,
    },

    /// Apply all transactions left unapplied in the update log
    Replay,

    /// Drop unapplied transactions of a contract without applying them
    Discard {
        /// Contract id
        id: ContractId,
    },

    /// Import a contract saved by a v1.3.0 renter
    Import {
        /// JSON file with the contract
        contract: PathBuf,

        /// JSON file with a revision which was negotiated but not applied
        #[clap(long)]
        cached: Option<PathBuf>,
    },

    /// Export metadata of all contracts into YAML files
    Dump {
        /// Directory to put the YAML files to
        dst: PathBuf,

        /// Remove the destination directory first
        #[clap(short, long)]
        force: bool,
    },
}

impl Cmd {
    pub fn exec(&self, args: &Args) -> anyhow::Result<()> {
        match self {
            Cmd::Init { replay_on_load } => init(args, *replay_on_load)?,
            Cmd::List => list(&open(args)?),
            Cmd::Show { id } => show(&open(args)?, *id)?,
            Cmd::Roots { id } => roots(&open(args)?, *id)?,
            Cmd::Replay => replay(&open(args)?)?,
            Cmd::Discard { id } => discard(&open(args)?, *id)?,
            Cmd::Import { contract, cached } => import(&open(args)?, contract, cached.as_deref())?,
            Cmd::Dump { dst, force } => dump_dir(&open(args)?, dst, *force)?,
        }
        Ok(())
    }
}

fn open(args: &Args) -> anyhow::Result<ContractDir> {
    let config = args.load_config()?;
    let set = ContractDir::open(&config)
        .with_context(|| format!("unable to open contract directory '{}'", config.dir.display()))?;
    Ok(set)
}

fn init(args: &Args, replay_on_load: bool) -> anyhow::Result<()> {
    let path = args.config_path();
    if path.exists() {
        anyhow::bail!("configuration file '{}' already exists", path.display());
    }
    let config = Config { replay_on_load, ..Config::with_dir(&args.dir) };
    fs::create_dir_all(&config.dir)?;
    config.save(&path)?;
    let set = ContractDir::open(&config)?;
    println!("Initialized contract directory '{}' with {} contract(s)", config.dir.display(), set.len());
    Ok(())
}

fn list(set: &ContractDir) {
    let contracts = set.view_all();
    if contracts.is_empty() {
        println!("No contracts found in '{}'", set.dir().display());
        return;
    }
    println!("{:<64}  {:>10}  {:>10}  {:>32}", "Contract", "Start", "End", "Renter funds");
    for meta in contracts {
        println!("{:<64}  {:>10}  {:>10}  {:>32}", meta.id, meta.start_height, meta.end_height, meta.renter_funds);
    }
}

fn show(set: &ContractDir, id: ContractId) -> anyhow::Result<()> {
    let meta = set.view(id)?;
    let lease = set.acquire(id)?;
    println!("{}", serde_yaml::to_string(&meta)?);
    println!("Merkle roots: {}", lease.root_count());
    let pending = lease.unapplied_txns();
    if !pending.is_empty() {
        println!("Unapplied log transactions: {pending:?}");
        match lease.unapplied_header()?.as_ref().and_then(pending_revision) {
            Some(number) => println!("Pending revision number: {number}"),
            None => println!("Pending transactions carry no valid revision"),
        }
    }
    Ok(())
}

/// Revision number carried by a header recovered from the update log, which may be invalid.
fn pending_revision(header: &ContractHeader) -> Option<u64> {
    header.validate().ok()?;
    Some(header.last_revision().new_revision_number)
}

fn roots(set: &ContractDir, id: ContractId) -> anyhow::Result<()> {
    let lease = set.acquire(id)?;
    for (no, root) in lease.merkle_roots()?.into_iter().enumerate() {
        println!("{no:>8}  {root}");
    }
    Ok(())
}

fn replay(set: &ContractDir) -> anyhow::Result<()> {
    let count = set.apply_pending()?;
    println!("Replayed {count} log transaction(s)");
    Ok(())
}

fn discard(set: &ContractDir, id: ContractId) -> anyhow::Result<()> {
    let count = set.acquire(id)?.discard_unapplied()?;
    println!("Discarded {count} log transaction(s) of contract {id}");
    Ok(())
}

fn import(set: &ContractDir, contract: &Path, cached: Option<&Path>) -> anyhow::Result<()> {
    let contract = V130Contract::load(contract)
        .with_context(|| format!("unable to read v1.3.0 contract from '{}'", contract.display()))?;
    let cached = cached.map(V130CachedRevision::load).transpose()?;
    let has_cached = cached.is_some();
    let meta = set.convert_v130_contract(contract, cached)?;
    info!("imported contract {} (cached revision: {has_cached})", meta.id);
    println!("Imported contract {}", meta.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_revision_of_invalid_header() {
        assert_eq!(pending_revision(&ContractHeader::default()), None);
    }
}
