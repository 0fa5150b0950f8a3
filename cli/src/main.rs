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


#[macro_use]
extern crate log;

mod cmd;
mod dump;

use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;
use renterstore::Config;

use crate::cmd::Cmd;

/// Name of the configuration file looked up inside the contract directory.
pub const CONFIG_FILE: &str = "renterstore.toml";

#[derive(Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Increase verbosity; may be repeated up to four times
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Contract directory
    #[clap(short, long, global = true, default_value = ".")]
    pub dir: PathBuf,

    /// Configuration file; defaults to `renterstore.toml` inside the contract directory, if present
    #[clap(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Cmd,
}

impl Args {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    pub fn config_path(&self) -> PathBuf { self.config.clone().unwrap_or_else(|| self.dir.join(CONFIG_FILE)) }

    pub fn load_config(&self) -> anyhow::Result<Config> {
        let path = self.config_path();
        if self.config.is_none() && !path.exists() {
            return Ok(Config::with_dir(&self.dir));
        }
        debug!("reading configuration from '{}'", path.display());
        Ok(Config::load(path)?)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();
    args.command.exec(&args)
}
