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
extern crate amplify;

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use common::*;
use renterstore::{Currency, SetError};
use tempfile::tempdir;

#[test]
fn single_lease_per_contract() {
    let dir = tempdir().unwrap();
    let id = random_id();
    let set = open(dir.path());
    set.insert_contract(header(id), &[]).unwrap();

    let lease = set.try_acquire(id).unwrap().expect("contract is free");
    assert!(set.try_acquire(id).unwrap().is_none());
    set.return_contract(lease);
    assert!(set.try_acquire(id).unwrap().is_some());
}

#[test]
fn unknown_contract() {
    let dir = tempdir().unwrap();
    let set = open(dir.path());
    let id = random_id();
    assert!(matches!(set.acquire(id), Err(SetError::NotFound(missing)) if missing == id));
    assert!(matches!(set.try_acquire(id), Err(SetError::NotFound(_))));
    assert!(matches!(set.view(id), Err(SetError::NotFound(_))));
    assert!(!set.contains(id));
}

#[test]
fn view_while_leased() {
    let dir = tempdir().unwrap();
    let id = random_id();
    let set = open(dir.path());
    set.insert_contract(header(id), &[]).unwrap();

    let mut lease = set.acquire(id).unwrap();
    let revision = next_revision(&lease.header());
    let intent = lease
        .record_download_intent(revision.clone(), Currency::new(9))
        .unwrap();
    assert_eq!(set.view(id).unwrap().download_spending, Currency::ZERO);
    lease.commit(&intent, signed(revision)).unwrap();

    // The lease is still held, yet the committed state is already visible.
    assert_eq!(set.view(id).unwrap().download_spending, Currency::new(9));
    assert_eq!(set.view_all().len(), 1);
}

#[test]
fn blocked_acquire_resumes_on_return() {
    let dir = tempdir().unwrap();
    let id = random_id();
    let set = open(dir.path());
    set.insert_contract(header(id), &[]).unwrap();
    let acquired = AtomicBool::new(false);

    let lease = set.acquire(id).unwrap();
    thread::scope(|scope| {
        let waiter = scope.spawn(|| {
            let lease = set.acquire(id).unwrap();
            acquired.store(true, Ordering::SeqCst);
            lease.root_count()
        });
        thread::sleep(Duration::from_millis(100));
        assert!(!acquired.load(Ordering::SeqCst));
        drop(lease);
        assert_eq!(waiter.join().unwrap(), 0);
    });
    assert!(acquired.load(Ordering::SeqCst));
}

#[test]
fn concurrent_revisions_are_serialized() {
    const THREADS: usize = 4;
    const UPLOADS: usize = 5;

    let dir = tempdir().unwrap();
    let id = random_id();
    let set = open(dir.path());
    set.insert_contract(header(id), &[]).unwrap();

    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                for _ in 0..UPLOADS {
                    let mut lease = set.acquire(id).unwrap();
                    let revision = next_revision(&lease.header());
                    let intent = lease
                        .record_upload_intent(revision.clone(), random_root(), Currency::new(10), Currency::new(1))
                        .unwrap();
                    lease.commit(&intent, signed(revision)).unwrap();
                }
            });
        }
    });

    let total = (THREADS * UPLOADS) as u64;
    let lease = set.acquire(id).unwrap();
    assert_eq!(lease.root_count(), total);
    assert_eq!(lease.merkle_roots().unwrap().len() as u64, total);
    assert_eq!(lease.header().last_revision().new_revision_number, total + 1);
    assert_eq!(lease.metadata().storage_spending, Currency::new(10 * total as u128));
    assert_eq!(lease.metadata().upload_spending, Currency::new(total as u128));
    assert_eq!(set.log().pending_count(), 0);
}
