// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! # Proof scheduler tests
//!
//! Window selection, proof construction against the committed sector
//! roots, redundant-resubmission suppression, transient broadcast
//! failures, and the empty-sector-roots failure path.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hostd_models::merkle::merkle_root;
use hostd_obligation_exports::test_exports::{MemorySectorStore, ObligationGenerator};
use hostd_obligation_exports::{FailureCause, ObligationConfig, ObligationResolution, ObligationStatus};

use super::tools::{
    fast_scheduler_config, obligation_test, send_and_wait, store_sectors,
    wait_for_proof_submission, wait_until, CapturingBroadcaster, ChainSimulator,
};

#[test]
fn test_proof_is_built_against_the_sector_roots() {
    let sector_store = Arc::new(MemorySectorStore::new());
    let roots = store_sectors(sector_store.as_ref(), 7);
    let broadcaster = Arc::new(CapturingBroadcaster::new());
    let config = ObligationConfig {
        proof_retry_period: 1_000,
        ..fast_scheduler_config()
    };
    let expected_root = merkle_root(&roots);
    obligation_test(config, broadcaster.clone(), sector_store, move |boilerplate| {
        let mut simulator = ChainSimulator::new();
        let generator = ObligationGenerator::default()
            .expiration(100)
            .sector_roots(roots.clone());
        let terms = generator.terms();
        let origin_tx = terms.origin_transaction;
        let id = boilerplate.controller.create_obligation(terms).unwrap();

        let notification = simulator.apply(vec![origin_tx]);
        send_and_wait(boilerplate, &simulator, notification);

        let proof_tx = wait_for_proof_submission(boilerplate, &id);
        let sent = broadcaster.sent.lock();
        let proof = sent.first().expect("one proof should have been sent");
        assert_eq!(proof.obligation_id, id);
        assert_eq!(proof.revision_number, 0);
        assert_eq!(proof.id(), proof_tx);
        // the submitted proof opens the commitment the contract holds
        assert!(proof.verify(&expected_root));
        assert!((proof.sector_index as usize) < roots.len());
    });
}

#[test]
fn test_no_submission_outside_the_window() {
    let sector_store = Arc::new(MemorySectorStore::new());
    let roots = store_sectors(sector_store.as_ref(), 2);
    let broadcaster = Arc::new(CapturingBroadcaster::new());
    let config = ObligationConfig {
        // window opens 10 blocks before the expiration at 100
        proof_window: 10,
        proof_retry_period: 1_000,
        ..fast_scheduler_config()
    };
    obligation_test(config, broadcaster.clone(), sector_store, move |boilerplate| {
        let mut simulator = ChainSimulator::new();
        let generator = ObligationGenerator::default()
            .expiration(100)
            .sector_roots(roots.clone());
        let terms = generator.terms();
        let origin_tx = terms.origin_transaction;
        let id = boilerplate.controller.create_obligation(terms).unwrap();

        let notification = simulator.apply(vec![origin_tx]);
        send_and_wait(boilerplate, &simulator, notification);

        // height 1, window [90, 100): several scheduler passes must not
        // submit anything
        thread::sleep(Duration::from_millis(300));
        assert_eq!(broadcaster.sent_count(), 0);

        // entering the window triggers the submission
        let notification = simulator.advance_to(90);
        send_and_wait(boilerplate, &simulator, notification);
        wait_for_proof_submission(boilerplate, &id);
        assert_eq!(broadcaster.sent_count(), 1);
    });
}

#[test]
fn test_no_redundant_resubmission_before_confirmation() {
    let sector_store = Arc::new(MemorySectorStore::new());
    let roots = store_sectors(sector_store.as_ref(), 3);
    let broadcaster = Arc::new(CapturingBroadcaster::new());
    let config = ObligationConfig {
        proof_retry_period: 1_000,
        ..fast_scheduler_config()
    };
    obligation_test(config, broadcaster.clone(), sector_store, move |boilerplate| {
        let mut simulator = ChainSimulator::new();
        let generator = ObligationGenerator::default()
            .expiration(100)
            .sector_roots(roots.clone());
        let terms = generator.terms();
        let origin_tx = terms.origin_transaction;
        let id = boilerplate.controller.create_obligation(terms).unwrap();

        let notification = simulator.apply(vec![origin_tx]);
        send_and_wait(boilerplate, &simulator, notification);
        wait_for_proof_submission(boilerplate, &id);

        // many scheduler periods later, the unconfirmed proof was still
        // not resubmitted
        thread::sleep(Duration::from_millis(300));
        assert_eq!(broadcaster.sent_count(), 1);
    });
}

#[test]
fn test_transient_broadcast_failure_is_retried() {
    let sector_store = Arc::new(MemorySectorStore::new());
    let roots = store_sectors(sector_store.as_ref(), 3);
    // the first two submissions fail, the third lands
    let broadcaster = Arc::new(CapturingBroadcaster::failing(2));
    let config = ObligationConfig {
        proof_retry_period: 1_000,
        ..fast_scheduler_config()
    };
    obligation_test(config, broadcaster.clone(), sector_store, move |boilerplate| {
        let mut simulator = ChainSimulator::new();
        let generator = ObligationGenerator::default()
            .expiration(100)
            .sector_roots(roots.clone());
        let terms = generator.terms();
        let origin_tx = terms.origin_transaction;
        let id = boilerplate.controller.create_obligation(terms).unwrap();

        let notification = simulator.apply(vec![origin_tx]);
        send_and_wait(boilerplate, &simulator, notification);

        // a failed broadcast leaves the obligation eligible on the next
        // pass; the proof eventually goes out
        wait_for_proof_submission(boilerplate, &id);
        assert_eq!(broadcaster.sent_count(), 1);
    });
}

#[test]
fn test_empty_sector_roots_fails_without_a_proof() {
    let broadcaster = Arc::new(CapturingBroadcaster::new());
    obligation_test(
        fast_scheduler_config(),
        broadcaster.clone(),
        Arc::new(MemorySectorStore::new()),
        move |boilerplate| {
            let mut simulator = ChainSimulator::new();
            // no data was ever stored under this obligation
            let generator = ObligationGenerator::default().expiration(100);
            let terms = generator.terms();
            let origin_tx = terms.origin_transaction;
            let id = boilerplate.controller.create_obligation(terms).unwrap();

            let notification = simulator.apply(vec![origin_tx]);
            send_and_wait(boilerplate, &simulator, notification);

            wait_until(
                || {
                    boilerplate
                        .controller
                        .get_obligation(&id)
                        .map(|obligation| obligation.status() == ObligationStatus::Failed)
                        .unwrap_or(false)
                },
                "the empty obligation to be failed",
            );
            let obligation = boilerplate.controller.get_obligation(&id).unwrap();
            assert_eq!(
                obligation.resolution,
                Some(ObligationResolution::Failed {
                    cause: FailureCause::EmptySectorRoots,
                })
            );
            assert_eq!(broadcaster.sent_count(), 0);
        },
    );
}

#[test]
fn test_no_submission_before_origin_confirmation() {
    let sector_store = Arc::new(MemorySectorStore::new());
    let roots = store_sectors(sector_store.as_ref(), 2);
    let broadcaster = Arc::new(CapturingBroadcaster::new());
    obligation_test(
        fast_scheduler_config(),
        broadcaster.clone(),
        sector_store,
        move |boilerplate| {
            let mut simulator = ChainSimulator::new();
            let generator = ObligationGenerator::default()
                .expiration(100)
                .sector_roots(roots.clone());
            let terms = generator.terms();
            boilerplate.controller.create_obligation(terms).unwrap();

            // blocks pass but the contract never lands on chain
            let notification = simulator.advance_to(5);
            send_and_wait(boilerplate, &simulator, notification);

            thread::sleep(Duration::from_millis(300));
            assert_eq!(broadcaster.sent_count(), 0);
        },
    );
}
