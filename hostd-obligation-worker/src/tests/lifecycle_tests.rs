// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! # Lifecycle controller unit tests
//!
//! Creation and revision of obligations through the public mutation API:
//! duplicate identifiers, collateral accounting against the configured
//! budget, and the revision validation rules (strictly increasing
//! numbers, non-decreasing payout and collateral, signature checks,
//! terminal obligations frozen).

use std::str::FromStr;
use std::sync::Arc;

use hostd_models::currency::Currency;
use hostd_obligation_exports::test_exports::{MemorySectorStore, ObligationGenerator};
use hostd_obligation_exports::{ObligationConfig, ObligationError, ObligationStatus};

use super::tools::{no_scheduler_config, obligation_test, CapturingBroadcaster};

#[test]
fn test_create_and_get() {
    obligation_test(
        no_scheduler_config(),
        Arc::new(CapturingBroadcaster::new()),
        Arc::new(MemorySectorStore::new()),
        |boilerplate| {
            let generator = ObligationGenerator::default().expiration(100);
            let terms = generator.terms();
            let expected_id = terms.derive_id();

            let id = boilerplate
                .controller
                .create_obligation(terms)
                .expect("creation should succeed");
            assert_eq!(id, expected_id);

            let obligation = boilerplate
                .controller
                .get_obligation(&id)
                .expect("obligation should be readable");
            assert_eq!(obligation.status(), ObligationStatus::Unresolved);
            assert_eq!(obligation.latest_revision().revision_number, 0);
            assert_eq!(
                boilerplate.controller.obligation_statuses().get(&id),
                Some(&ObligationStatus::Unresolved)
            );
        },
    );
}

#[test]
fn test_create_duplicate_identifier_is_rejected() {
    obligation_test(
        no_scheduler_config(),
        Arc::new(CapturingBroadcaster::new()),
        Arc::new(MemorySectorStore::new()),
        |boilerplate| {
            let terms = ObligationGenerator::default().terms();
            boilerplate
                .controller
                .create_obligation(terms.clone())
                .expect("first creation should succeed");
            let res = boilerplate.controller.create_obligation(terms);
            assert!(matches!(
                res,
                Err(ObligationError::DuplicateIdentifier(_))
            ));
        },
    );
}

#[test]
fn test_create_insufficient_collateral() {
    let config = ObligationConfig {
        collateral_budget: Currency::from_raw(1_000),
        ..no_scheduler_config()
    };
    obligation_test(
        config,
        Arc::new(CapturingBroadcaster::new()),
        Arc::new(MemorySectorStore::new()),
        |boilerplate| {
            let generator =
                ObligationGenerator::default().collateral(Currency::from_raw(2_000));
            let res = boilerplate.controller.create_obligation(generator.terms());
            assert!(matches!(
                res,
                Err(ObligationError::InsufficientCollateral(_))
            ));

            // a creation that fits the budget still works afterwards
            let generator =
                ObligationGenerator::default().collateral(Currency::from_raw(900));
            boilerplate
                .controller
                .create_obligation(generator.terms())
                .expect("creation within the budget should succeed");
        },
    );
}

#[test]
fn test_create_rejects_inverted_heights() {
    obligation_test(
        no_scheduler_config(),
        Arc::new(CapturingBroadcaster::new()),
        Arc::new(MemorySectorStore::new()),
        |boilerplate| {
            let generator = ObligationGenerator::default().negotiation(100).expiration(50);
            let res = boilerplate.controller.create_obligation(generator.terms());
            assert!(matches!(res, Err(ObligationError::ValidationError(_))));
        },
    );
}

#[test]
fn test_create_rejects_tampered_signature() {
    obligation_test(
        no_scheduler_config(),
        Arc::new(CapturingBroadcaster::new()),
        Arc::new(MemorySectorStore::new()),
        |boilerplate| {
            let generator = ObligationGenerator::default();
            let mut terms = generator.terms();
            // the renter signed different terms
            terms.payout = terms.payout.saturating_add(Currency::from_raw(1));
            let res = boilerplate.controller.create_obligation(terms);
            assert!(matches!(res, Err(ObligationError::ValidationError(_))));
        },
    );
}

/// The revision scenario: payout 10 then 20 succeeds, a later "revision"
/// back to 15 is rejected and the stored revision stays at payout 20.
#[test]
fn test_revision_payout_monotonicity() {
    obligation_test(
        no_scheduler_config(),
        Arc::new(CapturingBroadcaster::new()),
        Arc::new(MemorySectorStore::new()),
        |boilerplate| {
            let generator = ObligationGenerator::default()
                .expiration(100)
                .payout(Currency::from_str("10").unwrap());
            let id = boilerplate
                .controller
                .create_obligation(generator.terms())
                .expect("creation should succeed");

            let revision = generator.signed_revision(
                &id,
                1,
                Currency::from_str("20").unwrap(),
                Currency::from_raw(5_000_000_000),
                vec![],
            );
            boilerplate
                .controller
                .revise_obligation(&id, revision)
                .expect("a payout increase should be accepted");

            let revision = generator.signed_revision(
                &id,
                2,
                Currency::from_str("15").unwrap(),
                Currency::from_raw(5_000_000_000),
                vec![],
            );
            let res = boilerplate.controller.revise_obligation(&id, revision);
            assert!(matches!(res, Err(ObligationError::ValidationError(_))));

            let obligation = boilerplate.controller.get_obligation(&id).unwrap();
            assert_eq!(
                obligation.latest_revision().payout,
                Currency::from_str("20").unwrap()
            );
            assert_eq!(obligation.latest_revision().revision_number, 1);
            assert_eq!(obligation.revisions.len(), 2);
        },
    );
}

#[test]
fn test_revision_rejects_non_increasing_number() {
    obligation_test(
        no_scheduler_config(),
        Arc::new(CapturingBroadcaster::new()),
        Arc::new(MemorySectorStore::new()),
        |boilerplate| {
            let generator = ObligationGenerator::default();
            let id = boilerplate
                .controller
                .create_obligation(generator.terms())
                .unwrap();

            // same number as the formation revision
            let revision = generator.signed_revision(
                &id,
                0,
                Currency::from_raw(20_000_000_000),
                Currency::from_raw(5_000_000_000),
                vec![],
            );
            let res = boilerplate.controller.revise_obligation(&id, revision);
            assert!(matches!(res, Err(ObligationError::ValidationError(_))));
        },
    );
}

#[test]
fn test_revise_unknown_obligation() {
    obligation_test(
        no_scheduler_config(),
        Arc::new(CapturingBroadcaster::new()),
        Arc::new(MemorySectorStore::new()),
        |boilerplate| {
            let generator = ObligationGenerator::default();
            let ghost_id = generator.terms().derive_id();
            let revision = generator.signed_revision(
                &ghost_id,
                1,
                Currency::from_raw(20_000_000_000),
                Currency::from_raw(5_000_000_000),
                vec![],
            );
            let res = boilerplate.controller.revise_obligation(&ghost_id, revision);
            assert!(matches!(res, Err(ObligationError::NotFound(_))));
        },
    );
}

#[test]
fn test_revision_rejects_foreign_signature() {
    obligation_test(
        no_scheduler_config(),
        Arc::new(CapturingBroadcaster::new()),
        Arc::new(MemorySectorStore::new()),
        |boilerplate| {
            let generator = ObligationGenerator::default();
            let id = boilerplate
                .controller
                .create_obligation(generator.terms())
                .unwrap();
            let before = boilerplate.controller.get_obligation(&id).unwrap();

            // signed by a different renter/host pair
            let stranger = ObligationGenerator::default();
            let revision = stranger.signed_revision(
                &id,
                1,
                Currency::from_raw(20_000_000_000),
                Currency::from_raw(5_000_000_000),
                vec![],
            );
            let res = boilerplate.controller.revise_obligation(&id, revision);
            assert!(matches!(res, Err(ObligationError::ValidationError(_))));

            // a failed call leaves the obligation unchanged
            let after = boilerplate.controller.get_obligation(&id).unwrap();
            assert_eq!(before, after);
        },
    );
}

#[test]
fn test_revision_collateral_exceeding_budget() {
    let config = ObligationConfig {
        collateral_budget: Currency::from_raw(10_000),
        ..no_scheduler_config()
    };
    obligation_test(
        config,
        Arc::new(CapturingBroadcaster::new()),
        Arc::new(MemorySectorStore::new()),
        |boilerplate| {
            let generator =
                ObligationGenerator::default().collateral(Currency::from_raw(8_000));
            let id = boilerplate
                .controller
                .create_obligation(generator.terms())
                .unwrap();
            let before = boilerplate.controller.get_obligation(&id).unwrap();

            // raising the collateral past the remaining budget is refused
            let revision = generator.signed_revision(
                &id,
                1,
                Currency::from_raw(10_000_000_000),
                Currency::from_raw(15_000),
                vec![],
            );
            let res = boilerplate.controller.revise_obligation(&id, revision);
            assert!(matches!(
                res,
                Err(ObligationError::InsufficientCollateral(_))
            ));
            assert_eq!(boilerplate.controller.get_obligation(&id).unwrap(), before);

            // a raise that fits is accepted and updates the accounting
            let revision = generator.signed_revision(
                &id,
                1,
                Currency::from_raw(10_000_000_000),
                Currency::from_raw(9_000),
                vec![],
            );
            boilerplate
                .controller
                .revise_obligation(&id, revision)
                .expect("revision within the budget should succeed");
            let obligation = boilerplate.controller.get_obligation(&id).unwrap();
            assert_eq!(obligation.locked_collateral, Currency::from_raw(9_000));
        },
    );
}
