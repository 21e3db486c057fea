mod common;

use std::collections::HashSet;

use bigdecimal::Zero;

use common::*;

#[test]
fn balance_equals_signed_sum_of_completed_entries() {
	let f = Fixture::new();
	let s = Suite::setup(&f);
	let calendar = SystemCalendar;
	let svc = s.service(&calendar);
	let bob = f.user_factory.bob();
	let lucy = f.user_factory.lucy();
	let account = f.account_factory.family_account(bob.id);
	f.account_factory.add_member(&account.id, &lucy.id, Role::Member);

	svc.contribute(&account.id, &bob.id, &dec("600.00")).unwrap();
	svc.contribute(&account.id, &lucy.id, &dec("250.00")).unwrap();
	svc.withdraw(&account.id, &bob.id, &dec("100.00")).unwrap();
	svc.assess_fee(&account.id, &bob.id, &dec("12.50"), "monthly service fee").unwrap();
	svc.refund(&account.id, &bob.id, &lucy.id, &dec("12.50"), "fee waived").unwrap();

	let entries = s.transaction_repo.for_account(&account.id, None).unwrap();
	let mut signed_sum = BigDecimal::zero();
	for entry in &entries {
		assert_eq!(entry.status, TransactionStatus::Completed);
		match entry.transaction_type.direction() {
			Some(Direction::Credit) => signed_sum = signed_sum + &entry.amount,
			Some(Direction::Debit) => signed_sum = signed_sum - &entry.amount,
			None => {}
		}
	}

	let account = s.account_repo.find_by_id(&account.id).unwrap();
	assert_eq!(account.balance, signed_sum);
	assert_eq!(account.balance, dec("750.00"));
}

#[test]
fn snapshots_chain_in_creation_order() {
	let f = Fixture::new();
	let s = Suite::setup(&f);
	let calendar = SystemCalendar;
	let svc = s.service(&calendar);
	let bob = f.user_factory.bob();
	let account = f.account_factory.family_account(bob.id);

	svc.contribute(&account.id, &bob.id, &dec("100.00")).unwrap();
	svc.contribute(&account.id, &bob.id, &dec("40.00")).unwrap();
	svc.withdraw(&account.id, &bob.id, &dec("30.00")).unwrap();
	svc.contribute(&account.id, &bob.id, &dec("10.00")).unwrap();

	let entries = s.transaction_repo.for_account(&account.id, None).unwrap();
	assert_eq!(entries.len(), 4);
	assert_eq!(entries[0].balance_before, dec("0.00"));
	for pair in entries.windows(2) {
		assert_eq!(pair[1].balance_before, pair[0].balance_after);
	}
	assert_eq!(entries.last().unwrap().balance_after, dec("120.00"));
}

#[test]
fn reference_numbers_never_repeat() {
	let f = Fixture::new();
	let s = Suite::setup(&f);
	let calendar = SystemCalendar;
	let svc = s.service(&calendar);
	let bob = f.user_factory.bob();
	let account = f.account_factory.family_account(bob.id);

	for _ in 0..20 {
		svc.contribute(&account.id, &bob.id, &dec("10.00")).unwrap();
	}

	let entries = s.transaction_repo.for_account(&account.id, None).unwrap();
	let references: HashSet<String> =
		entries.iter().map(|t| t.reference_number.clone()).collect();
	assert_eq!(references.len(), entries.len());
}

#[test]
fn contributions_below_the_minimum_are_rejected() {
	let f = Fixture::new();
	let s = Suite::setup(&f);
	let calendar = SystemCalendar;
	let svc = s.service(&calendar);
	let bob = f.user_factory.bob();
	let account = f.account_factory.family_account(bob.id);

	let err = svc.contribute(&account.id, &bob.id, &dec("5.00")).unwrap_err();
	assert!(matches!(err.kind(), ErrorKind::Validation(_)));
	assert!(s.transaction_repo.for_account(&account.id, None).unwrap().is_empty());
}

#[test]
fn withdrawals_need_manage_rights_and_funds() {
	let f = Fixture::new();
	let s = Suite::setup(&f);
	let calendar = SystemCalendar;
	let svc = s.service(&calendar);
	let bob = f.user_factory.bob();
	let lucy = f.user_factory.lucy();
	let account = f.account_factory.family_account(bob.id);
	f.account_factory.add_member(&account.id, &lucy.id, Role::Member);

	svc.contribute(&account.id, &bob.id, &dec("100.00")).unwrap();

	let err = svc.withdraw(&account.id, &lucy.id, &dec("50.00")).unwrap_err();
	assert!(matches!(err.kind(), ErrorKind::PermissionDenied(_)));

	let err = svc.withdraw(&account.id, &bob.id, &dec("500.00")).unwrap_err();
	assert_eq!(err, Error::new(ErrorKind::InadequateFunds));

	let account = s.account_repo.find_by_id(&account.id).unwrap();
	assert_eq!(account.balance, dec("100.00"));
}

#[test]
fn ledger_queries_follow_the_index_paths() {
	let f = Fixture::new();
	let s = Suite::setup(&f);
	let calendar = SystemCalendar;
	let svc = s.service(&calendar);
	let bob = f.user_factory.bob();
	let lucy = f.user_factory.lucy();
	let account = f.account_factory.family_account(bob.id);
	f.account_factory.add_member(&account.id, &lucy.id, Role::Member);

	svc.contribute(&account.id, &bob.id, &dec("100.00")).unwrap();
	svc.contribute(&account.id, &lucy.id, &dec("50.00")).unwrap();
	let withdrawal = svc.withdraw(&account.id, &bob.id, &dec("20.00")).unwrap();

	// bookkeeping transfer between members, no balance movement
	let transfer = svc.transfer(&account.id, &bob.id, &lucy.id, &dec("25.00")).unwrap();
	assert_eq!(transfer.balance_before, transfer.balance_after);
	assert_eq!(s.account_repo.find_by_id(&account.id).unwrap().balance, dec("130.00"));

	let contributions = s
		.transaction_repo
		.for_account(&account.id, Some(TransactionType::Contribution))
		.unwrap();
	assert_eq!(contributions.len(), 2);

	let by_lucy = s.transaction_repo.initiated_by(&lucy.id).unwrap();
	assert_eq!(by_lucy.len(), 1);
	assert_eq!(by_lucy[0].amount, dec("50.00"));

	let found = s.transaction_repo.find_by_reference(&withdrawal.reference_number).unwrap();
	assert_eq!(found, withdrawal);
}
