//! The balance computation / debt-netting core.
//!
//! Given a group's member set and its full expense and settlement history,
//! [`compute_balances`] derives each member's net overall balance and a
//! minimal pairwise "who owes whom how much" ledger. It is a pure,
//! stateless projection: no I/O, no retained state, recomputed from a
//! consistent snapshot on every call.
//!
//! The computation runs in four stages, strictly in order:
//!
//! 1. initialize a zeroed pairwise ledger over the member set;
//! 2. accumulate every expense split and every settlement into per-member
//!    totals and the gross ledger;
//! 3. net each bidirectional pair into a single residual directed debt;
//! 4. project the per-member view from the *netted* ledger.
//!
//! Settlements may drive a gross ledger entry negative during stage 2;
//! netting resolves the sign. For that to hold, netting must run after
//! *all* accumulation, never interleaved with it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    EngineError, MoneyCents, ResultEngine, expenses::Expense, groups::GroupMember,
    settlements::Settlement,
};

/// A debt of the record's member toward `to`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtEntry {
    pub to: String,
    pub amount: MoneyCents,
}

/// A debt owed to the record's member by `from`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditEntry {
    pub from: String,
    pub amount: MoneyCents,
}

/// Per-member view of the netted ledger.
///
/// A member with no nonzero ledger entries gets empty `owes`/`owed_by`
/// lists, never omission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub member: GroupMember,
    pub total_balance: MoneyCents,
    pub owes: Vec<DebtEntry>,
    pub owed_by: Vec<CreditEntry>,
}

/// The full balance response for one group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub members: Vec<BalanceRecord>,
    pub totals: BTreeMap<String, MoneyCents>,
}

/// Directed pairwise ledger: `ledger[debtor][creditor]` accumulates what
/// the debtor owes the creditor, gross during accumulation and minimal
/// after netting.
///
/// `BTreeMap` keeps member iteration in a deterministic total order, which
/// the netting pass relies on to visit each unordered pair exactly once.
#[derive(Debug)]
struct PairwiseLedger {
    entries: BTreeMap<String, BTreeMap<String, MoneyCents>>,
}

impl PairwiseLedger {
    /// Builds the zeroed ledger over the member set: one entry for every
    /// ordered pair (a, b) with a != b. O(n²), fine for human-scale
    /// groups. Empty and singleton member sets are valid and yield an
    /// empty/trivial ledger.
    fn zeroed(usernames: &[String]) -> Self {
        let mut entries = BTreeMap::new();
        for debtor in usernames {
            let row: BTreeMap<String, MoneyCents> = usernames
                .iter()
                .filter(|creditor| *creditor != debtor)
                .map(|creditor| (creditor.clone(), MoneyCents::ZERO))
                .collect();
            entries.insert(debtor.clone(), row);
        }
        Self { entries }
    }

    fn get(&self, debtor: &str, creditor: &str) -> MoneyCents {
        self.entries
            .get(debtor)
            .and_then(|row| row.get(creditor))
            .copied()
            .unwrap_or(MoneyCents::ZERO)
    }

    fn set(&mut self, debtor: &str, creditor: &str, amount: MoneyCents) {
        if let Some(entry) = self
            .entries
            .get_mut(debtor)
            .and_then(|row| row.get_mut(creditor))
        {
            *entry = amount;
        }
    }

    fn add(&mut self, debtor: &str, creditor: &str, amount: MoneyCents) {
        if let Some(entry) = self
            .entries
            .get_mut(debtor)
            .and_then(|row| row.get_mut(creditor))
        {
            *entry += amount;
        }
    }

    /// Collapses each bidirectional pair into at most one directed debt.
    ///
    /// For every unordered pair {a, b}, visited once via the map's total
    /// order (a < b), `diff = ledger[a][b] - ledger[b][a]` decides the
    /// residual direction. Afterwards at most one of the two entries is
    /// nonzero, and the sum of all entries equals the sum of all net
    /// imbalances.
    fn net(&mut self) {
        let usernames: Vec<String> = self.entries.keys().cloned().collect();
        for (i, a) in usernames.iter().enumerate() {
            for b in &usernames[i + 1..] {
                let diff = self.get(a, b) - self.get(b, a);
                if diff.is_positive() {
                    self.set(a, b, diff);
                    self.set(b, a, MoneyCents::ZERO);
                } else if diff.is_negative() {
                    self.set(b, a, -diff);
                    self.set(a, b, MoneyCents::ZERO);
                } else {
                    self.set(a, b, MoneyCents::ZERO);
                    self.set(b, a, MoneyCents::ZERO);
                }
            }
        }
    }
}

/// Computes net totals and the minimal pairwise debt ledger for a group.
///
/// Inputs are an already-fetched, point-in-time-consistent snapshot; the
/// function does no I/O and holds no state across calls, so concurrent
/// invocations are independent.
///
/// # Errors
///
/// Fails with [`EngineError::InvalidReference`] when an expense or
/// settlement references a user outside `members`; accumulating such a
/// record silently would corrupt totals with no way to detect it
/// downstream. Empty member, expense, or settlement inputs are valid and
/// yield all-zero output.
pub fn compute_balances(
    members: &[GroupMember],
    expenses: &[Expense],
    settlements: &[Settlement],
) -> ResultEngine<BalanceSheet> {
    let usernames: Vec<String> = members
        .iter()
        .map(|member| member.username.clone())
        .collect();
    check_references(&usernames, expenses, settlements)?;

    let mut totals: BTreeMap<String, MoneyCents> = usernames
        .iter()
        .map(|username| (username.clone(), MoneyCents::ZERO))
        .collect();
    let mut ledger = PairwiseLedger::zeroed(&usernames);

    accumulate_expenses(&mut totals, &mut ledger, expenses);
    accumulate_settlements(&mut totals, &mut ledger, settlements);
    ledger.net();

    Ok(project(members, &totals, &ledger))
}

/// Rejects records referencing users outside the member set, before any
/// accumulation happens.
fn check_references(
    usernames: &[String],
    expenses: &[Expense],
    settlements: &[Settlement],
) -> ResultEngine<()> {
    let known = |username: &str| usernames.iter().any(|u| u == username);

    for expense in expenses {
        if !known(&expense.paid_by) {
            return Err(EngineError::InvalidReference(format!(
                "expense {} paid by non-member {}",
                expense.id, expense.paid_by
            )));
        }
        for split in &expense.splits {
            if !known(&split.user_id) {
                return Err(EngineError::InvalidReference(format!(
                    "expense {} split references non-member {}",
                    expense.id, split.user_id
                )));
            }
        }
    }

    for settlement in settlements {
        if !known(&settlement.paid_by) || !known(&settlement.received_by) {
            return Err(EngineError::InvalidReference(format!(
                "settlement {} references a non-member",
                settlement.id
            )));
        }
    }

    Ok(())
}

fn accumulate_expenses(
    totals: &mut BTreeMap<String, MoneyCents>,
    ledger: &mut PairwiseLedger,
    expenses: &[Expense],
) {
    for expense in expenses {
        let payer = expense.paid_by.as_str();
        for split in &expense.splits {
            // The payer cannot owe themself; a settled split is already
            // resolved and must not be double-counted.
            if split.user_id == payer || split.paid {
                continue;
            }

            if let Some(total) = totals.get_mut(payer) {
                *total += split.amount;
            }
            if let Some(total) = totals.get_mut(&split.user_id) {
                *total -= split.amount;
            }
            ledger.add(&split.user_id, payer, split.amount);
        }
    }
}

fn accumulate_settlements(
    totals: &mut BTreeMap<String, MoneyCents>,
    ledger: &mut PairwiseLedger,
    settlements: &[Settlement],
) {
    for settlement in settlements {
        if let Some(total) = totals.get_mut(&settlement.paid_by) {
            *total += settlement.amount;
        }
        if let Some(total) = totals.get_mut(&settlement.received_by) {
            *total -= settlement.amount;
        }
        // May go negative here; netting resolves the sign afterwards.
        ledger.add(
            &settlement.paid_by,
            &settlement.received_by,
            -settlement.amount,
        );
    }
}

/// Shapes the response from the *netted* ledger. Reading the pre-netting
/// accumulation here would double-report mutual debts.
fn project(
    members: &[GroupMember],
    totals: &BTreeMap<String, MoneyCents>,
    ledger: &PairwiseLedger,
) -> BalanceSheet {
    let records = members
        .iter()
        .map(|member| {
            let username = member.username.as_str();

            let owes = ledger
                .entries
                .get(username)
                .into_iter()
                .flatten()
                .filter(|(_, amount)| amount.is_positive())
                .map(|(creditor, amount)| DebtEntry {
                    to: creditor.clone(),
                    amount: *amount,
                })
                .collect();

            let owed_by = ledger
                .entries
                .iter()
                .filter(|(debtor, _)| debtor.as_str() != username)
                .filter_map(|(debtor, row)| {
                    let amount = row.get(username).copied()?;
                    amount.is_positive().then(|| CreditEntry {
                        from: debtor.clone(),
                        amount,
                    })
                })
                .collect();

            BalanceRecord {
                member: member.clone(),
                total_balance: totals
                    .get(username)
                    .copied()
                    .unwrap_or(MoneyCents::ZERO),
                owes,
                owed_by,
            }
        })
        .collect();

    BalanceSheet {
        members: records,
        totals: totals.clone(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::{Currency, group_memberships::GroupRole, splits::Split};

    fn member(username: &str) -> GroupMember {
        GroupMember {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            avatar_url: None,
            role: GroupRole::Member,
        }
    }

    fn expense(paid_by: &str, splits: &[(&str, i64)]) -> Expense {
        expense_with_flags(
            paid_by,
            &splits
                .iter()
                .map(|(user, cents)| (*user, *cents, false))
                .collect::<Vec<_>>(),
        )
    }

    fn expense_with_flags(paid_by: &str, splits: &[(&str, i64, bool)]) -> Expense {
        let splits: Vec<Split> = splits
            .iter()
            .map(|(user, cents, paid)| Split::new(user.to_string(), MoneyCents::new(*cents), *paid))
            .collect();
        let amount: MoneyCents = splits.iter().map(|s| s.amount).sum();
        Expense {
            id: Uuid::new_v4(),
            group_id: "g".to_string(),
            description: None,
            amount,
            currency: Currency::Eur,
            paid_by: paid_by.to_string(),
            created_by: paid_by.to_string(),
            occurred_at: Utc::now(),
            splits,
        }
    }

    fn settlement(paid_by: &str, received_by: &str, cents: i64) -> Settlement {
        Settlement {
            id: Uuid::new_v4(),
            group_id: "g".to_string(),
            paid_by: paid_by.to_string(),
            received_by: received_by.to_string(),
            amount: MoneyCents::new(cents),
            currency: Currency::Eur,
            note: None,
            created_by: paid_by.to_string(),
            occurred_at: Utc::now(),
        }
    }

    fn record<'a>(sheet: &'a BalanceSheet, username: &str) -> &'a BalanceRecord {
        sheet
            .members
            .iter()
            .find(|record| record.member.username == username)
            .unwrap()
    }

    fn assert_conservation(sheet: &BalanceSheet) {
        let sum: MoneyCents = sheet.totals.values().copied().sum();
        assert_eq!(sum, MoneyCents::ZERO, "totals must sum to zero");
    }

    fn assert_mutual_exclusion(sheet: &BalanceSheet) {
        for a in &sheet.members {
            for debt in &a.owes {
                let other = record(sheet, &debt.to);
                assert!(
                    !other.owes.iter().any(|d| d.to == a.member.username),
                    "both directions nonzero between {} and {}",
                    a.member.username,
                    debt.to
                );
            }
        }
    }

    #[test]
    fn even_split_charges_non_payers() {
        let members = vec![member("anna"), member("bruno"), member("carla")];
        let expenses = vec![expense(
            "anna",
            &[("anna", 1000), ("bruno", 1000), ("carla", 1000)],
        )];

        let sheet = compute_balances(&members, &expenses, &[]).unwrap();

        assert_eq!(sheet.totals["anna"], MoneyCents::new(2000));
        assert_eq!(sheet.totals["bruno"], MoneyCents::new(-1000));
        assert_eq!(sheet.totals["carla"], MoneyCents::new(-1000));

        let anna = record(&sheet, "anna");
        assert!(anna.owes.is_empty());
        assert_eq!(anna.owed_by.len(), 2);
        let bruno = record(&sheet, "bruno");
        assert_eq!(
            bruno.owes,
            vec![DebtEntry {
                to: "anna".to_string(),
                amount: MoneyCents::new(1000),
            }]
        );
        assert_conservation(&sheet);
        assert_mutual_exclusion(&sheet);
    }

    #[test]
    fn settlement_clears_debt() {
        let members = vec![member("anna"), member("bruno")];
        let expenses = vec![expense("anna", &[("bruno", 3000)])];
        let settlements = vec![settlement("bruno", "anna", 3000)];

        let sheet = compute_balances(&members, &expenses, &settlements).unwrap();

        assert_eq!(sheet.totals["anna"], MoneyCents::ZERO);
        assert_eq!(sheet.totals["bruno"], MoneyCents::ZERO);
        let bruno = record(&sheet, "bruno");
        assert!(bruno.owes.is_empty());
        assert!(bruno.owed_by.is_empty());
        assert_conservation(&sheet);
    }

    #[test]
    fn mutual_debts_net_to_single_direction() {
        let members = vec![member("anna"), member("bruno")];
        // anna owes bruno 10, bruno owes anna 15 -> bruno owes anna 5 net.
        let expenses = vec![
            expense("bruno", &[("anna", 1000)]),
            expense("anna", &[("bruno", 1500)]),
        ];

        let sheet = compute_balances(&members, &expenses, &[]).unwrap();

        let anna = record(&sheet, "anna");
        assert!(anna.owes.is_empty());
        assert_eq!(
            anna.owed_by,
            vec![CreditEntry {
                from: "bruno".to_string(),
                amount: MoneyCents::new(500),
            }]
        );
        let bruno = record(&sheet, "bruno");
        assert_eq!(
            bruno.owes,
            vec![DebtEntry {
                to: "anna".to_string(),
                amount: MoneyCents::new(500),
            }]
        );
        assert_mutual_exclusion(&sheet);
        assert_conservation(&sheet);
    }

    #[test]
    fn payer_own_split_contributes_nothing() {
        let members = vec![member("anna"), member("bruno")];
        let with_self = vec![expense("anna", &[("anna", 500), ("bruno", 500)])];
        let without_self = vec![expense("anna", &[("bruno", 500)])];

        let a = compute_balances(&members, &with_self, &[]).unwrap();
        let b = compute_balances(&members, &without_self, &[]).unwrap();
        assert_eq!(a.totals, b.totals);
    }

    #[test]
    fn settled_split_contributes_nothing() {
        let members = vec![member("anna"), member("bruno"), member("carla")];
        let expenses = vec![expense_with_flags(
            "anna",
            &[("bruno", 1000, true), ("carla", 1000, false)],
        )];

        let sheet = compute_balances(&members, &expenses, &[]).unwrap();

        assert_eq!(sheet.totals["anna"], MoneyCents::new(1000));
        assert_eq!(sheet.totals["bruno"], MoneyCents::ZERO);
        assert_eq!(sheet.totals["carla"], MoneyCents::new(-1000));
        let bruno = record(&sheet, "bruno");
        assert!(bruno.owes.is_empty());
    }

    #[test]
    fn order_of_inputs_does_not_matter() {
        let members = vec![member("anna"), member("bruno"), member("carla")];
        let mut expenses = vec![
            expense("anna", &[("bruno", 700), ("carla", 300)]),
            expense("bruno", &[("anna", 400)]),
            expense("carla", &[("anna", 900), ("bruno", 100)]),
        ];
        let mut settlements = vec![
            settlement("bruno", "anna", 200),
            settlement("anna", "carla", 500),
        ];

        let forward = compute_balances(&members, &expenses, &settlements).unwrap();
        expenses.reverse();
        settlements.reverse();
        let reversed = compute_balances(&members, &expenses, &settlements).unwrap();

        assert_eq!(forward, reversed);
        assert_conservation(&forward);
        assert_mutual_exclusion(&forward);
    }

    #[test]
    fn recomputation_is_idempotent() {
        let members = vec![member("anna"), member("bruno")];
        let expenses = vec![expense("anna", &[("bruno", 1234)])];
        let settlements = vec![settlement("bruno", "anna", 1000)];

        let first = compute_balances(&members, &expenses, &settlements).unwrap();
        let second = compute_balances(&members, &expenses, &settlements).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn overpaying_settlement_flips_direction() {
        let members = vec![member("anna"), member("bruno")];
        // bruno owes anna 10, then pays back 25: anna now owes bruno 15.
        let expenses = vec![expense("anna", &[("bruno", 1000)])];
        let settlements = vec![settlement("bruno", "anna", 2500)];

        let sheet = compute_balances(&members, &expenses, &settlements).unwrap();

        let anna = record(&sheet, "anna");
        assert_eq!(
            anna.owes,
            vec![DebtEntry {
                to: "bruno".to_string(),
                amount: MoneyCents::new(1500),
            }]
        );
        assert_eq!(sheet.totals["bruno"], MoneyCents::new(1500));
        assert_mutual_exclusion(&sheet);
        assert_conservation(&sheet);
    }

    #[test]
    fn empty_inputs_yield_zero_output() {
        let sheet = compute_balances(&[], &[], &[]).unwrap();
        assert!(sheet.members.is_empty());
        assert!(sheet.totals.is_empty());

        let members = vec![member("anna")];
        let sheet = compute_balances(&members, &[], &[]).unwrap();
        assert_eq!(sheet.totals["anna"], MoneyCents::ZERO);
        let anna = record(&sheet, "anna");
        assert!(anna.owes.is_empty());
        assert!(anna.owed_by.is_empty());
    }

    #[test]
    fn rejects_expense_referencing_non_member() {
        let members = vec![member("anna"), member("bruno")];

        let foreign_payer = vec![expense("dora", &[("anna", 100)])];
        assert!(matches!(
            compute_balances(&members, &foreign_payer, &[]),
            Err(EngineError::InvalidReference(_))
        ));

        let foreign_split = vec![expense("anna", &[("dora", 100)])];
        assert!(matches!(
            compute_balances(&members, &foreign_split, &[]),
            Err(EngineError::InvalidReference(_))
        ));
    }

    #[test]
    fn rejects_settlement_referencing_non_member() {
        let members = vec![member("anna"), member("bruno")];
        let settlements = vec![settlement("anna", "dora", 100)];
        assert!(matches!(
            compute_balances(&members, &[], &settlements),
            Err(EngineError::InvalidReference(_))
        ));
    }
}
