//! Assertion checking against the coordinator's outcome log.

use repcrec_engine::{Outcome, OutcomeLog};

use crate::parse::Assertion;

/// Compare every assertion against the log, returning one message per
/// failure. An empty result means the run passed.
pub fn check(assertions: &[Assertion], log: &OutcomeLog) -> Vec<String> {
    let mut failures = Vec::new();
    for assertion in assertions {
        let (txn, want_committed) = match assertion {
            Assertion::Committed(txn) => (*txn, true),
            Assertion::Aborted(txn) => (*txn, false),
        };
        match log.outcome_of(txn) {
            None => failures.push(format!("{} never finished", txn)),
            Some(outcome) if outcome.is_committed() != want_committed => {
                let wanted = if want_committed { "commit" } else { "abort" };
                failures.push(format!("{} was expected to {}, got {:?}", txn, wanted, outcome));
            }
            Some(_) => {}
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use repcrec_core::{AbortReason, TransactionId};

    fn t(n: u32) -> TransactionId {
        TransactionId::new(n)
    }

    fn sample_log() -> OutcomeLog {
        let mut log = OutcomeLog::default();
        log.record(t(1), Outcome::Committed);
        log.record(t(2), Outcome::Aborted(AbortReason::WaitDie));
        log
    }

    #[test]
    fn test_matching_assertions_pass() {
        let log = sample_log();
        let assertions = vec![Assertion::Committed(t(1)), Assertion::Aborted(t(2))];
        assert!(check(&assertions, &log).is_empty());
    }

    #[test]
    fn test_mismatch_is_reported() {
        let log = sample_log();
        let failures = check(&[Assertion::Aborted(t(1))], &log);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("T1"));
        assert!(failures[0].contains("abort"));
    }

    #[test]
    fn test_unfinished_transaction_is_reported() {
        let log = sample_log();
        let failures = check(&[Assertion::Committed(t(9))], &log);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("never finished"));
    }
}
