/// Remaining free-spin entitlement of the signed-in account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FreeSpinLedger {
    remaining: i64,
}

impl FreeSpinLedger {
    pub fn new(remaining: i64) -> Self {
        Self {
            remaining: remaining.max(0),
        }
    }

    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// Uses one free spin. Returns false and leaves the count alone when
    /// nothing is left.
    pub fn consume(&mut self) -> bool {
        if self.remaining <= 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn credit(&mut self, spins: i64) {
        self.remaining = self.remaining.saturating_add(spins.max(0));
    }

    /// Replaces the count with the value read from the account record.
    pub fn adopt(&mut self, remaining: i64) {
        self.remaining = remaining.max(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_empty_ledger_fails_without_mutation() {
        let mut ledger = FreeSpinLedger::new(0);
        assert!(!ledger.consume());
        assert_eq!(ledger.remaining(), 0);
    }

    #[test]
    fn test_consume_decrements_by_one() {
        let mut ledger = FreeSpinLedger::new(2);
        assert!(ledger.consume());
        assert_eq!(ledger.remaining(), 1);
        assert!(ledger.consume());
        assert!(!ledger.consume());
        assert_eq!(ledger.remaining(), 0);
    }

    #[test]
    fn test_credit_ignores_negative_amounts() {
        let mut ledger = FreeSpinLedger::new(1);
        ledger.credit(3);
        assert_eq!(ledger.remaining(), 4);
        ledger.credit(-10);
        assert_eq!(ledger.remaining(), 4);
    }
}
