//! Balance rules
//!
//! Rejections leave the balance untouched.

use bank_wire::{Amount, ResultKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ledger {
    balance: Amount,
}

impl Ledger {
    pub fn new(balance: Amount) -> Self {
        Self { balance }
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Negative amounts are invalid input and yield `Error`
    pub fn deposit(&mut self, amount: Amount) -> ResultKind {
        if amount < 0 {
            return ResultKind::Error;
        }
        match self.balance.checked_add(amount) {
            Some(balance) => {
                self.balance = balance;
                ResultKind::Success
            }
            None => ResultKind::Error,
        }
    }

    /// Overdrawing is a business-rule rejection and yields `Failure`
    pub fn withdraw(&mut self, amount: Amount) -> ResultKind {
        if amount > self.balance {
            return ResultKind::Failure;
        }
        match self.balance.checked_sub(amount) {
            Some(balance) => {
                self.balance = balance;
                ResultKind::Success
            }
            None => ResultKind::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit() {
        let mut ledger = Ledger::new(100);
        assert_eq!(ledger.deposit(50), ResultKind::Success);
        assert_eq!(ledger.balance(), 150);

        assert_eq!(ledger.deposit(0), ResultKind::Success);
        assert_eq!(ledger.balance(), 150);
    }

    #[test]
    fn test_negative_deposit_is_error() {
        let mut ledger = Ledger::new(100);
        assert_eq!(ledger.deposit(-10), ResultKind::Error);
        assert_eq!(ledger.balance(), 100);
    }

    #[test]
    fn test_deposit_overflow_is_error() {
        let mut ledger = Ledger::new(Amount::MAX - 1);
        assert_eq!(ledger.deposit(2), ResultKind::Error);
        assert_eq!(ledger.balance(), Amount::MAX - 1);
    }

    #[test]
    fn test_withdraw() {
        let mut ledger = Ledger::new(100);
        assert_eq!(ledger.withdraw(100), ResultKind::Success);
        assert_eq!(ledger.balance(), 0);
    }

    #[test]
    fn test_overdraw_is_failure() {
        let mut ledger = Ledger::new(100);
        assert_eq!(ledger.withdraw(120), ResultKind::Failure);
        assert_eq!(ledger.balance(), 100);
    }

    #[test]
    fn test_balance_never_negative() {
        let mut ledger = Ledger::new(30);
        for amount in [10, 10, 10, 10, 5] {
            ledger.withdraw(amount);
            assert!(ledger.balance() >= 0);
        }
        assert_eq!(ledger.balance(), 0);
    }
}
