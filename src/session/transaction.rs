//! Transaction and savepoint state machine
//!
//! The machine only decides; every transition returns the native operations
//! the driver must run, in order, so the bookkeeping can be tested without an
//! engine.

use crate::error::{DriverError, Result};

/// Native operation requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxAction {
    Begin,
    Commit,
    Rollback,
    Savepoint(String),
    Release(String),
    RollbackTo(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    Idle,
    Active {
        /// Open savepoints, oldest first
        savepoints: Vec<String>,
        /// Started by `autocommit=0` rather than BEGIN
        implicit: bool,
    },
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active { .. })
    }

    pub fn depth(&self) -> usize {
        match self {
            TransactionState::Idle => 0,
            TransactionState::Active { savepoints, .. } => 1 + savepoints.len(),
        }
    }

    /// BEGIN / START TRANSACTION. An open transaction is committed first.
    pub fn begin(&mut self) -> Vec<TxAction> {
        let mut actions = Vec::new();
        if self.is_active() {
            actions.push(TxAction::Commit);
        }
        actions.push(TxAction::Begin);
        *self = TransactionState::Active {
            savepoints: Vec::new(),
            implicit: false,
        };
        actions
    }

    /// Start the implicit transaction of `autocommit=0` if none is open.
    pub fn begin_implicit(&mut self) -> Vec<TxAction> {
        if self.is_active() {
            return Vec::new();
        }
        *self = TransactionState::Active {
            savepoints: Vec::new(),
            implicit: true,
        };
        vec![TxAction::Begin]
    }

    /// COMMIT; a no-op outside a transaction.
    pub fn commit(&mut self) -> Vec<TxAction> {
        match std::mem::take(self) {
            TransactionState::Idle => Vec::new(),
            TransactionState::Active { .. } => vec![TxAction::Commit],
        }
    }

    /// ROLLBACK; a no-op outside a transaction.
    pub fn rollback(&mut self) -> Vec<TxAction> {
        match std::mem::take(self) {
            TransactionState::Idle => Vec::new(),
            TransactionState::Active { .. } => vec![TxAction::Rollback],
        }
    }

    /// SAVEPOINT name. Outside a transaction it ends with the statement, so
    /// nothing is recorded. A reused name replaces the older one; natively the
    /// older one stays on the stack, shadowed by the new one.
    pub fn savepoint(&mut self, name: &str) -> Vec<TxAction> {
        match self {
            TransactionState::Idle => Vec::new(),
            TransactionState::Active { savepoints, .. } => {
                if let Some(pos) = position(savepoints, name) {
                    savepoints.remove(pos);
                }
                savepoints.push(name.to_string());
                vec![TxAction::Savepoint(name.to_string())]
            }
        }
    }

    /// RELEASE SAVEPOINT name; later savepoints go with it.
    pub fn release(&mut self, name: &str) -> Result<Vec<TxAction>> {
        let savepoints = self.savepoints_mut(name)?;
        let pos = position(savepoints, name).ok_or_else(|| DriverError::NoSuchSavepoint(name.to_string()))?;
        let released = savepoints[pos].clone();
        savepoints.truncate(pos);
        Ok(vec![TxAction::Release(released)])
    }

    /// ROLLBACK TO SAVEPOINT name; the target survives, later ones are released.
    pub fn rollback_to(&mut self, name: &str) -> Result<Vec<TxAction>> {
        let savepoints = self.savepoints_mut(name)?;
        let pos = position(savepoints, name).ok_or_else(|| DriverError::NoSuchSavepoint(name.to_string()))?;
        let target = savepoints[pos].clone();
        savepoints.truncate(pos + 1);
        Ok(vec![TxAction::RollbackTo(target)])
    }

    fn savepoints_mut(&mut self, name: &str) -> Result<&mut Vec<String>> {
        match self {
            TransactionState::Active { savepoints, .. } => Ok(savepoints),
            TransactionState::Idle => Err(DriverError::NoSuchSavepoint(name.to_string())),
        }
    }
}

/// Savepoint names compare case-insensitively.
fn position(savepoints: &[String], name: &str) -> Option<usize> {
    savepoints.iter().position(|s| s.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_begin_commits_first() {
        let mut tx = TransactionState::default();
        assert_eq!(tx.begin(), vec![TxAction::Begin]);
        assert_eq!(tx.begin(), vec![TxAction::Commit, TxAction::Begin]);
        assert_eq!(tx.rollback(), vec![TxAction::Rollback]);
        // Second ROLLBACK has nothing to undo
        assert!(tx.rollback().is_empty());
        assert!(!tx.is_active());
    }

    #[test]
    fn test_savepoint_nesting() {
        let mut tx = TransactionState::default();
        tx.begin();
        tx.savepoint("a");
        tx.savepoint("b");
        tx.savepoint("c");
        assert_eq!(tx.depth(), 4);

        assert_eq!(tx.rollback_to("B").unwrap(), vec![TxAction::RollbackTo("b".into())]);
        assert_eq!(tx.depth(), 3);

        assert_eq!(tx.release("a").unwrap(), vec![TxAction::Release("a".into())]);
        assert_eq!(tx.depth(), 1);
        assert!(matches!(tx.release("b"), Err(DriverError::NoSuchSavepoint(_))));
    }

    #[test]
    fn test_duplicate_savepoint_replaces() {
        let mut tx = TransactionState::default();
        tx.begin();
        tx.savepoint("s");
        tx.savepoint("t");
        let actions = tx.savepoint("s");
        assert_eq!(actions, vec![TxAction::Savepoint("s".into())]);
        assert_eq!(tx.depth(), 3);
        // "t" is now older than "s"
        tx.rollback_to("t").unwrap();
        assert_eq!(tx.depth(), 2);
    }

    #[test]
    fn test_savepoint_outside_transaction() {
        let mut tx = TransactionState::default();
        assert!(tx.rollback_to("x").is_err());
        assert!(tx.savepoint("x").is_empty());
        assert!(tx.rollback_to("x").is_err());
        assert!(tx.commit().is_empty());
    }

    #[test]
    fn test_implicit_transaction() {
        let mut tx = TransactionState::default();
        assert_eq!(tx.begin_implicit(), vec![TxAction::Begin]);
        assert!(tx.begin_implicit().is_empty());
        assert!(matches!(tx, TransactionState::Active { implicit: true, .. }));
    }
}
