//! USE, SET and LOCK TABLES
//!
//! Session statements compile to a [`SessionPlan`]; the driver applies it.
//! Names are checked here so a bad statement fails before any of its
//! assignments take effect.

use super::scope::Scope;
use super::{Compiler, Emit, Plan, Role, SessionPlan, SetAction, SetValue};
use crate::catalog::INFORMATION_SCHEMA;
use crate::error::{CatalogError, DriverError, Result};
use crate::formatter::ColumnMeta;
use crate::sql::ast::{Expr, LockTarget, SetAssignment, SetTarget};
use crate::types::Value;

impl Compiler<'_> {
    pub(super) fn compile_use(&self, name: &str) -> Result<Plan> {
        if name.eq_ignore_ascii_case(INFORMATION_SCHEMA) {
            return Ok(Plan::Session(SessionPlan::Use(INFORMATION_SCHEMA.to_string())));
        }
        let db = self
            .catalog
            .database(name)
            .ok_or_else(|| CatalogError::UnknownDatabase(name.to_string()))?;
        Ok(Plan::Session(SessionPlan::Use(db.name.clone())))
    }

    pub(super) fn compile_set(&self, assignments: &[SetAssignment]) -> Result<Plan> {
        let mut actions = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let action = match &assignment.target {
                SetTarget::User(name) => {
                    if matches!(assignment.value, Expr::Default) {
                        return Err(DriverError::WrongVariableValue {
                            name: format!("@{}", name),
                            value: "DEFAULT".into(),
                        });
                    }
                    SetAction::User {
                        name: name.clone(),
                        value: self.set_value(&assignment.value)?,
                    }
                }
                SetTarget::System { name, .. } => {
                    // unknown names fail before anything is assigned
                    self.session.system_variable(name)?;
                    let value = match &assignment.value {
                        Expr::Default => SetValue::Default,
                        // `SET sql_mode = TRADITIONAL`: bare words are strings
                        Expr::Column(c) if c.table.is_none() => SetValue::Literal(Value::text(c.column.clone())),
                        e => self.set_value(e)?,
                    };
                    SetAction::System {
                        name: name.to_ascii_lowercase(),
                        value,
                    }
                }
            };
            actions.push(action);
        }
        Ok(Plan::Session(SessionPlan::Set(actions)))
    }

    /// Literals are assigned as they are; anything else is evaluated by the
    /// engine as `SELECT <expr>`.
    fn set_value(&self, e: &Expr) -> Result<SetValue> {
        if let Some(value) = self.literal_value(e) {
            return Ok(SetValue::Literal(value));
        }
        let mut out = Emit::default();
        let sql = self.expr(e, &Scope::new(None), &mut out)?;
        Ok(SetValue::Query(out.finish(
            format!("SELECT {}", sql),
            Role::Rows(vec![ColumnMeta::text("value")]),
        )))
    }

    /// Locks are not taken; the statement only checks that every table exists.
    pub(super) fn compile_lock_tables(&self, targets: &[LockTarget]) -> Result<Plan> {
        for target in targets {
            if target.write {
                self.deny_information_schema(&target.table)?;
            }
            if !self.is_information_schema(&target.table) {
                self.table(&target.table)?;
            }
        }
        Ok(Plan::Session(SessionPlan::Noop))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{catalog, plan, session};
    use super::*;

    fn set_actions(sql: &str) -> Vec<SetAction> {
        match plan(&catalog(&[]), &session(), sql).unwrap() {
            Plan::Session(SessionPlan::Set(actions)) => actions,
            other => panic!("expected SET, got {}", other.summary()),
        }
    }

    #[test]
    fn test_use() {
        let catalog = catalog(&["CREATE DATABASE Shop"]);
        let session = session();
        assert_eq!(
            plan(&catalog, &session, "USE shop").unwrap(),
            Plan::Session(SessionPlan::Use("Shop".into()))
        );
        assert_eq!(plan(&catalog, &session, "USE nope").unwrap_err().code(), 1049);
    }

    #[test]
    fn test_set_literals_and_words() {
        let actions = set_actions("SET @a = 5, autocommit = ON, sql_mode = TRADITIONAL, @@session.wait_timeout = DEFAULT");
        assert_eq!(
            actions,
            vec![
                SetAction::User {
                    name: "a".into(),
                    value: SetValue::Literal(Value::Integer(5)),
                },
                SetAction::System {
                    name: "autocommit".into(),
                    value: SetValue::Literal(Value::text("ON")),
                },
                SetAction::System {
                    name: "sql_mode".into(),
                    value: SetValue::Literal(Value::text("TRADITIONAL")),
                },
                SetAction::System {
                    name: "wait_timeout".into(),
                    value: SetValue::Default,
                },
            ]
        );
    }

    #[test]
    fn test_set_expression_runs_as_query() {
        let actions = set_actions("SET @b = 1 + 2");
        let SetAction::User {
            value: SetValue::Query(stmt),
            ..
        } = &actions[0]
        else {
            panic!("expected a query value");
        };
        assert!(stmt.sql.starts_with("SELECT "));
    }

    #[test]
    fn test_set_unknown_variable() {
        let err = plan(&catalog(&[]), &session(), "SET @a = 1, no_such_thing = 1").unwrap_err();
        assert_eq!(err.code(), 1193);
    }

    #[test]
    fn test_lock_tables_checks_names() {
        let catalog = catalog(&["CREATE TABLE t (a INT)"]);
        let session = session();
        assert_eq!(
            plan(&catalog, &session, "LOCK TABLES t READ, t AS x WRITE").unwrap(),
            Plan::Session(SessionPlan::Noop)
        );
        assert_eq!(plan(&catalog, &session, "LOCK TABLES nope READ").unwrap_err().code(), 1146);
    }
}
