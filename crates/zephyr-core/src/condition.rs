//! Step/stage condition evaluation.
//!
//! Conditions are either a pre-supplied boolean or a small expression
//! language over four fields (`branch`, `event.type`, `needs.<job>.status`,
//! `steps.<id>.outcome`): conjunctions of `field == 'lit'` / `field != 'lit'`
//! clauses joined by `&&`. Deliberately not a host-language callback —
//! expressions are data, so they can be stored, replayed, and validated
//! ahead of a run.

use std::collections::HashMap;
use thiserror::Error;

/// Facts available to a condition expression at evaluation time.
#[derive(Debug, Clone, Default)]
pub struct ConditionContext {
    pub branch: Option<String>,
    pub event_type: String,
    /// job name -> that job's terminal status, lowercase (e.g. "success").
    pub needs: HashMap<String, String>,
    /// step id -> that step's outcome, lowercase (e.g. "success", "failure").
    pub steps: HashMap<String, String>,
}

/// A pre-compiled or pre-supplied condition: either an expression string
/// evaluated against a [`ConditionContext`], or a boolean fixed at
/// construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Expression(String),
    Literal(bool),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionError {
    #[error("malformed condition clause: {0}")]
    Malformed(String),
    #[error("unknown condition field: {0}")]
    UnknownField(String),
}

impl Condition {
    pub fn evaluate(&self, ctx: &ConditionContext) -> Result<bool, ConditionError> {
        match self {
            Condition::Literal(b) => Ok(*b),
            Condition::Expression(expr) => evaluate_expression(expr, ctx),
        }
    }
}

fn evaluate_expression(expr: &str, ctx: &ConditionContext) -> Result<bool, ConditionError> {
    for clause in expr.split("&&") {
        if !evaluate_clause(clause.trim(), ctx)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn evaluate_clause(clause: &str, ctx: &ConditionContext) -> Result<bool, ConditionError> {
    let (field, op, literal) = split_clause(clause)?;
    let actual = resolve_field(&field, ctx)?;
    let matches = actual.as_deref() == Some(literal.as_str());
    Ok(match op {
        Op::Eq => matches,
        Op::Ne => !matches,
    })
}

enum Op {
    Eq,
    Ne,
}

fn split_clause(clause: &str) -> Result<(String, Op, String), ConditionError> {
    let (left, op, right) = if let Some((l, r)) = clause.split_once("!=") {
        (l, Op::Ne, r)
    } else if let Some((l, r)) = clause.split_once("==") {
        (l, Op::Eq, r)
    } else {
        return Err(ConditionError::Malformed(clause.to_string()));
    };

    let field = left.trim().to_string();
    let literal = unquote(right.trim())
        .ok_or_else(|| ConditionError::Malformed(clause.to_string()))?;
    Ok((field, op, literal))
}

fn unquote(s: &str) -> Option<String> {
    let s = s.strip_prefix('\'').and_then(|s| s.strip_suffix('\''))?;
    Some(s.to_string())
}

fn resolve_field(field: &str, ctx: &ConditionContext) -> Result<Option<String>, ConditionError> {
    let parts: Vec<&str> = field.split('.').collect();
    match parts.as_slice() {
        ["branch"] => Ok(ctx.branch.clone()),
        ["event", "type"] => Ok(Some(ctx.event_type.clone())),
        ["needs", job, "status"] => Ok(ctx.needs.get(*job).cloned()),
        ["steps", id, "outcome"] => Ok(ctx.steps.get(*id).cloned()),
        _ => Err(ConditionError::UnknownField(field.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ConditionContext {
        let mut needs = HashMap::new();
        needs.insert("build".to_string(), "success".to_string());
        let mut steps = HashMap::new();
        steps.insert("compile".to_string(), "failure".to_string());
        ConditionContext {
            branch: Some("main".to_string()),
            event_type: "push".to_string(),
            needs,
            steps,
        }
    }

    #[test]
    fn branch_equality() {
        let cond = Condition::Expression("branch == 'main'".to_string());
        assert_eq!(cond.evaluate(&ctx()), Ok(true));
    }

    #[test]
    fn branch_inequality() {
        let cond = Condition::Expression("branch != 'develop'".to_string());
        assert_eq!(cond.evaluate(&ctx()), Ok(true));
    }

    #[test]
    fn needs_status() {
        let cond = Condition::Expression("needs.build.status == 'success'".to_string());
        assert_eq!(cond.evaluate(&ctx()), Ok(true));
    }

    #[test]
    fn conjunction_short_circuits_on_false() {
        let cond = Condition::Expression(
            "branch == 'main' && steps.compile.outcome == 'success'".to_string(),
        );
        assert_eq!(cond.evaluate(&ctx()), Ok(false));
    }

    #[test]
    fn literal_condition() {
        assert_eq!(Condition::Literal(true).evaluate(&ctx()), Ok(true));
        assert_eq!(Condition::Literal(false).evaluate(&ctx()), Ok(false));
    }

    #[test]
    fn unknown_field_errors() {
        let cond = Condition::Expression("bogus == 'x'".to_string());
        assert_eq!(
            cond.evaluate(&ctx()),
            Err(ConditionError::UnknownField("bogus".to_string()))
        );
    }
}
