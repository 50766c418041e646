use crate::core::{QueryError, Result};
use crate::query::{QueryMode, ReturnShape};

/// What the dispatcher does with the resolved query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Query,
    Update,
    InsertWithKey,
}

/// Decides the action of a non-template method.
pub fn resolve_action(mode: QueryMode, returns: &ReturnShape, text: &str) -> Action {
    if matches!(returns, ReturnShape::GeneratedKey(_)) {
        return Action::InsertWithKey;
    }
    match mode {
        QueryMode::Select | QueryMode::ModifyingWithReturn => Action::Query,
        QueryMode::Modifying => Action::Update,
        QueryMode::Execute | QueryMode::Template => action_from_text(text),
    }
}

/// Text heuristic: a statement is a query when, lowercased and stripped of
/// parentheses and whitespace, it starts with `select`.
pub fn action_from_text(text: &str) -> Action {
    let normalized: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '(' && *c != ')')
        .take("select".len())
        .flat_map(char::to_lowercase)
        .collect();
    if normalized == "select" {
        Action::Query
    } else {
        Action::Update
    }
}

/// Shapes the rows of an optional-returning method.
pub fn into_optional<T>(mut rows: Vec<T>) -> Result<Option<T>> {
    match rows.len() {
        0 | 1 => Ok(rows.pop()),
        actual => Err(QueryError::Cardinality { expected: 1, actual }),
    }
}
