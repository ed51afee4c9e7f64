/// Errors from reading Ion text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IonError {
    #[error("syntax error at offset {offset}: {reason}")]
    Syntax { offset: usize, reason: String },

    #[error("unexpected trailing input at offset {offset}")]
    TrailingInput { offset: usize },

    #[error("expected {expected}, found {found}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },
}

pub type IonResult<T> = Result<T, IonError>;
