//! Authorization port consulted before guarded transitions run.

use crate::domain::models::TransitionInput;

/// Evaluates a transition guard against the requesting actor.
///
/// `Err` carries the rejection reason.
pub trait Authorizer: Send + Sync {
    fn authorize_transition(&self, input: &TransitionInput, guard: &str) -> Result<(), String>;
}

impl<F> Authorizer for F
where
    F: Fn(&TransitionInput, &str) -> Result<(), String> + Send + Sync,
{
    fn authorize_transition(&self, input: &TransitionInput, guard: &str) -> Result<(), String> {
        self(input, guard)
    }
}

/// Authorizer that accepts every guard.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize_transition(&self, _input: &TransitionInput, _guard: &str) -> Result<(), String> {
        Ok(())
    }
}
