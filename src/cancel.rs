//! Cooperative cancellation, checked at every record boundary and before
//! each blocking read (spec §5). Modelled as a capability interface rather
//! than a class hierarchy, per spec §9 ("AbstractParser ... is a capability
//! interface").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::GenotypeError;

/// A cheaply-cloneable flag shared between a pipeline and anything it
/// spawns (parsers, writers, external sort/merge). Flipping it from any
/// thread causes every cooperating stage to stop at its next checkpoint.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `Err` if cancellation has been requested, otherwise `Ok(())`.
    pub fn check(&self) -> Result<(), GenotypeError> {
        if self.is_cancelled() {
            Err(GenotypeError::Other("operation cancelled".to_string()))
        } else {
            Ok(())
        }
    }

    /// Like [`check`](Self::check), but the message names the context in
    /// which cancellation was observed.
    pub fn check_context(&self, context: &str) -> Result<(), GenotypeError> {
        if self.is_cancelled() {
            Err(GenotypeError::Other(format!("{} cancelled", context)))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancels_across_clones() {
        let tok = CancellationToken::new();
        let clone = tok.clone();
        assert!(tok.check().is_ok());
        clone.cancel();
        assert!(tok.is_cancelled());
        assert!(tok.check().is_err());
    }
}
