//! Error/warning side-channel: an `onError`/`onWarning` callback pair
//! (§6, §9) modeled as a small enum plus a sink that either raises,
//! collects, or silently counts.

use crate::error::GenotypeError;

/// What a parser or pipeline stage should do when a per-record problem is
/// encountered. Mirrors `SeqOps`'s per-stage `onError` policy (spec §4.F).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum ErrorPolicy {
    /// Raise immediately, terminating the pull (default).
    #[default]
    Throw,
    /// Drop the offending record and keep going.
    Reject,
    /// Accumulate into the diagnostics sink's error list instead of raising.
    Collect,
}

/// A warning with optional line/record context, as produced by `onWarning`.
#[derive(Debug, Clone)]
pub struct Warning {
    pub message: String,
    pub line: Option<u64>,
}

/// Accumulates warnings always, and errors when the policy is `Collect`.
/// Warnings stay silent by default (§7); callers opt in by reading
/// `warnings()`.
#[derive(Debug, Default)]
pub struct Diagnostics {
    policy: ErrorPolicy,
    warnings: Vec<Warning>,
    errors: Vec<GenotypeError>,
}

impl Diagnostics {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            policy,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub fn push_warning(&mut self, message: impl Into<String>, line: Option<u64>) {
        self.warnings.push(Warning {
            message: message.into(),
            line,
        });
    }

    /// Routes an error through the configured policy. Returns `Ok(None)`
    /// when the record should simply be dropped, `Ok(Some(()))`-shaped
    /// callers aren't needed here: instead we return whether the caller
    /// must propagate the error now.
    pub fn handle_error(&mut self, err: GenotypeError) -> Result<(), GenotypeError> {
        match self.policy {
            ErrorPolicy::Throw => Err(err),
            ErrorPolicy::Reject => Ok(()),
            ErrorPolicy::Collect => {
                self.errors.push(err);
                Ok(())
            }
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn errors(&self) -> &[GenotypeError] {
        &self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_policy_accumulates_errors() {
        let mut diag = Diagnostics::new(ErrorPolicy::Collect);
        diag.handle_error(GenotypeError::parse("bad record", Some(2)))
            .unwrap();
        assert_eq!(diag.errors().len(), 1);
    }

    #[test]
    fn throw_policy_propagates() {
        let mut diag = Diagnostics::new(ErrorPolicy::Throw);
        let res = diag.handle_error(GenotypeError::parse("bad record", Some(2)));
        assert!(res.is_err());
    }

    #[test]
    fn reject_policy_drops_silently() {
        let mut diag = Diagnostics::new(ErrorPolicy::Reject);
        diag.handle_error(GenotypeError::parse("bad record", None))
            .unwrap();
        assert!(diag.errors().is_empty());
    }
}
