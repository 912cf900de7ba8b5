//! Shared outcome type for idempotent create calls.

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    Created,
    AlreadyExisted,
}

/// Treat a provider "already exists" conflict as steady state.
pub fn reclassify_conflict(result: Result<()>) -> Result<Provisioned> {
    match result {
        Ok(()) => Ok(Provisioned::Created),
        Err(err) if err.is_already_exists() => Ok(Provisioned::AlreadyExisted),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LakeError;

    #[test]
    fn test_reclassify_conflict() {
        assert_eq!(reclassify_conflict(Ok(())).unwrap(), Provisioned::Created);
        assert_eq!(
            reclassify_conflict(Err(LakeError::already_exists("db"))).unwrap(),
            Provisioned::AlreadyExisted
        );
        assert!(reclassify_conflict(Err(LakeError::provider("Glue", "AccessDenied"))).is_err());
    }
}
