//! Byte budgets enforced around the bundler.

use crate::error::DeployError;
use crate::source_store::SourceStore;

/// Maximum total source size accepted before bundling.
pub const SOURCE_SIZE_LIMIT: usize = 500_000;

/// Maximum bundled output size accepted after bundling.
pub const BUNDLE_SIZE_LIMIT: usize = 10_000_000;

/// Checked before the bundler is invoked, so an oversized request never
/// costs compilation or network work.
pub fn check_source_size(store: &SourceStore) -> Result<(), DeployError> {
    let total = store.total_bytes();
    if total > SOURCE_SIZE_LIMIT {
        return Err(DeployError::size_limit(format!(
            "Source is {} bytes, exceeding the {} byte limit",
            total, SOURCE_SIZE_LIMIT
        )));
    }
    Ok(())
}

/// Checked after a successful bundle; the bundle is discarded on failure.
pub fn check_bundle_size(code: &str) -> Result<(), DeployError> {
    let total = code.len();
    if total > BUNDLE_SIZE_LIMIT {
        return Err(DeployError::size_limit(format!(
            "Bundled output is {} bytes, exceeding the {} byte limit",
            total, BUNDLE_SIZE_LIMIT
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_source_at_limit_passes() {
        let store = SourceStore::from_files([("a.ts".to_string(), "x".repeat(SOURCE_SIZE_LIMIT))]);
        assert!(check_source_size(&store).is_ok());
    }

    #[test]
    fn test_source_one_byte_over_fails() {
        let store =
            SourceStore::from_files([("a.ts".to_string(), "x".repeat(SOURCE_SIZE_LIMIT + 1))]);
        let err = check_source_size(&store).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SizeLimit);
        assert!(err.to_string().contains("500001"));
        assert!(err.to_string().contains("500000"));
    }

    #[test]
    fn test_bundle_budget_is_independent() {
        assert!(check_bundle_size("x").is_ok());
        let err = check_bundle_size(&"x".repeat(BUNDLE_SIZE_LIMIT + 1)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SizeLimit);
    }
}
