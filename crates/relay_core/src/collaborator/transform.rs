use crate::error::{CoreError, CoreResult};
use crate::types::PatchStrategy;

/// Computes the new content of a file from a write operation.
pub trait ContentTransformer: Send + Sync {
    /// Returns the content `path` should have after applying `content`.
    ///
    /// `current` is the path's content at this point of the batch, or `None`
    /// if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Transform`] if the edit cannot be applied.
    fn transform(
        &self,
        path: &str,
        content: &str,
        strategy: PatchStrategy,
        current: Option<&str>,
    ) -> CoreResult<String>;
}

/// Supports full replacement only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceTransformer;

impl ContentTransformer for ReplaceTransformer {
    fn transform(
        &self,
        path: &str,
        content: &str,
        strategy: PatchStrategy,
        _current: Option<&str>,
    ) -> CoreResult<String> {
        match strategy {
            PatchStrategy::Replace => Ok(content.to_string()),
            other => Err(CoreError::transform(
                path,
                format!("patch strategy `{other}` is not supported"),
            )),
        }
    }
}
