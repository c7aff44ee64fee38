use thiserror::Error;

/// Errors surfaced by content-type engines and the pagination controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no document has been set")]
    NoDocument,
    #[error("pages are not rendered; call render first")]
    NotRendered,
    #[error("page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("render was superseded by a newer settings change")]
    Superseded,
    #[error("document rejected: {0}")]
    DocumentRejected(String),
}

impl EngineError {
    /// The operation was invoked in the wrong lifecycle state.
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, EngineError::NoDocument | EngineError::NotRendered)
    }

    /// The caller passed an argument outside the valid domain.
    pub fn is_illegal_argument(&self) -> bool {
        matches!(self, EngineError::PageOutOfRange { .. })
    }
}

/// Validates a 1-based page number and returns its 0-based index.
pub(crate) fn page_slot(page: u32, page_count: u32) -> Result<usize, EngineError> {
    if page == 0 || page > page_count {
        return Err(EngineError::PageOutOfRange { page, page_count });
    }
    Ok((page - 1) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_slot_rejects_zero_and_overflow() {
        assert_eq!(page_slot(1, 3), Ok(0));
        assert_eq!(page_slot(3, 3), Ok(2));
        assert!(page_slot(0, 3).unwrap_err().is_illegal_argument());
        assert_eq!(
            page_slot(4, 3),
            Err(EngineError::PageOutOfRange {
                page: 4,
                page_count: 3
            })
        );
    }

    #[test]
    fn classifies_errors() {
        assert!(EngineError::NoDocument.is_illegal_state());
        assert!(EngineError::NotRendered.is_illegal_state());
        assert!(!EngineError::Superseded.is_illegal_state());
        assert!(!EngineError::NotRendered.is_illegal_argument());
    }
}
