use anyhow::Error as AnyError;
use std::fmt;

/// What happened to a ready item that was processed without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Header verified, block executed and handed to the import handler.
    Imported,
    /// Already persisted header and body re-attached to the block tree without re-execution.
    Reattached,
    /// Block already present in the block tree; only the justification was considered.
    AlreadyKnown,
    /// Incomplete fragment verified and recorded without execution.
    Recorded,
}

impl fmt::Display for ImportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ImportOutcome::Imported => "imported",
            ImportOutcome::Reattached => "reattached",
            ImportOutcome::AlreadyKnown => "already known",
            ImportOutcome::Recorded => "recorded",
        };
        f.write_str(label)
    }
}

/// Result of justification handling. Never aborts the item.
#[derive(Debug)]
pub enum JustificationOutcome {
    /// No header or no justification to check.
    Skipped,
    /// Verified and persisted.
    Stored,
    Discarded(JustificationDiscard),
}

impl JustificationOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, JustificationOutcome::Stored)
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, JustificationOutcome::Discarded(_))
    }
}

#[derive(Debug)]
pub enum JustificationDiscard {
    /// The finality gadget rejected the proof.
    Invalid(AnyError),
    /// The proof verified but the block state failed to store it.
    NotPersisted(AnyError),
}

impl fmt::Display for JustificationDiscard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JustificationDiscard::Invalid(source) => {
                write!(f, "failed to verify justification: {source}")
            }
            JustificationDiscard::NotPersisted(source) => {
                write!(f, "failed to set justification: {source}")
            }
        }
    }
}
