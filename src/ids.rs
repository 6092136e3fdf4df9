//! Correlation identifier allocation

use std::fmt;

/// What an identifier correlates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Thread,
    Run,
    Message,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IdKind::Thread => "thread",
            IdKind::Run => "run",
            IdKind::Message => "message",
        })
    }
}

/// Source of fresh identifiers for runs that did not bring their own
pub trait IdAllocator: Send + Sync {
    fn allocate(&self, kind: IdKind) -> String;

    /// Use the caller's id when present, otherwise allocate one
    fn resolve(&self, supplied: Option<&str>, kind: IdKind) -> String {
        match supplied {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.allocate(kind),
        }
    }
}

/// Random v4 UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidAllocator;

impl IdAllocator for UuidAllocator {
    fn allocate(&self, _kind: IdKind) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic `kind-N` ids for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct SequentialAllocator {
    next: std::sync::atomic::AtomicU64,
}

#[cfg(test)]
impl IdAllocator for SequentialAllocator {
    fn allocate(&self, kind: IdKind) -> String {
        let n = self
            .next
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            + 1;
        format!("{kind}-{n}")
    }
}
