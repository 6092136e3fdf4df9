//! Splits a completed response into streamable deltas
//!
//! Whatever the policy, fragments are never empty and concatenate back to
//! the input exactly, whitespace included.


use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use thiserror::Error;

/// Granularity of the deltas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkPolicy {
    /// One word plus the whitespace that follows it
    #[default]
    Words,
    /// Fixed windows of this many characters
    Chars(NonZeroUsize),
}

impl ChunkPolicy {
    /// Lazily fragment `text`. Calling again on the same text yields the
    /// same fragments.
    pub fn chunks(self, text: &str) -> Chunks<'_> {
        Chunks {
            rest: text,
            policy: self,
        }
    }

    /// Byte length of the next fragment at the front of `rest`
    fn fragment_len(self, rest: &str) -> usize {
        match self {
            ChunkPolicy::Words => {
                let mut seen_word = false;
                let mut in_trailing = false;
                for (i, c) in rest.char_indices() {
                    if c.is_whitespace() {
                        in_trailing |= seen_word;
                    } else if in_trailing {
                        return i;
                    } else {
                        seen_word = true;
                    }
                }
                rest.len()
            }
            ChunkPolicy::Chars(n) => rest
                .char_indices()
                .nth(n.get())
                .map_or(rest.len(), |(i, _)| i),
        }
    }
}

impl fmt::Display for ChunkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkPolicy::Words => f.write_str("words"),
            ChunkPolicy::Chars(n) => write!(f, "chars:{n}"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid chunk policy {0:?}: expected \"words\" or \"chars:N\" with N > 0")]
pub struct ParsePolicyError(String);

impl FromStr for ChunkPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("words") {
            return Ok(ChunkPolicy::Words);
        }
        s.strip_prefix("chars:")
            .and_then(|n| n.trim().parse::<NonZeroUsize>().ok())
            .map(ChunkPolicy::Chars)
            .ok_or_else(|| ParsePolicyError(s.to_string()))
    }
}

/// Borrowing fragment iterator returned by [`ChunkPolicy::chunks`]
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    rest: &'a str,
    policy: ChunkPolicy,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let (head, tail) = self.rest.split_at(self.policy.fragment_len(self.rest));
        self.rest = tail;
        Some(head)
    }
}

/// Owning cursor over the deltas of one response
///
/// Holds the full text so a run can hand out one delta per step across
/// suspension points.
#[derive(Debug, Clone)]
pub struct DeltaCursor {
    text: String,
    offset: usize,
    policy: ChunkPolicy,
}

impl DeltaCursor {
    pub fn new(text: String, policy: ChunkPolicy) -> Self {
        Self {
            text,
            offset: 0,
            policy,
        }
    }

    pub fn next_delta(&mut self) -> Option<String> {
        let (_, rest) = self.text.split_at(self.offset);
        let delta = self.policy.chunks(rest).next()?;
        self.offset += delta.len();
        Some(delta.to_string())
    }

    /// True once every delta has been handed out
    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.text.len()
    }
}
