#![forbid(unsafe_code)]

//! Prediction requests with last-request-wins staleness checks.
//!
//! Every buffer change issues a new [`PredictionToken`]. Predictors answer
//! asynchronously over an mpsc channel; a reply is applied only when its
//! token is the newest one issued. Older replies are dropped without any
//! cancellation handshake.
//!
//! # Invariants
//!
//! - Tokens are strictly monotonic: `token_n < token_{n+1}`.
//! - Token 0 is reserved for "nothing issued".
//! - A reply for token `t` is applied iff `t == current_token()` at the time
//!   it is received.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use tracing::debug;

// ---------------------------------------------------------------------------
// PredictionToken
// ---------------------------------------------------------------------------

/// Version tag of one prediction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PredictionToken(u64);

impl PredictionToken {
    /// The null token.
    pub const NONE: Self = Self(0);

    /// Create a token from a raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PredictionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.0)
    }
}

/// Ranked suggestions for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionReply {
    /// Token of the request this answers.
    pub token: PredictionToken,
    /// Full-line suggestions, best first.
    pub suggestions: Vec<String>,
}

// ---------------------------------------------------------------------------
// PredictionCoordinator
// ---------------------------------------------------------------------------

/// Issues tokens and filters replies.
///
/// Used from the input thread only; predictors hold a cloned [`Sender`].
pub struct PredictionCoordinator {
    next_token: AtomicU64,
    current_token: PredictionToken,
    answered: PredictionToken,
    suggestions: Vec<String>,
    sender: Sender<PredictionReply>,
    receiver: Receiver<PredictionReply>,
    applied: u64,
    discarded: u64,
}

impl fmt::Debug for PredictionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictionCoordinator")
            .field("current_token", &self.current_token)
            .field("suggestions", &self.suggestions.len())
            .field("applied", &self.applied)
            .field("discarded", &self.discarded)
            .finish()
    }
}

impl Default for PredictionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionCoordinator {
    /// A coordinator with nothing issued.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            next_token: AtomicU64::new(1),
            current_token: PredictionToken::NONE,
            answered: PredictionToken::NONE,
            suggestions: Vec::new(),
            sender,
            receiver,
            applied: 0,
            discarded: 0,
        }
    }

    /// Issue a token for a new request. Current suggestions are cleared
    /// since they described older text.
    pub fn issue(&mut self) -> PredictionToken {
        let token = PredictionToken(self.next_token.fetch_add(1, Ordering::SeqCst));
        self.current_token = token;
        self.suggestions.clear();
        token
    }

    /// The newest issued token.
    #[must_use]
    pub fn current_token(&self) -> PredictionToken {
        self.current_token
    }

    /// Whether the newest request has not been answered yet.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.current_token != PredictionToken::NONE && self.answered != self.current_token
    }

    /// A sender for predictors to reply on.
    #[must_use]
    pub fn sender(&self) -> Sender<PredictionReply> {
        self.sender.clone()
    }

    /// Apply `reply` if it answers the newest request.
    pub fn try_apply(&mut self, reply: PredictionReply) -> bool {
        if reply.token != self.current_token {
            self.discarded += 1;
            debug!(
                token = %reply.token,
                current = %self.current_token,
                "stale prediction discarded"
            );
            return false;
        }
        self.applied += 1;
        self.answered = reply.token;
        self.suggestions = reply.suggestions;
        true
    }

    /// Drain pending replies. Returns `true` if any was applied.
    pub fn poll(&mut self) -> bool {
        let mut applied = false;
        loop {
            match self.receiver.try_recv() {
                Ok(reply) => applied |= self.try_apply(reply),
                // The coordinator holds a sender, so the channel never disconnects.
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        applied
    }

    /// Suggestions from the newest applied reply.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    /// The part of the top suggestion that extends `text`, if any.
    #[must_use]
    pub fn completion_for(&self, text: &str) -> Option<&str> {
        let top = self.suggestions.first()?;
        let rest = top.strip_prefix(text)?;
        (!text.is_empty() && !rest.is_empty()).then_some(rest)
    }

    /// Drop suggestions and invalidate outstanding requests.
    pub fn clear(&mut self) {
        self.issue();
    }

    /// Replies applied so far.
    #[must_use]
    pub fn applied_count(&self) -> u64 {
        self.applied
    }

    /// Replies discarded as stale so far.
    #[must_use]
    pub fn discarded_count(&self) -> u64 {
        self.discarded
    }
}
