use crate::error::ChatError;
use dashmap::{mapref::entry::Entry, DashMap};
use std::time::{Duration, Instant};

/// Who is talking, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    /// Not signed in. `client` is the caller's network address; it is not
    /// chosen by the caller, so the free turn cannot be renewed by dropping
    /// `session_id`.
    Anonymous { session_id: String, client: String },
    SignedIn { user_id: String, bearer: String },
}

impl Session {
    pub fn bearer(&self) -> Option<&str> {
        match self {
            Session::SignedIn { bearer, .. } => Some(bearer),
            Session::Anonymous { .. } => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Session::SignedIn { user_id, .. } => Some(user_id),
            Session::Anonymous { .. } => None,
        }
    }

    fn gate_keys(&self) -> Option<[String; 2]> {
        match self {
            Session::Anonymous { session_id, client } => {
                Some([format!("session:{session_id}"), format!("client:{client}")])
            }
            Session::SignedIn { .. } => None,
        }
    }
}

/// How long a spent free turn is remembered.
pub const FREE_TURN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Expired entries are swept once the gate holds this many.
const PRUNE_AT: usize = 4096;

/// Lets each anonymous caller send one message before requiring sign-in.
///
/// A turn is spent for both the session id and the client address; either
/// one being spent refuses the turn.
#[derive(Debug)]
pub struct ChatGate {
    spent: DashMap<String, Instant>,
    ttl: Duration,
}

impl ChatGate {
    pub fn new() -> Self {
        Self::with_ttl(FREE_TURN_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            spent: DashMap::new(),
            ttl,
        }
    }

    /// Admits the turn, spending the free turn for anonymous sessions.
    pub fn admit(&self, session: &Session) -> Result<(), ChatError> {
        let Some(keys) = session.gate_keys() else {
            return Ok(());
        };
        if self.spent.len() >= PRUNE_AT {
            self.prune();
        }

        let now = Instant::now();
        for (claimed, key) in keys.iter().enumerate() {
            if !self.claim(key, now) {
                for earlier in &keys[..claimed] {
                    self.spent.remove(earlier);
                }
                return Err(ChatError::AuthRequired);
            }
        }
        Ok(())
    }

    /// Gives the free turn back after a turn that produced no reply.
    pub fn release(&self, session: &Session) {
        for key in session.gate_keys().into_iter().flatten() {
            self.spent.remove(&key);
        }
    }

    /// Drops entries older than the TTL.
    pub fn prune(&self) {
        let ttl = self.ttl;
        self.spent.retain(|_, at| at.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.spent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spent.is_empty()
    }

    fn claim(&self, key: &str, now: Instant) -> bool {
        match self.spent.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if now.saturating_duration_since(*entry.get()) < self.ttl {
                    return false;
                }
                entry.insert(now);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }
}

impl Default for ChatGate {
    fn default() -> Self {
        Self::new()
    }
}
