use crate::util::format_seq_hex;

const ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const RANDOM_ID_LEN: usize = 24;

/// Source of message identifiers.
///
/// Implementations are owned by the caller (one per worker, per connection,
/// or per test) so no identifier state is shared process-wide.
pub trait MessageIdSource {
    fn next_message_id(&mut self) -> String;
}

/// `prefix` followed by a zero-padded 16-digit hex sequence number.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::starting_at(prefix, 1)
    }

    #[must_use]
    pub fn starting_at(prefix: impl Into<String>, first: u64) -> Self {
        Self {
            prefix: prefix.into(),
            next: first,
        }
    }
}

impl MessageIdSource for SequentialIds {
    fn next_message_id(&mut self) -> String {
        let seq = self.next;
        self.next = self.next.wrapping_add(1);
        format_seq_hex(&self.prefix, seq)
    }
}

/// `prefix` followed by 24 random alphanumerics.
#[derive(Debug, Clone)]
pub struct RandomIds {
    prefix: String,
    rng: fastrand::Rng,
}

impl RandomIds {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            rng: fastrand::Rng::new(),
        }
    }

    /// Deterministic ids, for reproducible output.
    #[must_use]
    pub fn with_seed(prefix: impl Into<String>, seed: u64) -> Self {
        Self {
            prefix: prefix.into(),
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

impl MessageIdSource for RandomIds {
    fn next_message_id(&mut self) -> String {
        let mut out = String::with_capacity(self.prefix.len() + RANDOM_ID_LEN);
        out.push_str(&self.prefix);
        for _ in 0..RANDOM_ID_LEN {
            let idx = self.rng.usize(..ALNUM.len());
            out.push(char::from(ALNUM[idx]));
        }
        out
    }
}
