/// Token usage as reported by the upstream, with explicit presence per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpstreamUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

impl UpstreamUsage {
    #[must_use]
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens: Some(prompt_tokens),
            completion_tokens: Some(completion_tokens),
        }
    }

    #[must_use]
    pub fn input_tokens(&self) -> u64 {
        self.prompt_tokens.unwrap_or(0)
    }

    #[must_use]
    pub fn output_tokens(&self) -> u64 {
        self.completion_tokens.unwrap_or(0)
    }
}

/// One item of the upstream feed, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamItem {
    /// Raw answer text; boundaries carry no meaning.
    Fragment(String),
    Usage(UpstreamUsage),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_counts_read_as_zero() {
        let usage = UpstreamUsage {
            prompt_tokens: None,
            completion_tokens: Some(7),
        };
        assert_eq!(usage.input_tokens(), 0);
        assert_eq!(usage.output_tokens(), 7);
        assert_eq!(UpstreamUsage::default().output_tokens(), 0);
    }
}
