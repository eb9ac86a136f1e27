//! Human-readable ticket codes: `{PREFIX}-{EVENT}-{SEQ}`, e.g. `K3ZQ-0007-0012`.
//!
//! The random prefix only makes codes harder to guess and to mistype into
//! another valid one. Uniqueness comes from the ledger's constraint on
//! `ticket.code`; a clash surfaces as a store error and the allocation is
//! retried with fresh codes.

use rand::Rng;

use crate::models::EventId;

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const PREFIX_LEN: usize = 4;

pub trait CodeGenerator: Send + Sync {
    /// Code for the ticket at zero-based `sequence` within `event_id`.
    fn generate(&self, event_id: EventId, sequence: i64) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self, event_id: EventId, sequence: i64) -> String {
        let prefix = random_prefix(&mut rand::thread_rng());
        format_code(&prefix, event_id, sequence)
    }
}

pub fn random_prefix<R: Rng>(rng: &mut R) -> String {
    (0..PREFIX_LEN)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect()
}

/// Numbers are zero-padded to four digits and printed in full beyond that.
pub fn format_code(prefix: &str, event_id: EventId, sequence: i64) -> String {
    format!("{prefix}-{event_id:04}-{:04}", sequence + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_format_pads_event_and_sequence() {
        assert_eq!(format_code("AB12", 7, 0), "AB12-0007-0001");
        assert_eq!(format_code("AB12", 42, 11), "AB12-0042-0012");
    }

    #[test]
    fn test_format_does_not_truncate_large_numbers() {
        assert_eq!(format_code("ZZZZ", 123_456, 99_999), "ZZZZ-123456-100000");
    }

    #[test]
    fn test_prefix_is_uppercase_base36() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let prefix = random_prefix(&mut rng);
            assert_eq!(prefix.len(), PREFIX_LEN);
            assert!(prefix
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_generated_code_shape() {
        let code = RandomCodeGenerator.generate(3, 4);
        let parts: Vec<&str> = code.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), PREFIX_LEN);
        assert_eq!(parts[1], "0003");
        assert_eq!(parts[2], "0005");
    }

    #[test]
    fn test_prefixes_spread_out() {
        let mut rng = StdRng::seed_from_u64(99);
        let prefixes: HashSet<String> = (0..200).map(|_| random_prefix(&mut rng)).collect();
        assert!(prefixes.len() > 190);
    }
}
