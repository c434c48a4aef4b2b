//! Routing-key pattern matching.

/// Returns true when `routing_key` matches `pattern`.
///
/// Both are dot-separated words. In the pattern, `*` stands for exactly one
/// word and `#` for zero or more words.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    matches_from(&pattern, &key)
}

fn matches_from(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| matches_from(rest, &key[skip..])),
        Some((&word, rest)) => match key.split_first() {
            Some((&head, tail)) if word == "*" || word == head => matches_from(rest, tail),
            _ => false,
        },
    }
}

/// Returns true if the pattern has no empty words.
pub(crate) fn is_valid_pattern(pattern: &str) -> bool {
    !pattern.is_empty() && pattern.split('.').all(|word| !word.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        assert!(topic_matches("order.created", "order.created"));
        assert!(!topic_matches("order.created", "order.paid"));
        assert!(!topic_matches("order.created", "order.created.v2"));
    }

    #[test]
    fn star_matches_one_word() {
        assert!(topic_matches("bank.payment.*", "bank.payment.success"));
        assert!(topic_matches("*.stock.*", "warehouse.stock.reserved"));
        assert!(!topic_matches("bank.payment.*", "bank.payment"));
        assert!(!topic_matches("bank.*", "bank.payment.success"));
    }

    #[test]
    fn hash_matches_zero_or_more_words() {
        assert!(topic_matches("delivery.status.#", "delivery.status.picked_up"));
        assert!(topic_matches("delivery.status.#", "delivery.status"));
        assert!(topic_matches("#", "anything.at.all"));
        assert!(topic_matches("order.#.done", "order.a.b.done"));
        assert!(!topic_matches("delivery.status.#", "delivery.created"));
    }

    #[test]
    fn pattern_validation() {
        assert!(is_valid_pattern("delivery.status.#"));
        assert!(!is_valid_pattern(""));
        assert!(!is_valid_pattern("order..created"));
    }
}
