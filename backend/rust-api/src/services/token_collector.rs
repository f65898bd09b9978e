use std::collections::HashSet;

use crate::models::recipient::Recipient;

/// Flattens recipients into the token batch for one dispatch.
///
/// A token repeated inside one recipient's list is sent once; the same token
/// held by two different recipients is sent twice.
pub fn collect(recipients: &[Recipient]) -> Vec<String> {
    let mut tokens = Vec::new();

    for recipient in recipients {
        let mut seen = HashSet::with_capacity(recipient.tokens.len());
        tokens.extend(
            recipient
                .tokens
                .iter()
                .filter(|token| seen.insert(token.as_str()))
                .cloned(),
        );
    }

    tokens
}
