#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::envelope::{Envelope, EnvelopeKind};
    use crate::framing::{join_frames, split_frames};

    fn arb_envelope() -> impl Strategy<Value = Envelope> {
        (
            any::<i64>(),
            prop::collection::vec(any::<u8>(), 0..48),
            "[a-f0-9-]{0,36}",
            "[a-f0-9-]{0,36}",
            ".{0,64}",
        )
            .prop_map(|(code, key, sender, target, body)| Envelope {
                kind: EnvelopeKind::from_code(code),
                key,
                sender,
                target,
                body,
            })
    }

    proptest! {
        // Batched frames survive the relay's join and the client's split
        #[test]
        fn test_batched_frames_split_back(envelopes in prop::collection::vec(arb_envelope(), 1..8)) {
            let encoded: Vec<String> = envelopes.iter().map(|e| e.encode().unwrap()).collect();
            let message = join_frames(&encoded);

            let decoded: Vec<Envelope> = split_frames(&message)
                .map(|frame| Envelope::decode(frame).unwrap())
                .collect();
            prop_assert_eq!(decoded, envelopes);
        }

        // Only the two reserved codes map to something other than Direct
        #[test]
        fn test_kind_code_mapping(code in any::<i64>()) {
            let kind = EnvelopeKind::from_code(code);
            match code {
                101 => prop_assert_eq!(kind, EnvelopeKind::Discovery),
                102 => prop_assert_eq!(kind, EnvelopeKind::KeyExchange),
                _ => prop_assert_eq!(kind, EnvelopeKind::Direct),
            }
        }

        // Broadcast iff empty target or key exchange
        #[test]
        fn test_broadcast_rule(env in arb_envelope()) {
            let expected = env.target.is_empty() || env.kind == EnvelopeKind::KeyExchange;
            prop_assert_eq!(env.is_broadcast(), expected);
        }
    }
}
