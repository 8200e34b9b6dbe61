#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::cipher::{pad, unpad, CipherCodec, IvMode, BLOCK_SIZE};
    use crate::keys::KeyPair;

    fn arb_unaligned() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>(), 1..200)
            .prop_filter("length must not be block aligned", |p| p.len() % BLOCK_SIZE != 0)
    }

    proptest! {
        // Unaligned plaintexts always round-trip
        #[test]
        fn test_unaligned_round_trip(
            plaintext in arb_unaligned(),
            key in prop::collection::vec(any::<u8>(), 32),
            random_iv in any::<bool>(),
        ) {
            let mode = if random_iv { IvMode::Random } else { IvMode::Fixed };
            let codec = CipherCodec::new(mode);
            let body = codec.encrypt(&plaintext, &key).unwrap();
            prop_assert_eq!(codec.decrypt(&key, &body).unwrap(), plaintext);
        }

        // Aligned plaintexts whose last byte can't be a pad count round-trip
        #[test]
        fn test_aligned_text_round_trip(blocks in 1usize..6, fill in 0x11u8..=0xFF) {
            let plaintext = vec![fill; blocks * BLOCK_SIZE];
            let codec = CipherCodec::default();
            let body = codec.encrypt(&plaintext, &[9u8; 16]).unwrap();
            prop_assert_eq!(codec.decrypt(&[9u8; 16], &body).unwrap(), plaintext);
        }

        #[test]
        fn test_pad_is_aligned_and_reversible(plaintext in arb_unaligned()) {
            let padded = pad(&plaintext);
            prop_assert_eq!(padded.len() % BLOCK_SIZE, 0);
            prop_assert!(padded.len() - plaintext.len() < BLOCK_SIZE);
            prop_assert_eq!(unpad(padded), plaintext);
        }

        #[test]
        fn test_agreement_symmetric(a in any::<[u8; 32]>(), b in any::<[u8; 32]>()) {
            let alice = KeyPair::from_secret_bytes(a);
            let bob = KeyPair::from_secret_bytes(b);
            let ab = alice.agree(&bob.public_bytes());
            let ba = bob.agree(&alice.public_bytes());
            match (ab, ba) {
                (Ok(ab), Ok(ba)) => prop_assert_eq!(ab, ba),
                (ab, ba) => prop_assert_eq!(ab.is_err(), ba.is_err()),
            }
        }
    }
}
