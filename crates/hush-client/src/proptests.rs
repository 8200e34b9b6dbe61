#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use hush_crypto::{CipherCodec, IvMode, SharedSecret};
    use hush_proto::Envelope;

    use crate::console::{Command, Console};
    use crate::kex::{KeyExchangeMachine, Outcome};
    use crate::peers::PeerKeyStore;

    fn identified(id: &str, mode: IvMode) -> (KeyExchangeMachine, Envelope) {
        let m = KeyExchangeMachine::new(CipherCodec::new(mode));
        let reply = match m.handle(&Envelope::discovery(id, id)).unwrap() {
            Outcome::Identified { reply, .. } => reply,
            other => panic!("unexpected {:?}", other),
        };
        (m, reply)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        // Whatever B types arrives at A unchanged, in either IV mode
        #[test]
        fn test_sealed_text_reaches_peer(
            text in "[^\r\n]{1,200}",
            random_iv in any::<bool>(),
        ) {
            prop_assume!(!text.ends_with(|c: char| (1..=16).contains(&(c as u32))));
            let mode = if random_iv { IvMode::Random } else { IvMode::Fixed };
            let (a, a_key) = identified("a", mode);
            let (b, b_key) = identified("b", mode);
            a.handle(&b_key).unwrap();
            b.handle(&a_key).unwrap();

            let sealed = b.seal_direct("a", &text).unwrap();
            prop_assert_eq!(
                a.handle(&sealed).unwrap(),
                Outcome::Message { from: "b".into(), plaintext: text.clone() }
            );
        }

        // Peer listing is sorted and free of duplicates
        #[test]
        fn test_peer_list_sorted_unique(ids in prop::collection::vec("[a-d]{1,2}", 0..20)) {
            let store = PeerKeyStore::new();
            for id in &ids {
                store.insert(id, SharedSecret::from_bytes(vec![0u8; 32]));
            }
            let listed = store.peers();
            let mut expected = ids.clone();
            expected.sort();
            expected.dedup();
            prop_assert_eq!(listed, expected);
        }

        // An index outside the shown list never selects a peer
        #[test]
        fn test_out_of_range_never_selects(count in 0usize..5, extra in 0usize..100) {
            let peers: Vec<String> = (0..count).map(|i| format!("p{i}")).collect();
            let mut console = Console::new();
            console.menu(peers.clone(), &mut String::new());

            let mut out = String::new();
            let index = count + extra;
            prop_assert_eq!(console.input(&index.to_string(), true, peers.clone(), &mut out), Command::None);
            prop_assert_eq!(console.input("text", true, peers, &mut String::new()), Command::None);
        }
    }
}
