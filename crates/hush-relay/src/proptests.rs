#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use proptest::prelude::*;

    use hush_proto::{Envelope, EnvelopeKind};

    use crate::hub::{ClientId, Hub};
    use crate::mailbox::{mailbox, Delivery};
    use crate::metrics::RelayMetrics;
    use crate::router::{route, Route};

    /// Apply register (`true`) / unregister (`false`) operations to a live hub.
    /// Registrations mint fresh ids; unregisters pick from a wider id range so
    /// unknown and already departed ids are covered.
    fn run_ops(ops: &[(bool, u8)]) -> (Vec<String>, Vec<String>, Vec<String>, Vec<String>) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let hub = Hub::spawn(Arc::new(RelayMetrics::new().unwrap()));
            let mut receivers = Vec::new();
            let mut live = BTreeSet::new();
            let mut known = Vec::new();
            let mut next = 0usize;

            for &(register, n) in ops {
                if register {
                    let id = format!("c{next}");
                    next += 1;
                    let (mb, rx) = mailbox(ops.len() + 1);
                    receivers.push(rx);
                    hub.register(ClientId::from(id.as_str()), mb).await.unwrap();
                    live.insert(id.clone());
                    known.push(id);
                } else {
                    let id = format!("c{}", n % 48);
                    hub.unregister(ClientId::from(id.as_str())).await.unwrap();
                    live.remove(&id);
                }
                // Queries are served last, so this waits out the op above
                hub.live_ids().await.unwrap();
            }

            let got_live = hub
                .live_ids()
                .await
                .unwrap()
                .iter()
                .map(ToString::to_string)
                .collect();
            let got_known = hub
                .known_ids()
                .await
                .unwrap()
                .iter()
                .map(ToString::to_string)
                .collect();
            (got_live, live.into_iter().collect(), got_known, known)
        })
    }

    proptest! {
        // Routing agrees with the envelope's own broadcast rule
        #[test]
        fn test_route_matches_envelope(
            code in prop_oneof![Just(100i64), Just(101i64), Just(102i64), any::<i64>()],
            sender in "[a-f0-9-]{0,36}",
            target in "[a-f0-9-]{0,36}",
        ) {
            let env = Envelope {
                kind: EnvelopeKind::from_code(code),
                sender,
                target,
                ..Default::default()
            };
            let frame = env.encode().unwrap();
            prop_assert_eq!(route(&frame).is_broadcast(), env.is_broadcast());
        }

        // Arbitrary non-JSON text is forwarded to everyone
        #[test]
        fn test_garbage_is_undecodable(text in "[a-z ]{1,32}") {
            prop_assert_eq!(route(&text), Route::Undecodable);
        }

        // The live set matches a model after any register/unregister sequence
        #[test]
        fn test_live_set_matches_model(ops in prop::collection::vec((any::<bool>(), any::<u8>()), 0..40)) {
            let (live, expected_live, known, expected_known) = run_ops(&ops);
            prop_assert_eq!(live, expected_live);
            prop_assert_eq!(known, expected_known);
        }

        // A mailbox queues exactly `capacity` frames and reports Full after
        #[test]
        fn test_mailbox_capacity(capacity in 1usize..64, extra in 1usize..16) {
            let (mb, _rx) = mailbox(capacity);
            for i in 0..capacity {
                prop_assert_eq!(mb.deliver(i.to_string()), Delivery::Queued);
            }
            for i in 0..extra {
                prop_assert_eq!(mb.deliver(i.to_string()), Delivery::Full);
            }
        }
    }
}
