//! Property tests for relay ordering

use super::*;
use crate::llm::{Segment, SegmentBody};
use futures::StreamExt;
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn arb_segments() -> impl Strategy<Value = Vec<Vec<String>>> {
    proptest::collection::vec(proptest::collection::vec("[a-z ]{1,6}", 0..6), 1..5)
}

/// Feed a segment from its own task so producers overlap with switches.
fn spawn_producer(chunks: Vec<String>) -> SegmentBody {
    let (mut writer, segment) = Segment::channel(2);
    tokio::spawn(async move {
        for chunk in chunks {
            if !writer.push_text(&chunk).await {
                return;
            }
            tokio::task::yield_now().await;
        }
    });
    segment.into_parts().0
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Output is the concatenation of all segments in switch order
    #[test]
    fn prop_output_is_concatenation(segments in arb_segments(), buffer in 1usize..4) {
        let expected: String = segments.iter().flatten().cloned().collect();
        let count = segments.len() as u32;

        let (output, switches) = runtime().block_on(async move {
            let (relay, stream) = RelayChannel::new(buffer);
            let reader = tokio::spawn(async move {
                stream
                    .map(|item| item.map(|b| String::from_utf8(b.to_vec()).unwrap()))
                    .collect::<Vec<_>>()
                    .await
            });

            let mut iter = segments.into_iter();
            if let Some(first) = iter.next() {
                relay.attach(spawn_producer(first)).await.unwrap();
            }
            for next in iter {
                // Returns once the previous producer has drained
                relay.switch_source(spawn_producer(next)).await.unwrap();
            }
            relay.close().await;

            let items = tokio::time::timeout(std::time::Duration::from_secs(5), reader)
                .await
                .expect("relay stream should end")
                .unwrap();
            let text: Vec<String> = items.into_iter().map(|i| i.unwrap()).collect();
            (text.concat(), relay.switches())
        });

        prop_assert_eq!(output, expected);
        prop_assert_eq!(switches, count - 1);
    }
}
