//! Property tests for idempotent ingestion across hydrate, poll and push.

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use worldline_core::config::WorldlineConfig;
use worldline_core::metrics::SyncCounters;
use worldline_core::types::{AgentId, FeedPost, Mode};
use worldline_core::world::WorldState;
use worldline_remote::types::{PushMessage, RemoteBatch, RemoteWorldState};
use worldline_session::SyncCoordinator;

const REMOTE_TICK: u64 = 50;

#[derive(Debug, Clone)]
enum Delivery {
    Push(u8),
    Poll(Vec<u8>),
}

fn post(n: u8) -> FeedPost {
    FeedPost {
        id: format!("p{n}"),
        tick: u64::from(n),
        author_id: AgentId(1),
        author_name: "Ana".into(),
        emotion: 0.0,
        content: String::new(),
        likes: 0,
    }
}

fn batch(posts: &[u8]) -> RemoteBatch {
    let mut newest_first: Vec<u8> = posts.to_vec();
    newest_first.sort_unstable_by(|a, b| b.cmp(a));
    RemoteBatch {
        state: RemoteWorldState { tick: REMOTE_TICK, speed: 1.0, ..RemoteWorldState::default() },
        feed: newest_first.into_iter().map(post).collect(),
        ..RemoteBatch::default()
    }
}

fn delivery() -> impl Strategy<Value = Delivery> {
    prop_oneof![
        (0u8..80).prop_map(Delivery::Push),
        prop::collection::vec(0u8..80, 0..12).prop_map(Delivery::Poll),
    ]
}

proptest! {
    #[test]
    fn every_visible_item_is_ingested_exactly_once(
        hydrate in prop::collection::vec(0u8..80, 0..10),
        deliveries in prop::collection::vec(delivery(), 0..40),
    ) {
        let config = WorldlineConfig::default();
        let mut world = WorldState::for_mode(&config, Mode::Remote);
        let mut coordinator = SyncCoordinator::new(1024, Arc::new(SyncCounters::new()));

        let ticket = coordinator.begin_hydrate().expect("cold coordinator");
        coordinator.finish_hydrate(ticket, Ok(batch(&hydrate)), &mut world);

        let mut expected: BTreeSet<u8> = hydrate.iter().copied().filter(|&n| u64::from(n) <= REMOTE_TICK).collect();
        for d in deliveries {
            match d {
                Delivery::Push(n) => {
                    coordinator.on_push(PushMessage::PostCreated { post: post(n) }, &mut world);
                    if u64::from(n) <= REMOTE_TICK {
                        expected.insert(n);
                    }
                }
                Delivery::Poll(posts) => {
                    let ticket = coordinator.begin_poll().expect("hydrated, nothing in flight");
                    coordinator.finish_poll(ticket, Ok(batch(&posts)), &mut world);
                    expected.extend(posts.into_iter().filter(|&n| u64::from(n) <= REMOTE_TICK));
                }
            }
        }

        let ids: Vec<&str> = world.feed.iter().map(|p| p.id.as_str()).collect();
        let unique: BTreeSet<&str> = ids.iter().copied().collect();
        prop_assert_eq!(ids.len(), unique.len(), "no id appears twice");
        let want: BTreeSet<String> = expected.iter().map(|n| format!("p{n}")).collect();
        let got: BTreeSet<String> = unique.into_iter().map(str::to_string).collect();
        prop_assert_eq!(got, want);
        prop_assert!(world.feed.iter().all(|p| p.tick <= REMOTE_TICK));
    }
}
