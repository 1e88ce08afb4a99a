//! Property-based tests for the player
//!
//! Random sequences of transport and playlist operations must never leave
//! more than one muse playing, and the sync ticker must run exactly while
//! the selected muse plays.

mod common;

use common::{settle, FakeFactory};
use muse_playback::{MuseMeta, MuseState, Player, PlayerConfig};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Add,
    Remove(usize),
    Load(usize),
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    SkipTo(usize),
    Seek(f64),
    Finish(usize),
    SetAutoPlay(bool),
    SetRememberTime(bool),
    Empty,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Add),
        1 => (0usize..6).prop_map(Op::Remove),
        1 => (0usize..6).prop_map(Op::Load),
        3 => Just(Op::Play),
        2 => Just(Op::Pause),
        1 => Just(Op::Stop),
        2 => Just(Op::Next),
        2 => Just(Op::Previous),
        1 => (0usize..6).prop_map(Op::SkipTo),
        1 => (0.0f64..1.0).prop_map(Op::Seek),
        2 => (0usize..6).prop_map(Op::Finish),
        1 => any::<bool>().prop_map(Op::SetAutoPlay),
        1 => any::<bool>().prop_map(Op::SetRememberTime),
        1 => Just(Op::Empty),
    ]
}

async fn apply(player: &Player, factory: &FakeFactory, op: &Op, added: &mut usize) {
    let muses = player.muses().await;
    let id_at = |index: usize| muses.get(index).map(|muse| muse.id.clone());

    match op {
        Op::Add => {
            let id = format!("m{}", added);
            *added += 1;
            player
                .add_muse(&format!("{}.mp3", id), &id, MuseMeta::default(), false)
                .await
                .unwrap();
        }
        Op::Remove(index) => {
            if let Some(id) = id_at(*index) {
                player.remove_muse_by_id(&id).await.unwrap();
            }
        }
        Op::Load(index) => {
            if let Some(id) = id_at(*index) {
                player.load(Some(&id)).await;
            }
        }
        Op::Play => {
            player.play().await;
        }
        Op::Pause => {
            player.pause().await;
        }
        Op::Stop => {
            player.stop().await;
        }
        Op::Next => {
            player.next().await;
        }
        Op::Previous => {
            player.previous().await;
        }
        Op::SkipTo(index) => {
            player.skip_to_index(*index).await;
        }
        Op::Seek(fraction) => {
            let _ = player.set_current_percentage(*fraction).await;
        }
        Op::Finish(index) => {
            if let Some(muse) = muses.get(*index) {
                factory.finish(&muse.src);
                settle().await;
            }
        }
        Op::SetAutoPlay(enabled) => player.set_auto_play(*enabled),
        Op::SetRememberTime(enabled) => player.set_remember_time(*enabled),
        Op::Empty => player.empty().await,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn at_most_one_muse_plays(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async {
            let factory = FakeFactory::new();
            let player = Player::new(factory.clone(), PlayerConfig::default());
            let mut added = 0;

            for op in &ops {
                apply(&player, &factory, op, &mut added).await;

                let playing = player
                    .muses()
                    .await
                    .iter()
                    .filter(|muse| muse.state == MuseState::Playing)
                    .count();
                assert!(playing <= 1, "{} muses playing after {:?}", playing, op);
                let sounding = factory.playing_count();
                assert!(sounding <= 1, "{} resources playing after {:?}", sounding, op);
                let playing = player.playing().await;
                assert_eq!(player.is_syncing(), playing, "ticker out of step after {:?}", op);
            }
        });
    }

    #[test]
    fn selection_stays_in_bounds(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async {
            let factory = FakeFactory::new();
            let player = Player::new(factory.clone(), PlayerConfig::default());
            let mut added = 0;

            for op in &ops {
                apply(&player, &factory, op, &mut added).await;

                let len = player.len().await;
                match player.current_index().await {
                    Some(index) => assert!(index < len, "index {} of {} after {:?}", index, len, op),
                    None => assert_eq!(len, 0, "no selection in a non-empty playlist after {:?}", op),
                }
            }
        });
    }
}
