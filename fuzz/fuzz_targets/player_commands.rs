#![no_main]

use libfuzzer_sys::fuzz_target;
use sonata::{CatalogItem, NullAudioEngine, Player, Settings, event_channel};
use std::time::{Duration, Instant};

fuzz_target!(|data: &[u8]| {
    let (tx, rx) = event_channel();
    let Ok(mut player) = Player::new(NullAudioEngine::new(tx), rx, Settings::default()) else {
        return;
    };

    let len = data.first().map_or(0, |byte| usize::from(*byte) % 16);
    let items: Vec<CatalogItem> = (0..len)
        .map(|idx| {
            CatalogItem::new(
                format!("track {idx}"),
                "artist",
                "album",
                60.0,
                format!("track_{idx}.mp3"),
                None,
            )
        })
        .collect();
    player.set_queue(items.clone());

    let mut now = Instant::now();
    for byte in data.iter().skip(1) {
        let _ = match byte % 9 {
            0 => player.next(),
            1 => player.previous(),
            2 => player.shuffle(),
            3 => player.play_random(),
            4 => player.toggle(),
            5 => player.seek_fraction(f64::from(*byte) / 255.0),
            6 => match items.get(usize::from(*byte) % len.max(1)) {
                Some(item) => player.play(item),
                None => Ok(()),
            },
            7 => {
                now += Duration::from_millis(u64::from(*byte) * 10);
                player.tick(now);
                Ok(())
            }
            _ => {
                player.set_queue(items.clone());
                Ok(())
            }
        };

        if let Some(index) = player.current_index() {
            assert!(index < player.queue().len());
        }
        let progress = player.progress();
        assert!((0.0..=1.0).contains(&progress.fraction));
    }
});
