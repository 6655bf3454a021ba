use scenereel::{SceneDocument, SceneDuration, SceneSpec, SceneTimeline};

/// Deterministic scene lists mixing explicit, auto, and narrated durations.
fn scene_lists() -> Vec<Vec<SceneSpec>> {
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };

    (0..64)
        .map(|_| {
            let n = 1 + (next() % 8) as usize;
            (0..n)
                .map(|_| {
                    let r = next();
                    let words = (r >> 8) % 15;
                    SceneSpec {
                        html: "<p>x</p>".to_owned(),
                        speech: (words > 0)
                            .then(|| vec!["word"; words as usize].join(" ")),
                        duration: match r % 3 {
                            0 => SceneDuration::Auto,
                            1 => SceneDuration::Seconds(0.1 + (r >> 16) as f64 % 5000.0 / 1000.0),
                            _ => SceneDuration::Seconds(0.333),
                        },
                        ..SceneSpec::default()
                    }
                })
                .collect()
        })
        .collect()
}

#[test]
fn intervals_are_contiguous_and_cover_the_timeline() {
    for specs in scene_lists() {
        let tl = SceneTimeline::build(&specs);
        let scenes = tl.scenes();
        assert_eq!(scenes.len(), specs.len());
        assert_eq!(scenes[0].start_ms, 0.0);
        for pair in scenes.windows(2) {
            assert_eq!(pair[0].end_ms, pair[1].start_ms);
            assert!(pair[0].end_ms > pair[0].start_ms);
        }
        assert_eq!(tl.total_duration_ms(), scenes[scenes.len() - 1].end_ms);
    }
}

#[test]
fn locate_returns_the_containing_interval() {
    for specs in scene_lists() {
        let tl = SceneTimeline::build(&specs);
        for (i, scene) in tl.scenes().iter().enumerate() {
            assert_eq!(tl.locate(scene.start_ms), Some(i));
            let mid = scene.start_ms + scene.duration_ms() / 2.0;
            assert_eq!(tl.locate(mid), Some(i));
        }
        assert_eq!(tl.locate(tl.total_duration_ms()), Some(tl.len() - 1));
    }
}

#[test]
fn forward_scan_agrees_with_locate() {
    for specs in scene_lists() {
        let tl = SceneTimeline::build(&specs);
        let mut idx = 0;
        let mut t = 0.0;
        while t < tl.total_duration_ms() {
            idx = tl.advance_from(idx, t);
            assert_eq!(Some(idx), tl.locate(t), "t={t}");
            t += 37.0;
        }
    }
}

#[test]
fn narrated_auto_scene_uses_word_pacing() {
    let doc = SceneDocument::from_json_str(
        r#"{"scenes":[{"html":"","speech":"one two three four five six seven eight nine ten"}]}"#,
    )
    .unwrap();
    let tl = SceneTimeline::build(&doc.scenes);
    assert_eq!(tl.total_duration_ms(), 3500.0);
}

#[test]
fn fixture_document_totals_three_seconds() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/two_scenes.json");
    let doc = SceneDocument::from_path(&path).unwrap();
    let tl = SceneTimeline::build(&doc.scenes);
    assert_eq!(tl.scenes()[0].end_ms, 1000.0);
    assert_eq!(tl.total_duration_ms(), 3000.0);
}
