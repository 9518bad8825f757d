use theftwatch::{BYTETracker, Detection, TrackerConfig};

fn single_hit_config() -> TrackerConfig {
    TrackerConfig {
        min_hits: 1,
        ..TrackerConfig::default()
    }
}

#[test]
fn test_basic_tracking() {
    let mut tracker = BYTETracker::new(single_hit_config());

    // Frame 1: One detection
    let tracks1 = tracker.update(vec![Detection::new(100.0, 100.0, 200.0, 200.0, 0.9, 24)]);

    // 0.9 clears track_thresh + 0.1 and one hit is enough to confirm
    assert_eq!(tracks1.len(), 1);
    let id1 = tracks1[0].track_id;
    assert!(tracks1[0].confirmed);

    // Frame 2: Same object moved slightly
    let tracks2 = tracker.update(vec![Detection::new(105.0, 105.0, 205.0, 205.0, 0.9, 24)]);
    assert_eq!(tracks2.len(), 1);
    assert_eq!(tracks2[0].track_id, id1); // ID should persist

    // Frame 3: Object occluded (low score), recovered by the second association
    let tracks3 = tracker.update(vec![Detection::new(110.0, 110.0, 210.0, 210.0, 0.2, 24)]);
    assert_eq!(tracks3.len(), 1);
    assert_eq!(tracks3[0].track_id, id1);

    // Frame 4: Object disappears
    let tracks4 = tracker.update(vec![]);
    assert_eq!(tracks4.len(), 0);

    // Frame 5: Object reappears and is refound within max_age
    let tracks5 = tracker.update(vec![Detection::new(115.0, 115.0, 215.0, 215.0, 0.9, 24)]);
    assert_eq!(tracks5.len(), 1);
    assert_eq!(tracks5[0].track_id, id1);
    assert_eq!(tracks5[0].class_id, 24);
}

#[test]
fn test_lost_track_does_not_match_other_class() {
    let mut tracker = BYTETracker::new(single_hit_config());
    let bag = tracker.update(vec![Detection::new(100.0, 100.0, 200.0, 200.0, 0.9, 24)])[0].track_id;
    tracker.update(vec![]);

    // A person where the bag was gets its own identity
    let tracks = tracker.update(vec![Detection::new(100.0, 100.0, 200.0, 200.0, 0.9, 0)]);
    assert_eq!(tracks.len(), 1);
    assert_ne!(tracks[0].track_id, bag);
    assert_eq!(tracks[0].class_id, 0);
}

#[test]
fn test_id_assignment_is_deterministic() {
    let frames: Vec<Vec<Detection>> = (0..20)
        .map(|i| {
            let dx = i as f32 * 3.0;
            let mut dets = vec![
                Detection::new(50.0 + dx, 60.0, 110.0 + dx, 220.0, 0.92, 0),
                Detection::new(300.0, 200.0, 340.0, 250.0, 0.85, 24),
            ];
            if i % 7 == 3 {
                dets.pop();
            }
            if i > 5 {
                dets.push(Detection::new(400.0 - dx, 60.0, 460.0 - dx, 220.0, 0.88, 0));
            }
            dets
        })
        .collect();

    let run = || {
        let mut tracker = BYTETracker::new(TrackerConfig::default());
        frames
            .iter()
            .map(|dets| {
                tracker
                    .update(dets.clone())
                    .into_iter()
                    .map(|t| (t.track_id, t.class_id))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(run(), run());
}
