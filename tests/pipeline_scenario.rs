use anyhow::Result;
use std::sync::{Arc, Mutex};

use scene_narrator::detect::{Labels, ModelOutput, ScriptedBackend, SharedBackend};
use scene_narrator::overlay::{slot_color, OverlayRenderer};
use scene_narrator::{Frame, FrameProcessor};

fn three_slot_output() -> ModelOutput {
    ModelOutput {
        // [top, left, bottom, right] per slot
        locations: vec![
            0.10, 0.10, 0.50, 0.40, // cat
            0.20, 0.20, 0.60, 0.60, // dog, below threshold
            0.50, 0.55, 0.95, 0.90, // person
        ],
        classes: vec![0.0, 1.0, 2.0],
        scores: vec![0.9, 0.3, 0.7],
    }
}

fn processor(outputs: Vec<ModelOutput>) -> FrameProcessor {
    let backend: SharedBackend = Arc::new(Mutex::new(ScriptedBackend::new(outputs, (32, 32))));
    FrameProcessor::new(backend, Labels::from_lines("cat\ndog\nperson\n"))
}

#[test]
fn filters_by_confidence_and_draws_surviving_slots() -> Result<()> {
    let mut processor = processor(vec![three_slot_output()]);
    let frame = Frame::from_rgb(vec![40; 200 * 170 * 3], 200, 170)?;

    let analysis = processor.process(&frame)?;
    let slots: Vec<usize> = analysis.detections.iter().map(|d| d.slot).collect();
    assert_eq!(slots, vec![0, 2]);
    assert_eq!(analysis.tally.count("cat"), 1);
    assert_eq!(analysis.tally.count("person"), 1);
    assert_eq!(analysis.tally.count("dog"), 0);
    assert_eq!(analysis.tally.to_string(), "1 cat, 1 person");

    let annotated = OverlayRenderer::new().render(&frame, &analysis.detections)?;
    assert_eq!(annotated.labels(), vec!["cat", "person"]);
    assert_eq!(annotated.boxes[0].color, slot_color(0));
    assert_eq!(annotated.boxes[1].color, slot_color(2));

    // The box keeps the original frame's geometry, not the model input size.
    let cat = annotated.boxes[0].rect;
    assert_eq!((cat.left(), cat.top()), (20, 17));
    assert_eq!((cat.width(), cat.height()), (60, 68));

    let stroke = 170 / 85;
    for inset in 0..stroke {
        let x = (cat.left() + inset) as u32;
        let y = (cat.top() + cat.height() as i32 / 2) as u32;
        assert_eq!(*annotated.image.get_pixel(x, y), slot_color(0));
    }
    Ok(())
}

#[test]
fn empty_output_gives_empty_tally() -> Result<()> {
    let mut processor = processor(vec![ModelOutput::default()]);
    let frame = Frame::from_rgb(vec![0; 16 * 16 * 3], 16, 16)?;
    let analysis = processor.process(&frame)?;
    assert!(analysis.detections.is_empty());
    assert!(analysis.tally.is_empty());
    Ok(())
}

#[test]
fn unknown_class_drops_the_frame() -> Result<()> {
    let mut processor = processor(vec![ModelOutput {
        locations: vec![0.0, 0.0, 0.5, 0.5],
        classes: vec![7.0],
        scores: vec![0.95],
    }]);
    let frame = Frame::from_rgb(vec![0; 16 * 16 * 3], 16, 16)?;
    assert!(processor.process(&frame).is_err());

    assert!(processor.process_snapshot(Some(&frame)).is_none());
    assert!(processor.process_snapshot(None).is_none());
    let stats = processor.stats();
    assert_eq!(stats.frames_failed, 1);
    assert_eq!(stats.frames_skipped, 1);
    assert_eq!(stats.frames_processed, 0);
    Ok(())
}
