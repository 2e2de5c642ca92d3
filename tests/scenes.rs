use std::{path::PathBuf, time::Duration};

use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use gradient_canvas::{
    Drawing, EngineError, Label, RunStatus, SceneConfig, Task, TickDriver,
};

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

#[tokio::test]
async fn two_blobs_scene_separates_classes() {
    let scene = assert_ok!(SceneConfig::load(demo("two_blobs.json")));
    assert_eq!(scene.tick_interval(), Duration::from_millis(1));

    let mut session = scene.session();
    let run = assert_ok!(session.start(&scene.training));
    let token = CancellationToken::new();

    let summary = TickDriver::new(scene.tick_interval())
        .run(&mut session, run, &token, |_| {})
        .await;
    let summary = assert_ok!(summary);

    assert_eq!(summary.ticks, 300);
    assert_eq!(summary.status, Some(RunStatus::Finished));
    let last = summary.last.unwrap();
    assert_eq!(last.cost, 0.);
    assert!(matches!(last.drawing, Drawing::Boundary { line: Some(_), .. }));

    for sample in session.samples() {
        assert_eq!(session.classify(sample.point), sample.label);
    }
}

#[test]
fn ring_scene_uses_cross_terms() {
    let scene = assert_ok!(SceneConfig::load(demo("ring.json")));
    let Task::Classification { features, .. } = &scene.training.task else {
        panic!("expected a classification task");
    };
    assert_eq!(features.row_len(), 5);
    assert_eq!(scene.tick_interval(), Duration::from_millis(16));

    let mut session = scene.session();
    let run = assert_ok!(session.start(&scene.training));
    let report = assert_ok!(session.tick(run)).unwrap();
    assert!(matches!(report.drawing, Drawing::Boundary { line: None, .. }));
    assert_eq!(
        session
            .samples()
            .iter()
            .filter(|s| s.label == Some(Label::Positive))
            .count(),
        3
    );
}

#[test]
fn parabola_scene_draws_a_curve() {
    let scene = assert_ok!(SceneConfig::load(demo("parabola.json")));
    let mut session = scene.session();
    let run = assert_ok!(session.start(&scene.training));

    let first = assert_ok!(session.tick(run)).unwrap();
    assert_eq!(first.coefficients.len(), 3);
    assert_eq!(first.iterations_left, 9999);
    let Drawing::Curve { points } = first.drawing else {
        panic!("expected a curve");
    };
    assert_eq!(points.len(), 500);
    assert!(points.windows(2).all(|w| w[0].x < w[1].x));
}

#[test]
fn missing_scene_is_an_io_error() {
    let err = SceneConfig::load(demo("does-not-exist.json")).unwrap_err();
    assert!(matches!(err, EngineError::Io(_)));
}
