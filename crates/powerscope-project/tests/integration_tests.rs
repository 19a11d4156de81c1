//! Integration tests for project range aggregation and history

use powerscope_domain::{attribs, Model, ModelKind, Output, PlotData, Point, Series};
use powerscope_project::{HistoryKind, PlotSlot, Project, ProjectEvent};

/// Helper to create a solved-looking t-test model
fn create_model(output: Output, n: f64, delta: f64) -> Model {
    Model::new(
        ModelKind::TTest,
        output,
        attribs([
            ("alpha", 0.05),
            ("power", 0.8),
            ("delta", delta),
            ("sigma", 10.0),
            ("n", n),
        ]),
    )
    .unwrap()
}

#[test]
fn test_power_output_end_to_end() {
    let mut project = Project::new(ModelKind::TTest);
    project.add_model(create_model(Output::Power, 33.0, 5.0)).unwrap();

    let ranges = project.ranges();
    assert_eq!(ranges.delta.as_ref().unwrap().to_array(), [-25.0, 25.0]);
    assert_eq!(ranges.power.as_ref().unwrap().to_array(), [0.01, 1.0]);
    assert_eq!(
        project.range_for(PlotSlot::TopY).unwrap().description.as_deref(),
        Some("Power")
    );
}

#[test]
fn test_solver_series_drive_derived_ranges() {
    let mut project = Project::new(ModelKind::TTest);
    project.add_model(create_model(Output::Power, 33.0, 5.0)).unwrap();

    let mut response = project.model(0).unwrap().snapshot();
    response.data = PlotData::default().with_series(
        Series::PowerVsN,
        vec![
            Point { x: None, y: 0.0 },
            Point::new(4.0, 0.05),
            Point::new(33.0, 0.8),
            Point::new(120.0, 0.999),
        ],
    );
    project.apply_solver_result(0, &response, None).unwrap();

    // power spans [0.01, 1]: the first defined sample is already above 0.01
    assert_eq!(project.ranges().n.unwrap().to_array(), [4.0, 120.0]);
}

#[test]
fn test_delta_output_combines_models() {
    let mut project = Project::new(ModelKind::TTest);
    project.add_model(create_model(Output::DetectableAlternative, 33.0, 4.0)).unwrap();
    project.add_model(create_model(Output::DetectableAlternative, 33.0, 10.0)).unwrap();

    assert_eq!(project.ranges().delta.unwrap().to_array(), [2.0, 15.0]);

    project.remove_model(1).unwrap();
    assert_eq!(project.ranges().delta.unwrap().to_array(), [2.0, 6.0]);
}

#[test]
fn test_history_is_append_only() {
    let mut project = Project::new(ModelKind::TTest);
    project.add_model(create_model(Output::Power, 33.0, 5.0)).unwrap();
    project.update_model(0, &attribs([("n", 40.0)])).unwrap();
    let response = project.model(0).unwrap().snapshot();
    project.apply_solver_result(0, &response, Some("n")).unwrap();
    project.remove_model(0).unwrap();

    let kinds: Vec<HistoryKind> = project.change_history().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![HistoryKind::Add, HistoryKind::Change, HistoryKind::Remove]);

    let line = project.describe_change(&project.change_history()[1], false);
    assert!(line.starts_with("Changed n in model #1: { \"output\": \"power\""));
}

#[test]
fn test_range_events_are_batched() {
    let mut project = Project::new(ModelKind::TTest);
    let mut rx = project.subscribe();
    project.add_model(create_model(Output::Power, 33.0, 5.0)).unwrap();

    let mut range_events = 0;
    while let Ok(event) = rx.try_recv() {
        if let ProjectEvent::RangesChanged { event } = event {
            range_events += 1;
            assert!(event.changes.contains_key("power"));
            assert!(event.changes.contains_key("delta"));
            assert!(event.changes.contains_key("pSpace"));
        }
    }
    assert_eq!(range_events, 1);
}

#[test]
fn test_snapshot_clone_is_independent() {
    let mut project = Project::new(ModelKind::TTest);
    project.add_model(create_model(Output::Power, 33.0, 5.0)).unwrap();
    let copy = project.clone();
    project.update_model(0, &attribs([("n", 50.0)])).unwrap();
    assert_eq!(copy.model(0).unwrap().number("n"), Some(33.0));
    assert_eq!(project.model(0).unwrap().number("n"), Some(50.0));
}
