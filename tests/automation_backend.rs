//! Integration tests for the live-application backend.
//!
//! A scripted in-memory host stands in for the CAD application. It records
//! every object-model call so the tests can check the exact sequence the
//! backend issues: attach versus launch, document selection, hatch
//! construction, angle conversion and recovery from a lost document handle.

use std::cell::RefCell;
use std::f64::consts::FRAC_PI_2;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use cad_drawing_mcp::drawing::automation::{
    AutomationBackend, CadApplication, CadConnector, CadDocument, CadProduct, ObjectId, Property,
    PATTERN_TYPE_PREDEFINED,
};
use cad_drawing_mcp::drawing::{
    ArcParams, BackendSettings, DimensionParams, DrawingBackend, DrawingError, DrawingResult,
    EntityStyle, HatchParams, LineParams, PolylineParams, RectangleParams, SessionState,
    TextParams,
};
use cad_drawing_mcp::geometry::Point3;

// =============================================================================
// Scripted host
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    AddLayer(String),
    LayerColor(String, i16),
    ActiveLayer(String),
    Line([f64; 3], [f64; 3]),
    Circle([f64; 3], f64),
    Arc(f64, f64),
    Ellipse([f64; 3], [f64; 3], f64),
    Polyline(Vec<f64>),
    Text(String, f64),
    Hatch(i32, String, bool),
    Dimension([f64; 3], [f64; 3], [f64; 3]),
    Set(String, Property),
    AppendLoop(String, Vec<String>),
    Evaluate(String),
    Regen,
    Zoom,
    SaveAs(PathBuf),
}

#[derive(Debug, Default)]
struct Host {
    running: bool,
    installed: bool,
    attaches: usize,
    launches: usize,
    last_prog_id: String,
    visible: bool,
    open_documents: usize,
    documents_added: usize,
    layers: Vec<String>,
    calls: Vec<Call>,
    next_id: u32,
    connection_lost: bool,
}

type Shared = Rc<RefCell<Host>>;

fn host() -> Shared {
    Rc::new(RefCell::new(Host {
        running: true,
        installed: true,
        open_documents: 1,
        layers: vec!["0".to_string()],
        ..Host::default()
    }))
}

struct FakeConnector(Shared);
struct FakeApp(Shared);
struct FakeDoc(Shared);

impl CadConnector for FakeConnector {
    fn is_installed(&self, _prog_id: &str) -> bool {
        self.0.borrow().installed
    }

    fn attach(&self, prog_id: &str) -> DrawingResult<Box<dyn CadApplication>> {
        let mut host = self.0.borrow_mut();
        host.attaches += 1;
        host.last_prog_id = prog_id.to_string();
        if host.running {
            Ok(Box::new(FakeApp(Rc::clone(&self.0))))
        } else {
            Err(DrawingError::connection(prog_id, "no running instance"))
        }
    }

    fn launch(&self, prog_id: &str) -> DrawingResult<Box<dyn CadApplication>> {
        let mut host = self.0.borrow_mut();
        host.launches += 1;
        host.last_prog_id = prog_id.to_string();
        if host.installed {
            host.running = true;
            Ok(Box::new(FakeApp(Rc::clone(&self.0))))
        } else {
            Err(DrawingError::connection(prog_id, "not installed"))
        }
    }
}

impl CadApplication for FakeApp {
    fn set_visible(&mut self, visible: bool) -> DrawingResult<()> {
        self.0.borrow_mut().visible = visible;
        Ok(())
    }

    fn document_count(&self) -> DrawingResult<usize> {
        Ok(self.0.borrow().open_documents)
    }

    fn active_document(&mut self) -> DrawingResult<Option<Box<dyn CadDocument>>> {
        Ok(Some(Box::new(FakeDoc(Rc::clone(&self.0)))))
    }

    fn add_document(&mut self) -> DrawingResult<Box<dyn CadDocument>> {
        let mut host = self.0.borrow_mut();
        host.open_documents += 1;
        host.documents_added += 1;
        Ok(Box::new(FakeDoc(Rc::clone(&self.0))))
    }
}

impl FakeDoc {
    fn check(&self) -> DrawingResult<()> {
        if self.0.borrow().connection_lost {
            return Err(DrawingError::Disconnected);
        }
        Ok(())
    }

    fn record(&self, call: Call) -> DrawingResult<()> {
        self.check()?;
        self.0.borrow_mut().calls.push(call);
        Ok(())
    }

    fn create(&self, call: Call) -> DrawingResult<ObjectId> {
        self.record(call)?;
        let mut host = self.0.borrow_mut();
        host.next_id += 1;
        Ok(ObjectId(format!("obj{}", host.next_id)))
    }
}

impl CadDocument for FakeDoc {
    fn name(&self) -> DrawingResult<String> {
        self.check()?;
        Ok("Drawing1.dwg".to_string())
    }

    fn layer_names(&self) -> DrawingResult<Vec<String>> {
        self.check()?;
        Ok(self.0.borrow().layers.clone())
    }

    fn add_layer(&mut self, name: &str) -> DrawingResult<()> {
        self.record(Call::AddLayer(name.to_string()))?;
        self.0.borrow_mut().layers.push(name.to_string());
        Ok(())
    }

    fn set_layer_color(&mut self, name: &str, color: i16) -> DrawingResult<()> {
        self.record(Call::LayerColor(name.to_string(), color))
    }

    fn set_active_layer(&mut self, name: &str) -> DrawingResult<()> {
        self.record(Call::ActiveLayer(name.to_string()))
    }

    fn add_line(&mut self, start: [f64; 3], end: [f64; 3]) -> DrawingResult<ObjectId> {
        self.create(Call::Line(start, end))
    }

    fn add_circle(&mut self, center: [f64; 3], radius: f64) -> DrawingResult<ObjectId> {
        self.create(Call::Circle(center, radius))
    }

    fn add_arc(
        &mut self,
        _center: [f64; 3],
        _radius: f64,
        start_angle: f64,
        end_angle: f64,
    ) -> DrawingResult<ObjectId> {
        self.create(Call::Arc(start_angle, end_angle))
    }

    fn add_ellipse(
        &mut self,
        center: [f64; 3],
        major_axis: [f64; 3],
        ratio: f64,
    ) -> DrawingResult<ObjectId> {
        self.create(Call::Ellipse(center, major_axis, ratio))
    }

    fn add_polyline(&mut self, vertices: &[f64]) -> DrawingResult<ObjectId> {
        self.create(Call::Polyline(vertices.to_vec()))
    }

    fn add_text(
        &mut self,
        text: &str,
        _insertion: [f64; 3],
        height: f64,
    ) -> DrawingResult<ObjectId> {
        self.create(Call::Text(text.to_string(), height))
    }

    fn add_hatch(
        &mut self,
        pattern_type: i32,
        pattern_name: &str,
        associative: bool,
    ) -> DrawingResult<ObjectId> {
        self.create(Call::Hatch(
            pattern_type,
            pattern_name.to_string(),
            associative,
        ))
    }

    fn add_dim_aligned(
        &mut self,
        point1: [f64; 3],
        point2: [f64; 3],
        text_position: [f64; 3],
    ) -> DrawingResult<ObjectId> {
        self.create(Call::Dimension(point1, point2, text_position))
    }

    fn set_property(&mut self, object: &ObjectId, property: Property) -> DrawingResult<()> {
        self.record(Call::Set(object.0.clone(), property))
    }

    fn append_outer_loop(&mut self, hatch: &ObjectId, boundary: &[ObjectId]) -> DrawingResult<()> {
        self.record(Call::AppendLoop(
            hatch.0.clone(),
            boundary.iter().map(|id| id.0.clone()).collect(),
        ))
    }

    fn evaluate(&mut self, hatch: &ObjectId) -> DrawingResult<()> {
        self.record(Call::Evaluate(hatch.0.clone()))
    }

    fn regen(&mut self) -> DrawingResult<()> {
        self.record(Call::Regen)
    }

    fn zoom_extents(&mut self) -> DrawingResult<()> {
        self.record(Call::Zoom)
    }

    fn save_as(&mut self, path: &Path) -> DrawingResult<()> {
        self.record(Call::SaveAs(path.to_path_buf()))
    }
}

fn settings() -> BackendSettings {
    BackendSettings {
        startup_wait: Duration::ZERO,
        command_delay: Duration::ZERO,
        ..BackendSettings::default()
    }
}

fn backend(host: &Shared) -> AutomationBackend {
    AutomationBackend::new(Box::new(FakeConnector(Rc::clone(host))), settings())
}

fn ready(host: &Shared) -> AutomationBackend {
    let mut backend = backend(host);
    assert!(backend.start_session());
    host.borrow_mut().calls.clear();
    backend
}

/// Calls recorded since the last clear, without view refreshes.
fn drawn(host: &Shared) -> Vec<Call> {
    host.borrow()
        .calls
        .iter()
        .filter(|c| **c != Call::Regen)
        .cloned()
        .collect()
}

fn line() -> LineParams {
    LineParams {
        start_point: Point3::default(),
        end_point: Point3::xy(10.0, 10.0),
    }
}

// =============================================================================
// Session establishment
// =============================================================================

#[test]
fn attaches_to_running_instance_and_reuses_document() {
    let host = host();
    let mut backend = backend(&host);

    assert!(backend.start_session());
    assert_eq!(backend.state(), SessionState::Ready);

    let h = host.borrow();
    assert_eq!(h.attaches, 1);
    assert_eq!(h.launches, 0);
    assert_eq!(h.documents_added, 0);
    assert!(h.visible);
    assert_eq!(h.last_prog_id, "AutoCAD.Application");
}

#[test]
fn launches_when_nothing_is_running() {
    let host = host();
    {
        let mut h = host.borrow_mut();
        h.running = false;
        h.open_documents = 0;
    }
    let mut backend = AutomationBackend::new(
        Box::new(FakeConnector(Rc::clone(&host))),
        BackendSettings {
            product: CadProduct::ZwCad,
            ..settings()
        },
    );

    assert!(backend.start_session());

    let h = host.borrow();
    assert_eq!(h.attaches, 1);
    assert_eq!(h.launches, 1);
    assert_eq!(h.documents_added, 1, "a fresh instance gets a new document");
    assert_eq!(h.last_prog_id, "ZWCAD.Application");
}

#[test]
fn failed_launch_leaves_backend_restartable() {
    let host = host();
    {
        let mut h = host.borrow_mut();
        h.running = false;
        h.installed = false;
    }
    let mut backend = backend(&host);

    assert!(!backend.start_session());
    assert_eq!(backend.state(), SessionState::Unconnected);
    assert!(backend.draw_line(&line(), &EntityStyle::default()).is_none());

    host.borrow_mut().installed = true;
    assert!(backend.start_session());
    assert_eq!(backend.state(), SessionState::Ready);
}

#[test]
fn close_then_restart() {
    let host = host();
    let mut backend = ready(&host);

    backend.close();
    assert_eq!(backend.state(), SessionState::Closed);
    assert!(!backend.zoom_extents());

    assert!(backend.start_session());
    assert!(backend.zoom_extents());
    assert_eq!(host.borrow().attaches, 2);
}

// =============================================================================
// Operations
// =============================================================================

#[test]
fn every_operation_refreshes_the_view() {
    let host = host();
    let mut backend = ready(&host);

    let handle = backend.draw_line(&line(), &EntityStyle::default()).unwrap();
    assert_eq!(handle.as_str(), "obj1");
    assert_eq!(
        host.borrow().calls,
        vec![
            Call::Line([0.0, 0.0, 0.0], [10.0, 10.0, 0.0]),
            Call::Regen
        ]
    );
}

#[test]
fn arc_angles_are_sent_in_radians() {
    let host = host();
    let mut backend = ready(&host);

    let arc = ArcParams {
        center: Point3::default(),
        radius: 5.0,
        start_angle: 0.0,
        end_angle: 90.0,
    };
    assert!(backend.draw_arc(&arc, &EntityStyle::default()).is_some());

    let calls = drawn(&host);
    let Call::Arc(start, end) = calls[0] else {
        panic!("expected an arc, got {:?}", calls[0]);
    };
    assert!(start.abs() < 1e-12);
    assert!((end - FRAC_PI_2).abs() < 1e-12);
}

#[test]
fn hatch_is_built_in_host_order() {
    let host = host();
    let mut backend = ready(&host);

    let hatch = HatchParams {
        points: vec![
            Point3::default(),
            Point3::xy(10.0, 0.0),
            Point3::xy(10.0, 10.0),
        ],
        pattern_name: "ANSI31".to_string(),
        scale: 2.0,
    };
    let style = EntityStyle::on_layer("fill").with_color(1);

    let handle = backend.draw_hatch(&hatch, &style).unwrap();
    assert_eq!(handle.as_str(), "obj2");

    let b = "obj1".to_string();
    let h = "obj2".to_string();
    assert_eq!(
        drawn(&host),
        vec![
            Call::Polyline(vec![0.0, 0.0, 0.0, 10.0, 0.0, 0.0, 10.0, 10.0, 0.0]),
            Call::Set(b.clone(), Property::Closed(true)),
            Call::AddLayer("fill".to_string()),
            Call::ActiveLayer("fill".to_string()),
            Call::Set(b.clone(), Property::Layer("fill".to_string())),
            Call::Hatch(PATTERN_TYPE_PREDEFINED, "ANSI31".to_string(), true),
            Call::AppendLoop(h.clone(), vec![b]),
            Call::Set(h.clone(), Property::PatternScale(2.0)),
            Call::ActiveLayer("fill".to_string()),
            Call::Set(h.clone(), Property::Layer("fill".to_string())),
            Call::Set(h.clone(), Property::Color(1)),
            Call::Evaluate(h),
        ]
    );
}

#[test]
fn solid_hatch_has_no_pattern_scale() {
    let host = host();
    let mut backend = ready(&host);

    let hatch = HatchParams {
        points: vec![
            Point3::default(),
            Point3::xy(1.0, 0.0),
            Point3::xy(1.0, 1.0),
        ],
        pattern_name: "SOLID".to_string(),
        scale: 3.0,
    };
    assert!(backend.draw_hatch(&hatch, &EntityStyle::default()).is_some());
    assert!(!drawn(&host)
        .iter()
        .any(|c| matches!(c, Call::Set(_, Property::PatternScale(_)))));
}

#[test]
fn short_hatch_boundary_creates_nothing() {
    let host = host();
    let mut backend = ready(&host);

    let hatch = HatchParams {
        points: vec![Point3::default(), Point3::xy(1.0, 0.0)],
        pattern_name: "ANSI31".to_string(),
        scale: 1.0,
    };
    assert!(backend.draw_hatch(&hatch, &EntityStyle::default()).is_none());
    assert!(host.borrow().calls.is_empty());
    assert!(backend.is_running());
}

#[test]
fn rectangle_is_a_closed_five_point_polyline() {
    let host = host();
    let mut backend = ready(&host);

    let rect = RectangleParams {
        corner1: Point3::default(),
        corner2: Point3::xy(4.0, 3.0),
    };
    assert!(backend
        .draw_rectangle(&rect, &EntityStyle::default())
        .is_some());

    assert_eq!(
        drawn(&host),
        vec![
            Call::Polyline(vec![
                0.0, 0.0, 0.0, 4.0, 0.0, 0.0, 4.0, 3.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 0.0
            ]),
            Call::Set("obj1".to_string(), Property::Closed(true)),
        ]
    );
}

#[test]
fn two_point_polyline_is_not_closed() {
    let host = host();
    let mut backend = ready(&host);

    let polyline = PolylineParams {
        points: vec![Point3::default(), Point3::xy(5.0, 5.0)],
        closed: true,
    };
    assert!(backend
        .draw_polyline(&polyline, &EntityStyle::default())
        .is_some());
    assert!(!drawn(&host)
        .iter()
        .any(|c| matches!(c, Call::Set(_, Property::Closed(_)))));
}

#[test]
fn text_rotation_is_converted_to_radians() {
    let host = host();
    let mut backend = ready(&host);

    let text = TextParams {
        position: Point3::xy(1.0, 1.0),
        text: "Hello".to_string(),
        height: 2.5,
        rotation: 180.0,
    };
    assert!(backend.draw_text(&text, &EntityStyle::default()).is_some());

    let calls = drawn(&host);
    assert_eq!(calls[0], Call::Text("Hello".to_string(), 2.5));
    let Call::Set(_, Property::Rotation(rad)) = calls[1] else {
        panic!("expected a rotation, got {:?}", calls[1]);
    };
    assert!((rad - std::f64::consts::PI).abs() < 1e-12);
}

#[test]
fn dimension_defaults_text_position_and_height() {
    let host = host();
    let mut backend = ready(&host);

    let dimension = DimensionParams {
        point1: Point3::default(),
        point2: Point3::xy(10.0, 0.0),
        text_position: None,
        text_height: None,
    };
    assert!(backend
        .add_dimension(&dimension, &EntityStyle::default())
        .is_some());

    assert_eq!(
        drawn(&host),
        vec![
            Call::Dimension([0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [5.0, 5.0, 0.0]),
            Call::Set("obj1".to_string(), Property::TextHeight(5.0)),
        ]
    );
}

#[test]
fn invalid_lineweight_is_coerced_on_strokes_only() {
    let host = host();
    let mut backend = ready(&host);

    let style = EntityStyle::default().with_lineweight(14);
    assert!(backend.draw_line(&line(), &style).is_some());
    let text = TextParams {
        position: Point3::default(),
        text: "t".to_string(),
        height: 2.5,
        rotation: 0.0,
    };
    assert!(backend.draw_text(&text, &style).is_some());

    let weights: Vec<Call> = drawn(&host)
        .into_iter()
        .filter(|c| matches!(c, Call::Set(_, Property::LineWeight(_))))
        .collect();
    assert_eq!(
        weights,
        vec![Call::Set("obj1".to_string(), Property::LineWeight(0))]
    );
}

#[test]
fn layer_color_applies_only_on_creation() {
    let host = host();
    let mut backend = ready(&host);

    assert!(backend.create_layer("walls", Some(1)));
    assert!(backend.create_layer("walls", Some(5)));

    assert_eq!(
        drawn(&host),
        vec![
            Call::AddLayer("walls".to_string()),
            Call::LayerColor("walls".to_string(), 1),
            Call::ActiveLayer("walls".to_string()),
            Call::ActiveLayer("walls".to_string()),
        ]
    );
}

#[test]
fn save_uses_configured_default_path() {
    let host = host();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("drawings");
    let mut backend = AutomationBackend::new(
        Box::new(FakeConnector(Rc::clone(&host))),
        BackendSettings {
            output_directory: output.clone(),
            default_filename: "plan.dwg".to_string(),
            ..settings()
        },
    );
    assert!(backend.start_session());

    let written = backend.save_drawing(None).unwrap();
    assert_eq!(written, output.join("plan.dwg"));
    assert!(output.is_dir());
    assert!(host.borrow().calls.contains(&Call::SaveAs(written)));
}

// =============================================================================
// Lost document handle
// =============================================================================

#[test]
fn lost_handle_reattaches_on_next_call() {
    let host = host();
    let mut backend = ready(&host);

    host.borrow_mut().connection_lost = true;
    assert!(backend.draw_line(&line(), &EntityStyle::default()).is_none());
    assert_eq!(backend.state(), SessionState::Ready);

    host.borrow_mut().connection_lost = false;
    assert!(backend.draw_line(&line(), &EntityStyle::default()).is_some());
    assert_eq!(host.borrow().attaches, 2);
    assert_eq!(host.borrow().launches, 0);
}

#[test]
fn failed_reattach_returns_to_unconnected() {
    let host = host();
    let mut backend = ready(&host);

    host.borrow_mut().connection_lost = true;
    assert!(backend.draw_line(&line(), &EntityStyle::default()).is_none());

    {
        let mut h = host.borrow_mut();
        h.connection_lost = false;
        h.running = false;
    }
    assert!(backend.draw_line(&line(), &EntityStyle::default()).is_none());
    assert_eq!(backend.state(), SessionState::Unconnected);
    assert_eq!(host.borrow().launches, 0, "re-attach never launches");
}
