//! ASCII DXF writer.
//!
//! Encodes a [`DxfDocument`] as an AutoCAD 2000 (`AC1015`) ASCII DXF file.
//!
//! # File Layout
//!
//! ```text
//! 0 SECTION / 2 HEADER     $ACADVER, $HANDSEED, $CLAYER, $INSUNITS, $TDCREATE, $EXTMIN/$EXTMAX
//! 0 SECTION / 2 TABLES     LAYER table (one record per layer)
//! 0 SECTION / 2 ENTITIES   model-space entities in creation order
//! 0 EOF
//! ```
//!
//! Every group is written as two lines: the group code right-aligned to
//! three characters, then the value.

use std::fmt::Write;

use super::document::{DxfDocument, Entity, Geometry, Layer};
use crate::geometry::Point3;

/// DXF version written to `$ACADVER`.
const ACAD_VERSION: &str = "AC1015";

/// Handle of the LAYER symbol table.
const LAYER_TABLE_HANDLE: u32 = 0x02;

/// `$INSUNITS` value for millimetres.
const UNITS_MILLIMETRES: i16 = 4;

/// Julian day number of the Unix epoch.
const UNIX_EPOCH_JULIAN_DAY: f64 = 2_440_587.5;

/// Dimension type flags: aligned (1) with a user-placed text (128).
const DIMENSION_ALIGNED_USER_TEXT: i16 = 1 | 128;

/// Hatch boundary path flags: external (1) polyline (2).
const HATCH_PATH_EXTERNAL_POLYLINE: i32 = 1 | 2;

/// Writes one group.
fn group(out: &mut String, code: i32, value: impl std::fmt::Display) {
    let _ = write!(out, "{code:>3}\n{value}\n");
}

/// Writes a real-valued group, keeping a decimal point on whole numbers.
fn real(out: &mut String, code: i32, value: f64) {
    if value.fract() == 0.0 && value.is_finite() {
        group(out, code, format_args!("{value:.1}"));
    } else {
        group(out, code, value);
    }
}

/// Writes a point as groups `code`, `code + 10`, `code + 20`.
fn point(out: &mut String, code: i32, p: Point3) {
    real(out, code, p.x);
    real(out, code + 10, p.y);
    real(out, code + 20, p.z);
}

fn handle(out: &mut String, code: i32, h: u32) {
    group(out, code, format_args!("{h:X}"));
}

/// Converts a UTC time to a DXF Julian date.
#[allow(clippy::cast_precision_loss)] // Millisecond timestamps fit comfortably in f64
fn julian_date(time: chrono::DateTime<chrono::Utc>) -> f64 {
    time.timestamp_millis() as f64 / 86_400_000.0 + UNIX_EPOCH_JULIAN_DAY
}

fn write_header(out: &mut String, doc: &DxfDocument) {
    group(out, 0, "SECTION");
    group(out, 2, "HEADER");

    group(out, 9, "$ACADVER");
    group(out, 1, ACAD_VERSION);
    group(out, 9, "$HANDSEED");
    handle(out, 5, doc.handle_seed());
    group(out, 9, "$CLAYER");
    group(out, 8, doc.active_layer());
    group(out, 9, "$INSUNITS");
    group(out, 70, UNITS_MILLIMETRES);
    group(out, 9, "$TDCREATE");
    real(out, 40, julian_date(doc.created()));

    if let Some((min, max)) = doc.view_extents().or_else(|| doc.extents()) {
        group(out, 9, "$EXTMIN");
        point(out, 10, min);
        group(out, 9, "$EXTMAX");
        point(out, 10, max);
    }

    group(out, 0, "ENDSEC");
}

fn write_layer(out: &mut String, layer: &Layer) {
    group(out, 0, "LAYER");
    handle(out, 5, layer.handle);
    handle(out, 330, LAYER_TABLE_HANDLE);
    group(out, 100, "AcDbSymbolTableRecord");
    group(out, 100, "AcDbLayerTableRecord");
    group(out, 2, &layer.name);
    group(out, 70, 0);
    group(out, 62, layer.color);
    group(out, 6, "CONTINUOUS");
}

fn write_tables(out: &mut String, doc: &DxfDocument) {
    group(out, 0, "SECTION");
    group(out, 2, "TABLES");

    group(out, 0, "TABLE");
    group(out, 2, "LAYER");
    handle(out, 5, LAYER_TABLE_HANDLE);
    group(out, 100, "AcDbSymbolTable");
    group(out, 70, doc.layers().count());
    for layer in doc.layers() {
        write_layer(out, layer);
    }
    group(out, 0, "ENDTAB");

    group(out, 0, "ENDSEC");
}

/// Writes the groups common to every entity.
fn write_entity_common(out: &mut String, entity: &Entity) {
    group(out, 0, entity.geometry.type_name());
    handle(out, 5, entity.handle);
    group(out, 100, "AcDbEntity");
    group(out, 8, &entity.layer);
    if let Some(color) = entity.color {
        group(out, 62, color);
    }
    if let Some(lineweight) = entity.lineweight {
        group(out, 370, lineweight);
    }
}

#[allow(clippy::too_many_lines)]
fn write_entity(out: &mut String, entity: &Entity) {
    write_entity_common(out, entity);

    match &entity.geometry {
        Geometry::Line { start, end } => {
            group(out, 100, "AcDbLine");
            point(out, 10, *start);
            point(out, 11, *end);
        }
        Geometry::Circle { center, radius } => {
            group(out, 100, "AcDbCircle");
            point(out, 10, *center);
            real(out, 40, *radius);
        }
        Geometry::Arc {
            center,
            radius,
            start_angle,
            end_angle,
        } => {
            group(out, 100, "AcDbCircle");
            point(out, 10, *center);
            real(out, 40, *radius);
            group(out, 100, "AcDbArc");
            real(out, 50, *start_angle);
            real(out, 51, *end_angle);
        }
        Geometry::Polyline { vertices, flags } => {
            group(out, 100, "AcDbPolyline");
            group(out, 90, vertices.len());
            group(out, 70, flags.bits());
            real(out, 38, vertices.first().map_or(0.0, |v| v.z));
            for v in vertices {
                real(out, 10, v.x);
                real(out, 20, v.y);
            }
        }
        Geometry::Text {
            insert,
            height,
            rotation,
            value,
        } => {
            group(out, 100, "AcDbText");
            point(out, 10, *insert);
            real(out, 40, *height);
            group(out, 1, value);
            if *rotation != 0.0 {
                real(out, 50, *rotation);
            }
            group(out, 100, "AcDbText");
        }
        Geometry::Ellipse {
            center,
            major_axis,
            ratio,
        } => {
            group(out, 100, "AcDbEllipse");
            point(out, 10, *center);
            point(out, 11, *major_axis);
            real(out, 40, *ratio);
            real(out, 41, 0.0);
            real(out, 42, std::f64::consts::TAU);
        }
        Geometry::Hatch {
            pattern,
            scale,
            solid,
            boundary,
            path,
        } => {
            group(out, 100, "AcDbHatch");
            point(out, 10, Point3::new(0.0, 0.0, path.first().map_or(0.0, |p| p.z)));
            point(out, 210, Point3::new(0.0, 0.0, 1.0));
            group(out, 2, pattern);
            group(out, 70, i16::from(*solid));
            group(out, 71, 1);
            group(out, 91, 1);
            group(out, 92, HATCH_PATH_EXTERNAL_POLYLINE);
            group(out, 72, 0);
            group(out, 73, 1);
            group(out, 93, path.len());
            for p in path {
                real(out, 10, p.x);
                real(out, 20, p.y);
            }
            group(out, 97, 1);
            handle(out, 330, *boundary);
            group(out, 75, 0);
            group(out, 76, 1);
            if !*solid {
                real(out, 52, 0.0);
                real(out, 41, *scale);
                group(out, 77, 0);
                group(out, 78, 0);
            }
            group(out, 98, 0);
        }
        Geometry::Dimension {
            point1,
            point2,
            text_position,
            text_height,
        } => {
            group(out, 100, "AcDbDimension");
            point(out, 10, *text_position);
            point(out, 11, *text_position);
            group(out, 70, DIMENSION_ALIGNED_USER_TEXT);
            let measurement = (point2.x - point1.x).hypot(point2.y - point1.y);
            real(out, 42, measurement);
            group(out, 100, "AcDbAlignedDimension");
            point(out, 13, *point1);
            point(out, 14, *point2);
            if let Some(h) = text_height {
                // DIMTXT override through extended data
                group(out, 1001, "ACAD");
                group(out, 1000, "DSTYLE");
                group(out, 1002, "{");
                group(out, 1070, 140);
                real(out, 1040, *h);
                group(out, 1002, "}");
            }
        }
    }
}

fn write_entities(out: &mut String, doc: &DxfDocument) {
    group(out, 0, "SECTION");
    group(out, 2, "ENTITIES");
    for entity in doc.entities() {
        write_entity(out, entity);
    }
    group(out, 0, "ENDSEC");
}

/// Encodes a document as ASCII DXF text.
#[must_use]
pub fn encode_document(doc: &DxfDocument) -> String {
    let mut out = String::new();
    write_header(&mut out, doc);
    write_tables(&mut out, doc);
    write_entities(&mut out, doc);
    group(&mut out, 0, "EOF");
    out
}
