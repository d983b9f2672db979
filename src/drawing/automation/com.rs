//! COM bridge to AutoCAD-compatible hosts on Windows.
//!
//! Every call goes through late-bound `IDispatch`: member names are resolved
//! with `GetIDsOfNames` and invoked with arguments packed into `VARIANT`s.
//! Entities are tracked by their `Handle` property.
//!
//! COM objects here are apartment-bound. The connector initialises a
//! single-threaded apartment on the thread that creates it, and every object
//! it hands out must stay on that thread.

#![allow(unsafe_code)]

use std::collections::HashMap;
use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::path::Path;

use windows::core::{Interface, IUnknown, BSTR, GUID, HRESULT, PCWSTR};
use windows::Win32::Foundation::{VARIANT_FALSE, VARIANT_TRUE};
use windows::Win32::System::Com::{
    CLSIDFromProgID, CoCreateInstance, CoInitializeEx, IDispatch, CLSCTX_LOCAL_SERVER,
    COINIT_APARTMENTTHREADED, DISPATCH_FLAGS, DISPATCH_METHOD, DISPATCH_PROPERTYGET,
    DISPATCH_PROPERTYPUT, DISPPARAMS,
};
use windows::Win32::System::Ole::{GetActiveObject, SafeArrayCreateVector, SafeArrayPutElement};
use windows::Win32::System::Variant::{
    VariantClear, VARENUM, VARIANT, VARIANT_0, VARIANT_0_0, VARIANT_0_0_0, VT_ARRAY, VT_BOOL,
    VT_BSTR, VT_DISPATCH, VT_I2, VT_I4, VT_R8,
};

use super::api::{CadApplication, CadConnector, CadDocument, ObjectId, Property};
use crate::drawing::error::{DrawingError, DrawingResult};

const DISPID_PROPERTYPUT: i32 = -3;
const LOCALE_USER_DEFAULT: u32 = 0x0400;

/// `acAllViewports` for `Document.Regen`.
const REGEN_ALL_VIEWPORTS: i32 = 1;

#[allow(clippy::cast_possible_wrap)]
const RPC_E_DISCONNECTED: HRESULT = HRESULT(0x8001_0108_u32 as i32);
#[allow(clippy::cast_possible_wrap)]
const RPC_S_SERVER_UNAVAILABLE: HRESULT = HRESULT(0x8007_06BA_u32 as i32);
#[allow(clippy::cast_possible_wrap)]
const RPC_E_SERVERFAULT: HRESULT = HRESULT(0x8001_0105_u32 as i32);

/// Maps a COM failure, treating a vanished server as a lost handle.
fn com_error(operation: &'static str, error: &windows::core::Error) -> DrawingError {
    if [RPC_E_DISCONNECTED, RPC_S_SERVER_UNAVAILABLE, RPC_E_SERVERFAULT].contains(&error.code()) {
        DrawingError::Disconnected
    } else {
        DrawingError::operation(operation, error.to_string())
    }
}

/// NUL-terminated UTF-16 copy of `text`.
fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

fn class_id(prog_id: &str) -> windows::core::Result<GUID> {
    let name = wide(prog_id);
    unsafe { CLSIDFromProgID(PCWSTR(name.as_ptr())) }
}

// =============================================================================
// Variants
// =============================================================================

/// An owned `VARIANT`, cleared on drop.
#[repr(transparent)]
struct Variant(VARIANT);

impl Drop for Variant {
    fn drop(&mut self) {
        // Clearing only fails for malformed variants, which we never build.
        let _ = unsafe { VariantClear(&mut self.0) };
    }
}

impl Variant {
    fn empty() -> Self {
        Self(VARIANT::default())
    }

    fn with(vt: VARENUM, value: VARIANT_0_0_0) -> Self {
        Self(VARIANT {
            Anonymous: VARIANT_0 {
                Anonymous: ManuallyDrop::new(VARIANT_0_0 {
                    vt,
                    wReserved1: 0,
                    wReserved2: 0,
                    wReserved3: 0,
                    Anonymous: value,
                }),
            },
        })
    }

    fn double(value: f64) -> Self {
        Self::with(VT_R8, VARIANT_0_0_0 { dblVal: value })
    }

    fn int(value: i32) -> Self {
        Self::with(VT_I4, VARIANT_0_0_0 { lVal: value })
    }

    fn short(value: i16) -> Self {
        Self::with(VT_I2, VARIANT_0_0_0 { iVal: value })
    }

    fn boolean(value: bool) -> Self {
        let flag = if value { VARIANT_TRUE } else { VARIANT_FALSE };
        Self::with(VT_BOOL, VARIANT_0_0_0 { boolVal: flag })
    }

    fn string(value: &str) -> Self {
        Self::with(
            VT_BSTR,
            VARIANT_0_0_0 {
                bstrVal: ManuallyDrop::new(BSTR::from(value)),
            },
        )
    }

    fn object(value: &IDispatch) -> Self {
        Self::with(
            VT_DISPATCH,
            VARIANT_0_0_0 {
                pdispVal: ManuallyDrop::new(Some(value.clone())),
            },
        )
    }

    fn point(point: [f64; 3]) -> DrawingResult<Self> {
        Self::doubles(&point)
    }

    /// A `VT_ARRAY | VT_R8` safe array, the layout points and vertex lists take.
    fn doubles(values: &[f64]) -> DrawingResult<Self> {
        let variant = Self::array(VT_R8, values.len())?;
        for (index, value) in values.iter().enumerate() {
            variant.put_element(index, std::ptr::from_ref(value).cast())?;
        }
        Ok(variant)
    }

    /// A `VT_ARRAY | VT_DISPATCH` safe array.
    fn objects(values: &[&IDispatch]) -> DrawingResult<Self> {
        let variant = Self::array(VT_DISPATCH, values.len())?;
        for (index, value) in values.iter().enumerate() {
            variant.put_element(index, value.as_raw().cast_const())?;
        }
        Ok(variant)
    }

    fn array(element: VARENUM, len: usize) -> DrawingResult<Self> {
        let count = u32::try_from(len)
            .map_err(|_| DrawingError::invalid_geometry("too many array elements"))?;
        let array = unsafe { SafeArrayCreateVector(element, 0, count) };
        if array.is_null() {
            return Err(DrawingError::operation("SafeArrayCreateVector", "out of memory"));
        }
        Ok(Self::with(
            VARENUM(VT_ARRAY.0 | element.0),
            VARIANT_0_0_0 { parray: array },
        ))
    }

    fn put_element(&self, index: usize, value: *const c_void) -> DrawingResult<()> {
        let index = i32::try_from(index)
            .map_err(|_| DrawingError::invalid_geometry("too many array elements"))?;
        unsafe { SafeArrayPutElement(self.fields().Anonymous.parray, &index, value) }
            .map_err(|e| com_error("SafeArrayPutElement", &e))
    }

    fn fields(&self) -> &VARIANT_0_0 {
        unsafe { &self.0.Anonymous.Anonymous }
    }

    fn vt(&self) -> VARENUM {
        self.fields().vt
    }

    fn into_object(self) -> Option<IDispatch> {
        if self.vt() == VT_DISPATCH {
            unsafe { (*self.fields().Anonymous.pdispVal).clone() }
        } else {
            None
        }
    }

    fn to_text(&self) -> Option<String> {
        (self.vt() == VT_BSTR).then(|| unsafe { (*self.fields().Anonymous.bstrVal).to_string() })
    }

    fn to_count(&self) -> Option<usize> {
        let value = match self.vt() {
            VT_I4 => i64::from(unsafe { self.fields().Anonymous.lVal }),
            VT_I2 => i64::from(unsafe { self.fields().Anonymous.iVal }),
            _ => return None,
        };
        usize::try_from(value).ok()
    }
}

// =============================================================================
// Dispatch calls
// =============================================================================

/// Invokes member `name` on `target`.
///
/// `args` are given in call order; COM expects them reversed.
fn invoke(
    target: &IDispatch,
    name: &'static str,
    flags: DISPATCH_FLAGS,
    args: Vec<Variant>,
) -> DrawingResult<Variant> {
    let member = wide(name);
    let names = [PCWSTR(member.as_ptr())];
    let mut dispid = 0;
    unsafe {
        target.GetIDsOfNames(
            &GUID::zeroed(),
            names.as_ptr(),
            1,
            LOCALE_USER_DEFAULT,
            &mut dispid,
        )
    }
    .map_err(|e| com_error(name, &e))?;

    let mut args: Vec<Variant> = args.into_iter().rev().collect();
    let mut named = DISPID_PROPERTYPUT;
    let put = flags == DISPATCH_PROPERTYPUT;
    let params = DISPPARAMS {
        rgvarg: args.as_mut_ptr().cast::<VARIANT>(),
        rgdispidNamedArgs: if put { &mut named } else { std::ptr::null_mut() },
        cArgs: u32::try_from(args.len())
            .map_err(|_| DrawingError::operation(name, "too many arguments"))?,
        cNamedArgs: u32::from(put),
    };

    let mut result = Variant::empty();
    unsafe {
        target.Invoke(
            dispid,
            &GUID::zeroed(),
            LOCALE_USER_DEFAULT,
            flags,
            &params,
            Some(std::ptr::addr_of_mut!(result.0)),
            None,
            None,
        )
    }
    .map_err(|e| com_error(name, &e))?;
    Ok(result)
}

fn get(target: &IDispatch, name: &'static str) -> DrawingResult<Variant> {
    let flags = DISPATCH_FLAGS(DISPATCH_METHOD.0 | DISPATCH_PROPERTYGET.0);
    invoke(target, name, flags, Vec::new())
}

fn put(target: &IDispatch, name: &'static str, value: Variant) -> DrawingResult<()> {
    invoke(target, name, DISPATCH_PROPERTYPUT, vec![value]).map(drop)
}

fn call(target: &IDispatch, name: &'static str, args: Vec<Variant>) -> DrawingResult<Variant> {
    invoke(target, name, DISPATCH_METHOD, args)
}

fn object(name: &'static str, value: Variant) -> DrawingResult<IDispatch> {
    value
        .into_object()
        .ok_or_else(|| DrawingError::operation(name, "did not return an object"))
}

fn get_object(target: &IDispatch, name: &'static str) -> DrawingResult<IDispatch> {
    object(name, get(target, name)?)
}

fn call_object(
    target: &IDispatch,
    name: &'static str,
    args: Vec<Variant>,
) -> DrawingResult<IDispatch> {
    object(name, call(target, name, args)?)
}

fn text_property(target: &IDispatch, name: &'static str) -> DrawingResult<String> {
    get(target, name)?
        .to_text()
        .ok_or_else(|| DrawingError::operation(name, "did not return a string"))
}

// =============================================================================
// Connector
// =============================================================================

/// Finds or starts hosts through the COM class registry.
#[derive(Debug)]
pub struct ComConnector {
    _apartment: (),
}

impl ComConnector {
    /// Joins a single-threaded apartment on the current thread.
    ///
    /// # Errors
    ///
    /// Returns [`DrawingError::Unavailable`] if COM cannot be initialised,
    /// for example when the thread already joined a multithreaded apartment.
    pub fn new() -> DrawingResult<Self> {
        unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) }
            .ok()
            .map_err(|e| DrawingError::unavailable(format!("COM initialisation failed: {e}")))?;
        Ok(Self { _apartment: () })
    }
}

impl CadConnector for ComConnector {
    fn is_installed(&self, prog_id: &str) -> bool {
        class_id(prog_id).is_ok()
    }

    fn attach(&self, prog_id: &str) -> DrawingResult<Box<dyn CadApplication>> {
        let failed = |e: windows::core::Error| DrawingError::connection(prog_id, e.to_string());
        let clsid = class_id(prog_id).map_err(failed)?;
        let mut running: Option<IUnknown> = None;
        unsafe { GetActiveObject(&clsid, None, &mut running) }.map_err(failed)?;
        let app = running
            .ok_or_else(|| DrawingError::connection(prog_id, "no running instance"))?
            .cast::<IDispatch>()
            .map_err(failed)?;
        Ok(Box::new(ComApplication { app }))
    }

    fn launch(&self, prog_id: &str) -> DrawingResult<Box<dyn CadApplication>> {
        let failed = |e: windows::core::Error| DrawingError::connection(prog_id, e.to_string());
        let clsid = class_id(prog_id).map_err(failed)?;
        let app: IDispatch =
            unsafe { CoCreateInstance(&clsid, None, CLSCTX_LOCAL_SERVER) }.map_err(failed)?;
        Ok(Box::new(ComApplication { app }))
    }
}

// =============================================================================
// Application and document
// =============================================================================

struct ComApplication {
    app: IDispatch,
}

impl ComApplication {
    fn documents(&self) -> DrawingResult<IDispatch> {
        get_object(&self.app, "Documents")
    }
}

impl CadApplication for ComApplication {
    fn set_visible(&mut self, visible: bool) -> DrawingResult<()> {
        put(&self.app, "Visible", Variant::boolean(visible))
    }

    fn document_count(&self) -> DrawingResult<usize> {
        get(&self.documents()?, "Count")?
            .to_count()
            .ok_or_else(|| DrawingError::operation("Count", "did not return a number"))
    }

    fn active_document(&mut self) -> DrawingResult<Option<Box<dyn CadDocument>>> {
        let Some(doc) = get(&self.app, "ActiveDocument")?.into_object() else {
            return Ok(None);
        };
        Ok(Some(Box::new(ComDocument::open(self.app.clone(), doc)?)))
    }

    fn add_document(&mut self) -> DrawingResult<Box<dyn CadDocument>> {
        let doc = call_object(&self.documents()?, "Add", Vec::new())?;
        Ok(Box::new(ComDocument::open(self.app.clone(), doc)?))
    }
}

struct ComDocument {
    app: IDispatch,
    doc: IDispatch,
    model_space: IDispatch,
    objects: HashMap<String, IDispatch>,
}

impl ComDocument {
    fn open(app: IDispatch, doc: IDispatch) -> DrawingResult<Self> {
        let model_space = get_object(&doc, "ModelSpace")?;
        Ok(Self {
            app,
            doc,
            model_space,
            objects: HashMap::new(),
        })
    }

    fn layers(&self) -> DrawingResult<IDispatch> {
        get_object(&self.doc, "Layers")
    }

    fn layer(&self, name: &str) -> DrawingResult<IDispatch> {
        call_object(&self.layers()?, "Item", vec![Variant::string(name)])
    }

    fn entity(&self, id: &ObjectId) -> DrawingResult<&IDispatch> {
        self.objects
            .get(&id.0)
            .ok_or_else(|| DrawingError::operation("lookup", format!("unknown entity {}", id.0)))
    }

    /// Calls a `ModelSpace.Add*` method and remembers the new entity.
    fn add(&mut self, method: &'static str, args: Vec<Variant>) -> DrawingResult<ObjectId> {
        let entity = call_object(&self.model_space, method, args)?;
        let handle = text_property(&entity, "Handle")?;
        self.objects.insert(handle.clone(), entity);
        Ok(ObjectId(handle))
    }
}

impl CadDocument for ComDocument {
    fn name(&self) -> DrawingResult<String> {
        text_property(&self.doc, "Name")
    }

    fn layer_names(&self) -> DrawingResult<Vec<String>> {
        let layers = self.layers()?;
        let count = get(&layers, "Count")?
            .to_count()
            .ok_or_else(|| DrawingError::operation("Count", "did not return a number"))?;
        (0..count)
            .map(|index| {
                let index = i32::try_from(index)
                    .map_err(|_| DrawingError::operation("Item", "layer index out of range"))?;
                let layer = call_object(&layers, "Item", vec![Variant::int(index)])?;
                text_property(&layer, "Name")
            })
            .collect()
    }

    fn add_layer(&mut self, name: &str) -> DrawingResult<()> {
        call(&self.layers()?, "Add", vec![Variant::string(name)]).map(drop)
    }

    fn set_layer_color(&mut self, name: &str, color: i16) -> DrawingResult<()> {
        put(&self.layer(name)?, "Color", Variant::int(i32::from(color)))
    }

    fn set_active_layer(&mut self, name: &str) -> DrawingResult<()> {
        let layer = self.layer(name)?;
        put(&self.doc, "ActiveLayer", Variant::object(&layer))
    }

    fn add_line(&mut self, start: [f64; 3], end: [f64; 3]) -> DrawingResult<ObjectId> {
        let args = vec![Variant::point(start)?, Variant::point(end)?];
        self.add("AddLine", args)
    }

    fn add_circle(&mut self, center: [f64; 3], radius: f64) -> DrawingResult<ObjectId> {
        let args = vec![Variant::point(center)?, Variant::double(radius)];
        self.add("AddCircle", args)
    }

    fn add_arc(
        &mut self,
        center: [f64; 3],
        radius: f64,
        start_angle: f64,
        end_angle: f64,
    ) -> DrawingResult<ObjectId> {
        let args = vec![
            Variant::point(center)?,
            Variant::double(radius),
            Variant::double(start_angle),
            Variant::double(end_angle),
        ];
        self.add("AddArc", args)
    }

    fn add_ellipse(
        &mut self,
        center: [f64; 3],
        major_axis: [f64; 3],
        ratio: f64,
    ) -> DrawingResult<ObjectId> {
        let args = vec![
            Variant::point(center)?,
            Variant::point(major_axis)?,
            Variant::double(ratio),
        ];
        self.add("AddEllipse", args)
    }

    fn add_polyline(&mut self, vertices: &[f64]) -> DrawingResult<ObjectId> {
        let args = vec![Variant::doubles(vertices)?];
        self.add("AddPolyline", args)
    }

    fn add_text(
        &mut self,
        text: &str,
        insertion: [f64; 3],
        height: f64,
    ) -> DrawingResult<ObjectId> {
        let args = vec![
            Variant::string(text),
            Variant::point(insertion)?,
            Variant::double(height),
        ];
        self.add("AddText", args)
    }

    fn add_hatch(
        &mut self,
        pattern_type: i32,
        pattern_name: &str,
        associative: bool,
    ) -> DrawingResult<ObjectId> {
        let args = vec![
            Variant::int(pattern_type),
            Variant::string(pattern_name),
            Variant::boolean(associative),
        ];
        self.add("AddHatch", args)
    }

    fn add_dim_aligned(
        &mut self,
        point1: [f64; 3],
        point2: [f64; 3],
        text_position: [f64; 3],
    ) -> DrawingResult<ObjectId> {
        let args = vec![
            Variant::point(point1)?,
            Variant::point(point2)?,
            Variant::point(text_position)?,
        ];
        self.add("AddDimAligned", args)
    }

    fn set_property(&mut self, object: &ObjectId, property: Property) -> DrawingResult<()> {
        let value = match &property {
            Property::Layer(name) => Variant::string(name),
            Property::Color(index) => Variant::int(i32::from(*index)),
            Property::LineWeight(weight) => Variant::short(*weight),
            Property::Closed(closed) => Variant::boolean(*closed),
            Property::Rotation(v) | Property::PatternScale(v) | Property::TextHeight(v) => {
                Variant::double(*v)
            }
        };
        put(self.entity(object)?, property.name(), value)
    }

    fn append_outer_loop(&mut self, hatch: &ObjectId, boundary: &[ObjectId]) -> DrawingResult<()> {
        let edges = boundary
            .iter()
            .map(|id| self.entity(id))
            .collect::<DrawingResult<Vec<_>>>()?;
        let args = vec![Variant::objects(&edges)?];
        call(self.entity(hatch)?, "AppendOuterLoop", args).map(drop)
    }

    fn evaluate(&mut self, hatch: &ObjectId) -> DrawingResult<()> {
        call(self.entity(hatch)?, "Evaluate", Vec::new()).map(drop)
    }

    fn regen(&mut self) -> DrawingResult<()> {
        call(&self.doc, "Regen", vec![Variant::int(REGEN_ALL_VIEWPORTS)]).map(drop)
    }

    fn zoom_extents(&mut self) -> DrawingResult<()> {
        call(&self.app, "ZoomExtents", Vec::new()).map(drop)
    }

    fn save_as(&mut self, path: &Path) -> DrawingResult<()> {
        let target = path.display().to_string();
        call(&self.doc, "SaveAs", vec![Variant::string(&target)]).map(drop)
    }
}
