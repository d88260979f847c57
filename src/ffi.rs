//! FFI interface for host interop
//!
//! The host hands over rendered markup and a spec as JSON and gets the
//! extraction result back as JSON. All strings crossing the boundary are
//! owned by Rust and must be released with `free_extraction_result`.

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use crate::config::EngineConfig;
use crate::document::StaticDocument;
use crate::engine::Engine;
use crate::error::ExtractError;
use crate::extractors::ExtractionResult;
use crate::loader::DirSpecSource;
use crate::spec::ExtractionSpec;
use std::sync::Arc;

/// Result struct returned to the host
/// Both pointers are owned by Rust and must be freed via free_extraction_result
#[repr(C)]
pub struct ExtractionResultFFI {
    /// JSON-serialized `{ fields, rows }` (null-terminated)
    pub json_ptr: *mut c_char,
    /// Error message if extraction failed (null-terminated), or null on success
    pub error_ptr: *mut c_char,
}

/// Run a spec (actions, fields, table) against a snapshot of markup.
///
/// Actions run against the fixed markup: waits succeed only if their target
/// is already present, clicks change nothing.
///
/// # Arguments
/// * `html_ptr` - Pointer to HTML content (UTF-8, not necessarily null-terminated)
/// * `html_len` - Length of HTML content in bytes
/// * `spec_json` - Extraction spec JSON (null-terminated)
///
/// # Safety
/// - `html_ptr` must point to valid memory of at least `html_len` bytes
/// - `spec_json` must be a valid null-terminated C string
/// - Caller must free the result via `free_extraction_result`
#[no_mangle]
pub unsafe extern "C" fn extract_from_html(
    html_ptr: *const c_char,
    html_len: usize,
    spec_json: *const c_char,
) -> ExtractionResultFFI {
    let html = match read_html(html_ptr, html_len) {
        Ok(h) => h,
        Err(msg) => return make_error_result(msg),
    };

    let spec_str = match read_c_str(spec_json) {
        Ok(s) => s,
        Err(msg) => return make_error_result(msg),
    };

    let spec = match ExtractionSpec::from_json(spec_str) {
        Ok(s) => s,
        Err(e) => return make_error_result(&format!("Failed to parse spec JSON: {}", e)),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => return make_error_result(&format!("Failed to start runtime: {}", e)),
    };

    // Specs are passed inline, so the directory source is never read
    let engine = Engine::new(Arc::new(DirSpecSource::new(".")), EngineConfig::from_env());
    let document = StaticDocument::new(html);
    let result = runtime.block_on(engine.run_spec(&spec, &document));

    to_ffi(result)
}

/// Load `<spec_dir>/<doc_type>.json` and run it against a snapshot of markup
///
/// # Safety
/// Same as extract_from_html; `spec_dir` and `doc_type` must be valid
/// null-terminated C strings
#[no_mangle]
pub unsafe extern "C" fn extract_document_type(
    html_ptr: *const c_char,
    html_len: usize,
    spec_dir: *const c_char,
    doc_type: *const c_char,
) -> ExtractionResultFFI {
    let html = match read_html(html_ptr, html_len) {
        Ok(h) => h,
        Err(msg) => return make_error_result(msg),
    };
    let (spec_dir, doc_type) = match (read_c_str(spec_dir), read_c_str(doc_type)) {
        (Ok(d), Ok(t)) => (d, t),
        (Err(msg), _) | (_, Err(msg)) => return make_error_result(msg),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => return make_error_result(&format!("Failed to start runtime: {}", e)),
    };

    let engine = Engine::from_dir(spec_dir, EngineConfig::from_env());
    let document = StaticDocument::new(html);
    to_ffi(runtime.block_on(engine.run_extraction(doc_type, &document)))
}

/// Free an ExtractionResultFFI returned by this library
///
/// # Safety
/// - `result` must have been returned by `extract_from_html` or `extract_document_type`
/// - Must only be called once per result
#[no_mangle]
pub unsafe extern "C" fn free_extraction_result(result: ExtractionResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

/// Install the tracing subscriber (honours `RUST_LOG`)
#[no_mangle]
pub extern "C" fn label_scrape_init_logging() {
    crate::logging::init();
}

unsafe fn read_html(html_ptr: *const c_char, html_len: usize) -> Result<String, &'static str> {
    if html_ptr.is_null() || html_len == 0 {
        return Ok(String::new());
    }
    let slice = std::slice::from_raw_parts(html_ptr as *const u8, html_len);
    std::str::from_utf8(slice)
        .map(str::to_string)
        .map_err(|_| "Invalid UTF-8 in HTML content")
}

unsafe fn read_c_str<'a>(ptr: *const c_char) -> Result<&'a str, &'static str> {
    if ptr.is_null() {
        return Err("Argument is null");
    }
    CStr::from_ptr(ptr).to_str().map_err(|_| "Invalid UTF-8 in argument")
}

fn to_ffi(result: Result<ExtractionResult, ExtractError>) -> ExtractionResultFFI {
    let result = match result {
        Ok(r) => r,
        Err(e) => return make_error_result(&e.to_string()),
    };
    match serde_json::to_string(&result) {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => ExtractionResultFFI {
                json_ptr: cstr.into_raw(),
                error_ptr: ptr::null_mut(),
            },
            Err(_) => make_error_result("Result JSON contains null bytes"),
        },
        Err(e) => make_error_result(&format!("Failed to serialize result: {}", e)),
    }
}

// Helper to create error result
fn make_error_result(msg: &str) -> ExtractionResultFFI {
    let error_cstr = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    ExtractionResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr: error_cstr.into_raw(),
    }
}
