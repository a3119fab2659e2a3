//! C ABI for presentation layers written in other languages.
//!
//! Each call to `telemetry_ingest_line` returns an owned JSON string that
//! must be released with `telemetry_free_string`:
//! - `{"events": [...]}` on success (possibly empty when the line was dropped)
//! - `{"error": "..."}` on a hard error

use crate::engine::TelemetryAggregator;
use crate::protocol::ProtocolVariant;
use std::ffi::{CStr, CString, c_char};

fn variant_from_code(code: u8) -> Option<ProtocolVariant> {
    match code {
        0 => Some(ProtocolVariant::Basic),
        1 => Some(ProtocolVariant::Filtered),
        _ => None,
    }
}

fn into_c_string(json: String) -> *mut c_char {
    CString::new(json)
        .map(CString::into_raw)
        .unwrap_or(std::ptr::null_mut())
}

/// `variant`: 0 = 12/2-field protocol, 1 = 16/4-field protocol.
/// Returns null for an unknown variant.
#[unsafe(no_mangle)]
pub extern "C" fn telemetry_create_aggregator(variant: u8) -> *mut TelemetryAggregator {
    let Some(variant) = variant_from_code(variant) else {
        return std::ptr::null_mut();
    };
    match TelemetryAggregator::new(variant) {
        Ok(aggregator) => Box::into_raw(Box::new(aggregator)),
        Err(_) => std::ptr::null_mut(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn telemetry_free_aggregator(ptr: *mut TelemetryAggregator) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        let _ = Box::from_raw(ptr);
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn telemetry_ingest_line(
    ptr: *mut TelemetryAggregator,
    line: *const c_char,
) -> *mut c_char {
    if ptr.is_null() || line.is_null() {
        return std::ptr::null_mut();
    }

    let c_str = unsafe { CStr::from_ptr(line) };
    let line = c_str.to_string_lossy();
    let aggregator = unsafe { &mut *ptr };

    let json = match aggregator.ingest_line(&line) {
        Ok(events) => serde_json::json!({ "events": events }),
        Err(e) => serde_json::json!({ "error": e.to_string() }),
    };
    into_c_string(json.to_string())
}

#[unsafe(no_mangle)]
pub extern "C" fn telemetry_reset(ptr: *mut TelemetryAggregator) {
    if ptr.is_null() {
        return;
    }
    let aggregator = unsafe { &mut *ptr };
    aggregator.reset();
}

#[unsafe(no_mangle)]
pub extern "C" fn telemetry_free_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    unsafe {
        let _ = CString::from_raw(s);
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn telemetry_version() -> *const c_char {
    static VERSION: &str = concat!("telemetry-core-", env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}
