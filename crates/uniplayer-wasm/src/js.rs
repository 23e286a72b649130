//! Small helpers for reading loosely typed JS values

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Best-effort message for a thrown value or rejected promise
pub fn describe(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return format!("{}: {}", String::from(error.name()), String::from(error.message()));
    }
    if let Some(text) = value.as_string() {
        return text;
    }
    format!("{:?}", value)
}

fn get(target: &JsValue, key: &str) -> Option<JsValue> {
    js_sys::Reflect::get(target, &JsValue::from_str(key))
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
}

pub fn get_f64(target: &JsValue, key: &str) -> Option<f64> {
    get(target, key).and_then(|v| v.as_f64())
}

pub fn get_bool(target: &JsValue, key: &str) -> Option<bool> {
    get(target, key).and_then(|v| v.as_bool())
}

pub fn get_string(target: &JsValue, key: &str) -> Option<String> {
    get(target, key).and_then(|v| v.as_string())
}

pub fn get_object(target: &JsValue, key: &str) -> Option<JsValue> {
    get(target, key).filter(|v| v.is_object())
}

pub fn set(target: &JsValue, key: &str, value: &JsValue) {
    if let Err(e) = js_sys::Reflect::set(target, &JsValue::from_str(key), value) {
        warn(&format!("Failed to set {}: {}", key, describe(&e)));
    }
}

pub fn info(message: &str) {
    web_sys::console::info_1(&format!("[Uniplayer] {}", message).into());
}

pub fn warn(message: &str) {
    web_sys::console::warn_1(&format!("[Uniplayer] {}", message).into());
}

pub fn error(message: &str) {
    web_sys::console::error_1(&format!("[Uniplayer] {}", message).into());
}
