//! Middleware applied around every route.

pub mod instrumentation;

pub use instrumentation::{instrument_requests, route_label, MeasuredBody, RequestMeasurement};
