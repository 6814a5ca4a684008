//! Property test suite entry point.

mod classify_props;
mod detector_props;
mod quality_props;
