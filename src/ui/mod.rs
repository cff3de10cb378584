//! UI support
//!
//! Display state for frontend components. Rendering lives in the frontend.

pub mod topbar;
