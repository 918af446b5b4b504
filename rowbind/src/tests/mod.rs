//! Integration tests exercising whole pipelines against in-memory sinks
//! and cursors.

mod test_null_binding;
mod test_resolution_cache;
mod test_scope_isolation;
