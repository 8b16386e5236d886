pub mod access_gate;
pub mod id_generator;
pub mod object_store;
pub mod sanitizer;
