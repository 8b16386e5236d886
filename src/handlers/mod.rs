pub mod health_handlers;
pub mod object_handlers;
pub mod system_handlers;
