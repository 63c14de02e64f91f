pub mod animal_handlers;
pub mod health_handlers;
