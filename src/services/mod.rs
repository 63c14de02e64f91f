pub mod animal_repository;
pub mod animal_service;
pub mod cloud_storage_service;
