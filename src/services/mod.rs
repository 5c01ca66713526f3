pub mod audit;
pub mod file_service;
pub mod notifier;
pub mod ot_service;
pub mod password_reset_service;
pub mod permissions;
pub mod transfer_service;
pub mod user_service;
