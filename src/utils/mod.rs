pub mod jwt;
pub mod logger;
pub mod password;
pub mod reset_code;
