pub mod error;
pub mod object_path;
pub mod response;
