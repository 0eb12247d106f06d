pub mod capability;
pub mod declaration;
pub mod session;
pub mod tool;
