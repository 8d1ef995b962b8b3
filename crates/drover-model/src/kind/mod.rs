mod role;
pub use role::TaskRole;
