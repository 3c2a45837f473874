pub mod authz;
pub mod smoke;
