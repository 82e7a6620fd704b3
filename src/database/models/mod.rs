pub mod user;

pub use user::{UserGenericDataEntity, UserGrantedPermissionEntity, UserGrantedRoleEntity, UserRow};
