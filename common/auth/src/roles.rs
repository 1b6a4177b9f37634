pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_ADVERTISER: &str = "advertiser";
pub const ROLE_USER: &str = "user";

pub const ACCOUNT_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_ADVERTISER, ROLE_USER];

/// Custom claim set on accounts promoted to super admin.
pub const CLAIM_SUPER_ADMIN: &str = "superAdmin";
