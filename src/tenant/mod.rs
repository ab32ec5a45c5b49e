pub mod context;
pub mod session;

pub use context::{resolve, TenantContext, TenantScope};
pub use session::{Role, Session, SessionClaims};
