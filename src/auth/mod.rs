pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;

pub use jwt::{Claims, JwtManager};
pub use middleware::{AuthContext, AuthExtractor, AuthMiddleware};
pub use models::{Permission, Role, User};
