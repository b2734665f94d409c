//! Wire types exchanged with the auth service.

pub mod auth;
pub mod user;

pub use auth::{
    RefreshTokenResponse, SignInRequest, SignInResponse, SignUpRequest, UpdatePasswordRequest,
};
pub use user::UserProfile;
