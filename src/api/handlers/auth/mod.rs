//! OAuth2 sign-in, sessions, and the guards that protect mutating routes.
//!
//! The flow: `GET /login` issues the session cookie and a fresh anti-CSRF
//! state, the provider posts the authorization code to `POST
//! /oauth2callback`, and the handler exchanges, verifies, and only then
//! populates the session and the user directory. `GET /logout` revokes the
//! token with the provider before clearing the session.

pub(crate) mod directory;
pub(crate) mod guard;
pub mod login;
pub mod logout;

mod error;
mod provider;
mod session;
mod state;

pub use error::AuthError;
pub use provider::{ProviderClient, TokenBundle, UserProfile, Verification};
pub use session::{Session, SessionIdentity, SessionStore};
pub use state::{AuthConfig, AuthState};
