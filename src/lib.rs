//! # Catalogo
//!
//! `catalogo` is a small catalog-browsing web application. Anyone can browse
//! catalogs and their items; users who sign in through the configured OAuth2
//! identity provider can add items, and edit or delete the items they
//! created.
//!
//! There are no local passwords. A login attempt starts on `/login` with a
//! fresh anti-CSRF state string, the provider posts an authorization code to
//! `/oauth2callback`, and the server exchanges and verifies the resulting
//! token before it populates the browser session. Mutating item routes pass
//! through two gates: a login gate (redirect to `/login`) and an ownership
//! gate (visible `403`), in that order.
//!
//! ## Storage
//!
//! Users, catalogs, and items live in `PostgreSQL`. Sessions are held in
//! memory, keyed by the hash of an opaque cookie token, and expire after a
//! configurable TTL.

pub mod api;
pub mod cli;
