//! Service layer — auth/reset/account/OAuth flows behind the handlers.

pub mod account;
pub mod auth;
pub mod oauth;
pub mod reset;
