// # Routes Module
//
// - HTTP handlers for the account server, one submodule per API area.
// - Each area exposes a `create_*_routes` function merged in `server.rs`.
//
//  ## Available Route Modules
// - `health`: liveness probe
// - `auth`: login, token redemption, refresh and logout under `/auth`
// - `account`: account self-service under `/api/account`

/// Health check and monitoring endpoints
pub mod health;

/// Passwordless login and session lifecycle
pub mod auth;

/// Account self-service, requires an access token
pub mod account;
