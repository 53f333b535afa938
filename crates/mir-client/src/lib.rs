//! `mir-client` – talking to the MiR fleet-control REST API.
//!
//! # Modules
//!
//! - [`remote`] – [`RemoteInterface`][remote::RemoteInterface]: the three-verb
//!   seam (`fetch` / `submit` / `update`) every other component goes through,
//!   plus the status-code rules that turn a response into a typed result.
//! - [`http`] – [`HttpRemote`][http::HttpRemote]: the blocking `reqwest`
//!   implementation that carries the credential header.
//! - [`credentials`] – [`Credential`][credentials::Credential]: resolves the
//!   authorization token from a value or a JSON credential file.
//! - [`catalog`] – [`CatalogResolver`][catalog::CatalogResolver]: exact-name
//!   lookup of positions, L-markers, and mission templates.
//! - [`cache`] – [`TimedCache`][cache::TimedCache]: optional refresh-interval
//!   cache used by the resolver.
//! - [`robot`] – [`RobotApi`][robot::RobotApi]: status, mission history,
//!   operational-state transitions, and register I/O.
//! - [`sim`] – [`SimRemote`][sim::SimRemote]: an in-process fleet controller
//!   for tests and dry runs without a robot.

pub mod cache;
pub mod catalog;
pub mod credentials;
pub mod http;
pub mod remote;
pub mod robot;
pub mod sim;

pub use catalog::CatalogResolver;
pub use credentials::Credential;
pub use http::HttpRemote;
pub use remote::RemoteInterface;
pub use robot::RobotApi;
pub use sim::SimRemote;
