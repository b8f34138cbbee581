//! Request pipeline layers.
//!
//! Everything between the transport adapter and route code: negotiation
//! helpers, body parsing, cookies and sessions, the fallible-handler
//! adapter, and the unhandled-error translation layers.

pub mod accept;
pub mod body;
pub mod cache;
pub mod cookies;
pub mod translate;
pub mod wrap;

pub use accept::{acceptable_content, preferred, type_is};
pub use body::{parse_json_body, BodyRules, ParsedBody};
pub use cache::{apply_cache_policy, CachePolicy};
pub use cookies::{parse_cookies, session, Cookies, Session};
pub use translate::{fallback_error, json_error, TranslateSettings, Unhandled};
pub use wrap::{route_handler, RouteHandler};
