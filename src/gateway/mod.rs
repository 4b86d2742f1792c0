//! Host-independent request pipeline.
//!
//! Both hosting models normalize their native requests into a
//! [`RequestContext`], hand it to the same [`Gateway`], and denormalize the
//! resulting [`ResponseContext`].

mod context;
mod cors;
mod router;

pub use context::{RequestBody, RequestContext, ResponseBody, ResponseContext};
pub use cors::CorsPolicy;
pub use router::{Gateway, GatewaySettings};
