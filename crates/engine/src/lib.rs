//! Order pipeline and email delivery engine.

pub mod artwork;
pub mod backoff;
pub mod claims;
pub mod deliveries;
pub mod notify;
pub mod orders;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;
