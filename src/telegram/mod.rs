//! Telegram client wrapper module.
//!
//! Provides the [`Transport`] seam the command layer talks to, the
//! grammers-backed client implementing it, plugin routes and send throttling.

mod client;
mod rate_limiter;
mod routes;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{
    AuthError, PwdToken as PasswordToken, QrAuthResult, ResponseMode, TelegramBot,
    Token as LoginToken,
};
pub use rate_limiter::SendThrottle;
pub use routes::{BindingId, CommandFilter, RouteContext, RouteHandler, RouteTable};
pub use transport::{
    AccountInfo, ChatKind, ChatRef, DialogInfo, IncomingMessage, MediaKind, OutgoingMedia, Sender,
    Transport, TransportError,
};
