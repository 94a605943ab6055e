/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # AnvilFIX Engine
//!
//! Connection drivers and the engine facade for AnvilFIX.
//!
//! This crate provides:
//! - **SessionSettings**: INI-style configuration with `[DEFAULT]`
//!   inheritance and load-time validation
//! - **SessionFactory**: builds sessions from settings, wiring stores and
//!   dictionary validators
//! - **Engine**: explicit owner of the session registry and dictionary
//!   cache (no process globals)
//! - **SocketAcceptor** / **SocketInitiator**: the two connection roles
//!
//! The application callback surface re-exports from `anvilfix-session`.

pub mod acceptor;
pub mod connection;
pub mod engine;
pub mod factory;
pub mod initiator;
pub mod settings;

pub use acceptor::SocketAcceptor;
pub use anvilfix_session::{Application, DoNotSend, NullApplication, Rejection};
pub use engine::{Engine, SessionHandle};
pub use factory::SessionFactory;
pub use initiator::SocketInitiator;
pub use settings::{Properties, SessionSettings, keys};
