//! Slack integration - Socket Mode bot interface
//!
//! This crate provides the Slack-facing surface for convoke:
//! - **Block Kit** (`blocks`) - typed message document model and builders
//! - **Announcements** (`announce`) - event announcement rendering
//! - **Slash Commands** (`commands`) - `/convoke list`, `/convoke next`, etc.
//! - **Events** (`events`) - button clicks, modal intents, mentions, DMs
//! - **Gateway** (`gateway`) - post/update/delete abstraction over chat.* calls
//! - **Sync** (`sync`) - best-effort re-render of every posted announcement
//! - **Socket Mode** (`socket`) - WebSocket envelope pump with reconnection
//!
//! # Architecture
//!
//! ```text
//! Slack Events → EventDispatcher → Handlers → Event Service → Roster Engine
//!                     ↓
//!               Block Kit UI ← Announcement Renderer
//! ```

pub mod announce;
pub mod blocks;
pub mod commands;
pub mod events;
pub mod gateway;
pub mod socket;
pub mod sync;
