//! A draggable animated pet that lives on a web page.
//!
//! The page runtime ([`pet::PetRuntime`]) draws through a [`render::Surface`] and persists
//! through a [`settings::SettingsStore`]. The relay and popup drive it with [`command::Command`]s.

pub mod app;
pub mod click;
pub mod command;
pub mod error;
pub mod page;
pub mod particles;
pub mod pet;
pub mod popup;
pub mod relay;
pub mod render;
pub mod settings;
