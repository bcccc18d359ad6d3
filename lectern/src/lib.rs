//! Lectern turns a capture trigger into spoken-ready text: a press (or an
//! HTTP call) photographs a page, preprocesses the frame, sends it to a
//! remote OCR backend, files the outcome in the result history, and answers
//! with an audio cue.
//!
//! The crate is organized around one single-flight pipeline:
//!
//! - [`trigger`] turns hardware edges and timers into trigger events
//! - [`capture`] acquires the frame for events that do not carry one
//! - [`ocr`] preprocesses frames, prechecks them, and talks to the backend
//! - [`session`] orchestrates the stages and owns the busy gate
//! - [`store`] persists the result history
//! - [`audio`] plays the success, error, and skip cues
//! - [`api`] exposes the whole thing over HTTP

pub mod api;
pub mod audio;
pub mod capture;
pub mod config;
pub mod error;
pub mod models;
pub mod ocr;
pub mod session;
pub mod store;
pub mod trigger;
