/*
 * This module provides the application logic layer: `ProjectTranslator`, which
 * turns a workspace and its configuration into one translation run, and the
 * console controls that pause, resume or stop a run from stdin.
 * Unit tests for `ProjectTranslator` are in `handler_tests.rs`.
 */
pub mod console_controls;
pub mod handler;


pub use handler::ProjectTranslator;
