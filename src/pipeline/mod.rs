//! Pipeline stages for Markdown conversion.
//!
//! Each submodule implements one step, so each can be tested on its own and
//! the rendering backend can be swapped without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ markdown ──▶ page ──▶ export ──▶ file
//! (read)    (+resolve,    (+styles,  (html direct,
//!            highlight,    template)  engine for pdf/png/jpeg)
//!            diagram)
//! ```
//!
//! 1. [`input`]: absolute path, UTF-8 text
//! 2. [`context`]: per-format [`context::DocumentContext`]
//! 3. [`markdown`]: Markdown → HTML fragment; image references go through
//!    [`resolve`], code blocks through [`highlight`] and [`diagram`]
//! 4. [`page`]: fragment + [`styles`] + title, filled into [`template`]
//! 5. [`output_path`]: where the file goes
//! 6. [`export`]: write html, or hand a temp page to the [`engine`]

pub mod context;
pub mod diagram;
pub mod engine;
pub mod export;
pub mod highlight;
pub mod input;
pub mod markdown;
pub mod output_path;
pub mod page;
pub mod resolve;
pub mod styles;
pub mod template;
