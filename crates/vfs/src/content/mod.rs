//! Initial content for newly created entries.
//!
//! A [`ContentProvider`] answers a (context, query) lookup with search hits.
//! The [`Provisioner`] runs that lookup on a background runtime so tree
//! operations stay synchronous, and renders hits as alternating title and
//! link lines.

mod provider;
mod provision;

pub use provider::{render_hits, ContentProvider, SearchHit, StaticContentProvider};
pub use provision::Provisioner;
