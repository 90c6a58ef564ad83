// This module is split into smaller files to keep each file focused on one
// concern. The pieces are `include!`'d so everything remains in
// `crate::sync`.

pub mod http;

include!("parts/01_prelude.rs");
include!("parts/02_engine.rs");
include!("parts/03_hydrate.rs");
include!("parts/04_signals.rs");
