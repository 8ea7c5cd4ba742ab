pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{can_bind_localhost, manifest, prepared_pair, seeded_bytes};
