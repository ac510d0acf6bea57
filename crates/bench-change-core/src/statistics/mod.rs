//! Statistical building blocks for training change models:
//! - Deterministic per-unit seeding for reproducible parallel sampling
//! - Exact k-nearest-neighbour search (KD-tree) and local sensitivity moments
//! - Log-Cholesky packing of covariance matrices for regression

mod kdtree;
mod knn;
mod seed;
mod tril;

pub use knn::{local_moments, nearest_neighbours, LocalMoments};
pub use seed::counter_rng_seed;
pub use tril::{dim_from_tril_len, pack_log_cholesky, tril_len, unpack_log_cholesky};
