//! # resrank API
//!
//! REST surface over the [`Recommender`](resrank_engine::Recommender).
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/recommend` | `{query, top_k?}` to a ranked array of recommendations |
//! | `GET` | `/entities/{id}` | Profile of one entity |
//! | `GET` | `/health` | Entity count, dimension and backend |
//! | `POST` | `/reload` | Rebuild the catalog from the entity source |

pub mod rest;

pub use rest::RestApi;
