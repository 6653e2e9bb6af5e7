//! Integration tests for grove entities, collections, and aggregation

mod aggregation;
mod backend_conformance;
mod collections;
mod concurrency;
mod read_only;
mod tags_engine;
mod test_utils;
