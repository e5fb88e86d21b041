pub mod batch;
pub mod cycle;
pub mod dataset;
pub mod inbox;
pub mod inserter;
pub mod schema;
