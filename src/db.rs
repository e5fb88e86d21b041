pub mod iris_duckdb;
pub mod prod_db;
pub mod warehouse;
