//! Services

pub mod csv_stream;
pub mod importer;
pub mod mapper;
