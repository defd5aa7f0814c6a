pub mod s3_service;

pub use s3_service::{ObjectVersionInfo, S3Service, MIN_PART_SIZE};
