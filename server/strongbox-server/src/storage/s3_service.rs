//! MinIO-compatible S3 storage service.
//!
//! Objects are keyed `{user_id}/{filename}`, so a user's files are
//! exactly the objects under their id prefix. The bucket is created
//! private with versioning enabled; uploads go through the multipart
//! protocol with 5 MiB minimum part size.

use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, BucketVersioningStatus, CompletedMultipartUpload, CompletedPart,
    CreateBucketConfiguration, VersioningConfiguration,
};
use aws_sdk_s3::Client;
use futures::{Stream, StreamExt};
use tonic::Status;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::S3Config;
use crate::error::{ServerError, ServerResult};
use crate::proto::v1::FileChunk;

/// Minimum multipart part size (S3 protocol floor); also the chunk
/// size used for download streaming.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Accumulates upload chunks and yields a part whenever the buffered
/// length reaches the minimum part size. Only the final part (drained
/// with [`PartBuffer::finish`]) may be smaller.
pub(crate) struct PartBuffer {
    buf: Vec<u8>,
}

impl PartBuffer {
    pub(crate) fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        self.buf.extend_from_slice(chunk);
        if self.buf.len() >= MIN_PART_SIZE {
            Some(std::mem::take(&mut self.buf))
        } else {
            None
        }
    }

    pub(crate) fn finish(&mut self) -> Option<Vec<u8>> {
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }
}

/// One object version, as returned by the listing API.
#[derive(Debug, Clone)]
pub struct ObjectVersionInfo {
    pub file_name: String,
    pub key: String,
    pub version_id: String,
    pub is_latest: bool,
    pub size: i64,
}

pub struct S3Service {
    client: Client,
    bucket: String,
    region: String,
}

impl S3Service {
    pub async fn new(config: &S3Config) -> ServerResult<Self> {
        info!(endpoint = %config.endpoint, bucket = %config.bucket, "initializing object store client");

        let credentials = aws_sdk_s3::config::Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "strongbox",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .endpoint_url(&config.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
        })
    }

    /// Create the bucket if it does not exist and make sure versioning
    /// is enabled. The bucket stays private; all reads go through the
    /// server.
    pub async fn init_bucket(&self) -> ServerResult<()> {
        if self.client.head_bucket().bucket(&self.bucket).send().await.is_ok() {
            info!(bucket = %self.bucket, "bucket already exists");
        } else {
            let constraint = BucketLocationConstraint::from(self.region.as_str());
            let bucket_config = CreateBucketConfiguration::builder()
                .location_constraint(constraint)
                .build();

            self.client
                .create_bucket()
                .bucket(&self.bucket)
                .create_bucket_configuration(bucket_config)
                .send()
                .await
                .map_err(|err| {
                    ServerError::ObjectStore(format!("failed to create bucket: {err}"))
                })?;
            info!(bucket = %self.bucket, "bucket created");
        }

        let versioning = self
            .client
            .get_bucket_versioning()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|err| {
                ServerError::ObjectStore(format!("failed to read bucket versioning: {err}"))
            })?;

        if versioning.status() != Some(&BucketVersioningStatus::Enabled) {
            self.client
                .put_bucket_versioning()
                .bucket(&self.bucket)
                .versioning_configuration(
                    VersioningConfiguration::builder()
                        .status(BucketVersioningStatus::Enabled)
                        .build(),
                )
                .send()
                .await
                .map_err(|err| {
                    ServerError::ObjectStore(format!("failed to enable bucket versioning: {err}"))
                })?;
            info!(bucket = %self.bucket, "bucket versioning enabled");
        } else {
            info!(bucket = %self.bucket, "bucket versioning is enabled");
        }

        Ok(())
    }

    /// Drive a client upload stream through a multipart upload.
    ///
    /// The first chunk names the file; parts are flushed whenever the
    /// buffer reaches [`MIN_PART_SIZE`], with the final part exempt
    /// from the minimum. On any failure the multipart upload is
    /// aborted so no orphaned parts accumulate in the store.
    pub async fn upload_stream<S>(&self, user_id: Uuid, stream: &mut S) -> ServerResult<()>
    where
        S: Stream<Item = Result<FileChunk, Status>> + Unpin,
    {
        let first = stream
            .next()
            .await
            .ok_or_else(|| ServerError::InvalidArgument("upload stream is empty".into()))?
            .map_err(|err| ServerError::Internal(format!("error receiving first chunk: {err}")))?;

        if first.filename.is_empty() {
            return Err(ServerError::InvalidArgument("filename must not be empty".into()));
        }
        let key = format!("{user_id}/{}", first.filename);

        let upload = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|err| {
                ServerError::ObjectStore(format!("failed to initialize multipart upload: {err}"))
            })?;
        let upload_id = upload
            .upload_id()
            .ok_or_else(|| ServerError::ObjectStore("multipart upload has no id".into()))?
            .to_string();

        match self.stream_parts(&key, &upload_id, first, stream).await {
            Ok(()) => {
                info!(key = %key, "file uploaded");
                Ok(())
            }
            Err(err) => {
                self.abort_multipart(&key, &upload_id).await;
                Err(err)
            }
        }
    }

    async fn stream_parts<S>(
        &self,
        key: &str,
        upload_id: &str,
        first: FileChunk,
        stream: &mut S,
    ) -> ServerResult<()>
    where
        S: Stream<Item = Result<FileChunk, Status>> + Unpin,
    {
        let mut buffer = PartBuffer::new();
        let mut parts: Vec<CompletedPart> = Vec::new();

        if let Some(data) = buffer.push(&first.chunk) {
            let number = parts.len() as i32 + 1;
            parts.push(self.upload_part(key, upload_id, number, data).await?);
        }

        while let Some(item) = stream.next().await {
            let chunk = item
                .map_err(|err| ServerError::Internal(format!("error receiving chunk: {err}")))?;

            if let Some(data) = buffer.push(&chunk.chunk) {
                let number = parts.len() as i32 + 1;
                parts.push(self.upload_part(key, upload_id, number, data).await?);
            }
        }

        if let Some(data) = buffer.finish() {
            let number = parts.len() as i32 + 1;
            parts.push(self.upload_part(key, upload_id, number, data).await?);
        }

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|err| {
                ServerError::ObjectStore(format!("failed to complete multipart upload: {err}"))
            })?;

        Ok(())
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> ServerResult<CompletedPart> {
        debug!(key = %key, part_number, size = data.len(), "uploading part");
        let part = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| {
                ServerError::ObjectStore(format!("failed to upload part {part_number}: {err}"))
            })?;

        Ok(CompletedPart::builder()
            .part_number(part_number)
            .set_e_tag(part.e_tag().map(|tag| tag.to_string()))
            .build())
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) {
        if let Err(err) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            error!(key = %key, error = %err, "failed to abort multipart upload");
        } else {
            warn!(key = %key, "multipart upload aborted");
        }
    }

    /// Open an object for reading; the caller drains the byte stream.
    pub async fn get_object(&self, user_id: Uuid, filename: &str) -> ServerResult<ByteStream> {
        let key = format!("{user_id}/{filename}");
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|err| {
                ServerError::ObjectStore(format!("failed to get object {key}: {err}"))
            })?;
        Ok(output.body)
    }

    /// List every object version under the user's prefix, paging until
    /// the store reports no more results.
    pub async fn list_user_files(&self, user_id: Uuid) -> ServerResult<Vec<ObjectVersionInfo>> {
        let prefix = format!("{user_id}/");
        let mut result = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut version_id_marker: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_object_versions()
                .bucket(&self.bucket)
                .prefix(&prefix);
            if let Some(marker) = &key_marker {
                request = request.key_marker(marker);
            }
            if let Some(marker) = &version_id_marker {
                request = request.version_id_marker(marker);
            }

            let page = request.send().await.map_err(|err| {
                ServerError::ObjectStore(format!("failed to list objects: {err}"))
            })?;

            for version in page.versions() {
                let key = version.key().unwrap_or_default().to_string();
                let file_name = key.rsplit('/').next().unwrap_or_default().to_string();
                result.push(ObjectVersionInfo {
                    file_name,
                    key,
                    version_id: version.version_id().unwrap_or_default().to_string(),
                    is_latest: version.is_latest().unwrap_or(false),
                    size: version.size().unwrap_or(0),
                });
            }

            if page.is_truncated() != Some(true) {
                break;
            }
            key_marker = page.next_key_marker().map(|m| m.to_string());
            version_id_marker = page.next_version_id_marker().map(|m| m.to_string());
        }

        Ok(result)
    }

    /// Delete an object by full key. Not exposed over RPC; used for
    /// operational cleanup.
    pub async fn delete_object(&self, key: &str) -> ServerResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                ServerError::ObjectStore(format!("unable to delete {key}: {err}"))
            })?;
        info!(key = %key, "object deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: usize = 1024 * 1024;

    #[test]
    fn test_small_upload_is_single_final_part() {
        let mut buffer = PartBuffer::new();

        assert!(buffer.push(&vec![0u8; 3 * MIB]).is_none());
        let last = buffer.finish().unwrap();
        assert_eq!(last.len(), 3 * MIB);
        assert!(buffer.finish().is_none());
    }

    #[test]
    fn test_eleven_mib_in_one_mib_chunks() {
        let mut buffer = PartBuffer::new();
        let mut parts = Vec::new();

        for _ in 0..11 {
            if let Some(part) = buffer.push(&vec![0u8; MIB]) {
                parts.push(part);
            }
        }
        if let Some(part) = buffer.finish() {
            parts.push(part);
        }

        let sizes: Vec<usize> = parts.iter().map(|p| p.len()).collect();
        assert_eq!(sizes, vec![5 * MIB, 5 * MIB, MIB]);
    }

    #[test]
    fn test_every_part_but_last_meets_minimum() {
        let mut buffer = PartBuffer::new();
        let mut parts = Vec::new();

        // Ragged chunk sizes around the threshold.
        for size in [3 * MIB, 3 * MIB, MIB, 7 * MIB, 512, 4 * MIB, 100] {
            if let Some(part) = buffer.push(&vec![0u8; size]) {
                parts.push(part);
            }
        }
        if let Some(part) = buffer.finish() {
            parts.push(part);
        }

        let total: usize = parts.iter().map(|p| p.len()).sum();
        assert_eq!(total, 3 * MIB + 3 * MIB + MIB + 7 * MIB + 512 + 4 * MIB + 100);
        for part in &parts[..parts.len() - 1] {
            assert!(part.len() >= MIN_PART_SIZE);
        }
    }

    #[test]
    fn test_oversized_single_chunk_flushes_whole_buffer() {
        let mut buffer = PartBuffer::new();

        let part = buffer.push(&vec![0u8; 6 * MIB]).unwrap();
        assert_eq!(part.len(), 6 * MIB);
        assert!(buffer.finish().is_none());
    }
}
