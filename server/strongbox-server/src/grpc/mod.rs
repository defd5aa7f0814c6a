//! The vault RPC façade: a single service composing users, auth,
//! credentials, the envelope engine and the object store.

use std::sync::Arc;

use auth_identity::AuthService;
use bytes::BytesMut;
use database_layer::DataType;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{error, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::ServerError;
use crate::proto::v1::vault_server::Vault;
use crate::proto::v1::{
    AllCredsResponse, CreateUserRequest, CreateUserResponse, CredentialEntry, DownloadRequest,
    DownloadResponse, FileChunk, FileObject, GetAllCredsRequest, ListUserFilesRequest,
    ListUserFilesResponse, LoginRequest, LoginResponse, SaveCredentialsRequest,
    SaveCredentialsResponse, UploadStatus,
};
use crate::services::{CredentialService, SecureService, UserService};
use crate::storage::{S3Service, MIN_PART_SIZE};

/// Credential payload serialized to JSON before encryption.
#[derive(Serialize, Deserialize)]
struct CredentialPayload {
    username: String,
    password: String,
}

pub struct VaultService {
    users: UserService,
    auth: AuthService,
    creds: CredentialService,
    secure: Arc<SecureService>,
    store: Arc<S3Service>,
}

impl VaultService {
    pub fn new(
        users: UserService,
        auth: AuthService,
        creds: CredentialService,
        secure: Arc<SecureService>,
        store: Arc<S3Service>,
    ) -> Self {
        Self {
            users,
            auth,
            creds,
            secure,
            store,
        }
    }
}

/// Pull the caller identity the auth middleware placed in extensions.
fn authenticated_user<T>(request: &Request<T>) -> Result<Uuid, Status> {
    request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.0)
        .ok_or_else(|| Status::internal("user id not found in request context"))
}

#[tonic::async_trait]
impl Vault for VaultService {
    async fn create_user(
        &self,
        request: Request<CreateUserRequest>,
    ) -> Result<Response<CreateUserResponse>, Status> {
        let req = request.into_inner();
        let id = self
            .users
            .create_user(&req.username, &req.password, &req.email)
            .await?;

        Ok(Response::new(CreateUserResponse {
            id: id.to_string(),
            username: req.username,
        }))
    }

    async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status> {
        let req = request.into_inner();
        let token = self
            .auth
            .login(&req.username, &req.password)
            .await
            .map_err(ServerError::from)?;

        let mut response = Response::new(LoginResponse {
            message: "Login successful".to_string(),
        });
        let header = token
            .parse()
            .map_err(|_| Status::internal("Error sending header"))?;
        response.metadata_mut().insert("authorization", header);
        Ok(response)
    }

    async fn upload_file(
        &self,
        request: Request<Streaming<FileChunk>>,
    ) -> Result<Response<UploadStatus>, Status> {
        let user_id = authenticated_user(&request)?;
        let mut stream = request.into_inner();

        self.store.upload_stream(user_id, &mut stream).await?;

        Ok(Response::new(UploadStatus {
            success: true,
            message: "File uploaded successfully!".to_string(),
        }))
    }

    type DownloadFileStream = ReceiverStream<Result<DownloadResponse, Status>>;

    async fn download_file(
        &self,
        request: Request<DownloadRequest>,
    ) -> Result<Response<Self::DownloadFileStream>, Status> {
        let user_id = authenticated_user(&request)?;
        let req = request.into_inner();

        let mut body = self.store.get_object(user_id, &req.filename).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(4);

        tokio::spawn(async move {
            let mut buf = BytesMut::new();
            loop {
                match body.try_next().await {
                    Ok(Some(bytes)) => {
                        buf.extend_from_slice(&bytes);
                        while buf.len() >= MIN_PART_SIZE {
                            let chunk = buf.split_to(MIN_PART_SIZE);
                            let message = DownloadResponse {
                                chunk: chunk.to_vec(),
                            };
                            if tx.send(Ok(message)).await.is_err() {
                                // Receiver is gone; the client went away.
                                return;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        error!(error = %err, "error reading object body");
                        let status = Status::internal(format!("error reading object: {err}"));
                        let _ = tx.send(Err(status)).await;
                        return;
                    }
                }
            }
            if !buf.is_empty() {
                let message = DownloadResponse {
                    chunk: buf.to_vec(),
                };
                let _ = tx.send(Ok(message)).await;
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn list_user_files(
        &self,
        request: Request<ListUserFilesRequest>,
    ) -> Result<Response<ListUserFilesResponse>, Status> {
        let user_id = authenticated_user(&request)?;

        let objects = self
            .store
            .list_user_files(user_id)
            .await?
            .into_iter()
            .map(|object| FileObject {
                file_name: object.file_name,
                key: object.key,
                version_id: object.version_id,
                is_latest: object.is_latest,
                size: object.size,
            })
            .collect();

        Ok(Response::new(ListUserFilesResponse { objects }))
    }

    async fn save_credentials(
        &self,
        request: Request<SaveCredentialsRequest>,
    ) -> Result<Response<SaveCredentialsResponse>, Status> {
        let user_id = authenticated_user(&request)?;
        let req = request.into_inner();

        if req.name.is_empty() || req.username.is_empty() || req.password.is_empty() {
            return Err(Status::invalid_argument("parameters are empty"));
        }

        let payload = CredentialPayload {
            username: req.username,
            password: req.password,
        };
        let json =
            serde_json::to_string(&payload).map_err(|err| Status::internal(err.to_string()))?;
        let sealed = self.secure.encrypt(json.as_bytes())?;

        self.creds
            .save(user_id, &req.name, &sealed, DataType::Credentials)
            .await?;

        Ok(Response::new(SaveCredentialsResponse {
            message: "Credentials saved".to_string(),
        }))
    }

    async fn get_all_creds(
        &self,
        request: Request<GetAllCredsRequest>,
    ) -> Result<Response<AllCredsResponse>, Status> {
        let user_id = authenticated_user(&request)?;

        let rows = self.creds.get_all(user_id).await?;
        let mut creds = Vec::with_capacity(rows.len());
        for row in rows {
            // A row that no longer decrypts points at a corrupt
            // DEK/ciphertext association; skip it rather than failing
            // the whole listing.
            let plaintext = match self.secure.decrypt(&row.data) {
                Ok(plaintext) => plaintext,
                Err(err) => {
                    warn!(name = %row.name, error = %err, "skipping credential that failed to decrypt");
                    continue;
                }
            };
            let data = match String::from_utf8(plaintext) {
                Ok(data) => data,
                Err(_) => {
                    warn!(name = %row.name, "skipping credential with non-utf8 payload");
                    continue;
                }
            };
            creds.push(CredentialEntry {
                name: row.name,
                version: row.version.to_string(),
                data,
                create_date: row.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            });
        }

        Ok(Response::new(AllCredsResponse { creds }))
    }
}
