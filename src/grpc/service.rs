use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::instrument;

use super::proto::{
    user_service_server::{UserService, UserServiceServer},
    CreateUserRequest, DeleteUserRequest, Empty, GetUserRequest, LoginRequest, LoginResponse,
    RegisterRequest, RegisterResponse, UpdateUserRequest, UserListResponse, UserResponse,
};
use crate::{
    auth::JwtKeys,
    state::AppState,
    users::{
        dto::{Credentials, PublicUser, UserPayload},
        services, UserStore,
    },
};

/// gRPC front end over the same handlers the REST routes use.
#[derive(Clone)]
pub struct UserGrpc {
    store: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl UserGrpc {
    pub fn new(store: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { store, keys }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.store.clone(), JwtKeys::from_config(&state.config.jwt))
    }

    pub fn into_server(self) -> UserServiceServer<Self> {
        UserServiceServer::new(self)
    }
}

impl From<PublicUser> for UserResponse {
    fn from(u: PublicUser) -> Self {
        Self {
            id: u.id.to_string(),
            username: u.username,
            email: u.email,
        }
    }
}

#[tonic::async_trait]
impl UserService for UserGrpc {
    #[instrument(skip_all)]
    async fn create_user(
        &self,
        request: Request<CreateUserRequest>,
    ) -> Result<Response<UserResponse>, Status> {
        let req = request.into_inner();
        let payload = UserPayload {
            username: req.username,
            email: req.email,
            password: req.password,
        };
        let user = services::create_user(self.store.as_ref(), payload).await?;
        Ok(Response::new(user.into()))
    }

    #[instrument(skip_all)]
    async fn get_user(
        &self,
        request: Request<GetUserRequest>,
    ) -> Result<Response<UserResponse>, Status> {
        let req = request.into_inner();
        let user = services::get_user(self.store.as_ref(), &req.id).await?;
        Ok(Response::new(user.into()))
    }

    #[instrument(skip_all)]
    async fn update_user(
        &self,
        request: Request<UpdateUserRequest>,
    ) -> Result<Response<UserResponse>, Status> {
        let req = request.into_inner();
        let payload = UserPayload {
            username: req.username,
            email: req.email,
            password: req.password,
        };
        let user = services::update_user(self.store.as_ref(), &req.id, payload).await?;
        Ok(Response::new(user.into()))
    }

    #[instrument(skip_all)]
    async fn delete_user(
        &self,
        request: Request<DeleteUserRequest>,
    ) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        services::delete_user(self.store.as_ref(), &req.id).await?;
        Ok(Response::new(Empty {}))
    }

    #[instrument(skip_all)]
    async fn list_users(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<UserListResponse>, Status> {
        let users = services::list_users(self.store.as_ref()).await?;
        Ok(Response::new(UserListResponse {
            users: users.into_iter().map(UserResponse::from).collect(),
        }))
    }

    #[instrument(skip_all)]
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        let req = request.into_inner();
        let payload = UserPayload {
            username: req.username,
            email: req.email,
            password: req.password,
        };
        let created = services::register(self.store.as_ref(), payload).await?;
        Ok(Response::new(RegisterResponse {
            id: created.id.to_string(),
        }))
    }

    #[instrument(skip_all)]
    async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status> {
        let req = request.into_inner();
        let creds = Credentials {
            email: req.email,
            password: req.password,
        };
        let token = services::login(self.store.as_ref(), &self.keys, creds).await?;
        Ok(Response::new(LoginResponse {
            access_token: token.access_token,
            token_type: token.token_type,
        }))
    }
}

#[cfg(test)]
mod tests {
    use tonic::Code;

    use super::*;
    use crate::{config::JwtConfig, users::MemoryUserStore};

    const MISSING_ID: &str = "6f1c2a9e-3b7d-4e2a-9c1f-5d8e7a6b4c3d";

    fn service() -> UserGrpc {
        let keys = JwtKeys::from_config(&JwtConfig {
            secret: "test".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
        });
        UserGrpc::new(Arc::new(MemoryUserStore::new()), keys)
    }

    async fn create(svc: &UserGrpc, username: &str, email: &str) -> UserResponse {
        svc.create_user(Request::new(CreateUserRequest {
            username: username.into(),
            email: email.into(),
            password: "pw".into(),
        }))
        .await
        .expect("create user")
        .into_inner()
    }

    #[tokio::test]
    async fn create_then_get() {
        let svc = service();
        let created = create(&svc, "user", "mail@test.com").await;
        assert_eq!(created.username, "user");
        assert_eq!(created.email, "mail@test.com");
        assert!(!created.id.is_empty());

        let got = svc
            .get_user(Request::new(GetUserRequest {
                id: created.id.clone(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(got, created);
    }

    #[tokio::test]
    async fn get_user_codes() {
        let svc = service();
        let err = svc
            .get_user(Request::new(GetUserRequest { id: "X".into() }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        let err = svc
            .get_user(Request::new(GetUserRequest {
                id: MISSING_ID.into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn update_user_found_and_codes() {
        let svc = service();
        let created = create(&svc, "old", "old@x.com").await;

        let updated = svc
            .update_user(Request::new(UpdateUserRequest {
                id: created.id.clone(),
                username: "nuevo".into(),
                email: "nuevo@x.com".into(),
                password: "pw".into(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.username, "nuevo");
        assert_eq!(updated.email, "nuevo@x.com");

        let err = svc
            .update_user(Request::new(UpdateUserRequest {
                id: MISSING_ID.into(),
                username: "n".into(),
                email: "n".into(),
                password: "pw".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);

        let err = svc
            .update_user(Request::new(UpdateUserRequest {
                id: "X".into(),
                username: "n".into(),
                email: "n@x.com".into(),
                password: "pw".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn delete_user_codes() {
        let svc = service();
        let created = create(&svc, "user", "mail@test.com").await;

        let ok = svc
            .delete_user(Request::new(DeleteUserRequest {
                id: created.id.clone(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(ok, Empty {});

        let err = svc
            .delete_user(Request::new(DeleteUserRequest { id: created.id }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);

        let err = svc
            .delete_user(Request::new(DeleteUserRequest { id: "X".into() }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn list_users_returns_all() {
        let svc = service();
        create(&svc, "a", "a@test.com").await;
        create(&svc, "b", "b@test.com").await;
        let list = svc
            .list_users(Request::new(Empty {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(list.users.len(), 2);
    }

    #[tokio::test]
    async fn register_already_exists() {
        let svc = service();
        let req = || RegisterRequest {
            username: "a".into(),
            email: "exist@test.com".into(),
            password: "pw".into(),
        };
        let first = svc.register(Request::new(req())).await.unwrap().into_inner();
        assert!(!first.id.is_empty());

        let err = svc.register(Request::new(req())).await.unwrap_err();
        assert_eq!(err.code(), Code::AlreadyExists);
    }

    #[tokio::test]
    async fn login_success_and_fail() {
        let svc = service();
        svc.register(Request::new(RegisterRequest {
            username: "e".into(),
            email: "e".into(),
            password: "pw".into(),
        }))
        .await
        .unwrap();

        let ok = svc
            .login(Request::new(LoginRequest {
                email: "e".into(),
                password: "pw".into(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(ok.token_type, "bearer");
        assert_eq!(svc.keys.decode(&ok.access_token).unwrap().sub, "e");

        let err = svc
            .login(Request::new(LoginRequest {
                email: "e".into(),
                password: "wrong".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);
    }
}
