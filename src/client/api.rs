//! High-level client for the auth endpoints.

use serde_json::{Value, json};

use super::coordinator::RefreshCoordinator;
use super::session::{SessionCache, SessionUser};
use super::{
    ApiRequest, ApiResponse, ClientError, LOGIN_PATH, LOGOUT_PATH, ME_PATH, REGISTER_PATH,
    Transport,
};

pub struct ApiClient<T> {
    coordinator: RefreshCoordinator<T>,
}

fn parse_user(value: &Value) -> Result<SessionUser, ClientError> {
    serde_json::from_value(value.clone()).map_err(|e| ClientError::Decode(e.to_string()))
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            coordinator: RefreshCoordinator::new(transport),
        }
    }

    pub fn coordinator(&self) -> &RefreshCoordinator<T> {
        &self.coordinator
    }

    pub fn session(&self) -> &SessionCache {
        self.coordinator.session()
    }

    /// Send a request through the coordinator. Non-2xx answers become [`ClientError::Api`].
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let response = self.coordinator.execute(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ClientError::Api {
                status: response.status,
                message: response.error_message().unwrap_or_default().to_string(),
            })
        }
    }

    pub async fn get(&self, path: &str) -> Result<Value, ClientError> {
        Ok(self.request(ApiRequest::get(path)).await?.body)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionUser, ClientError> {
        let request = ApiRequest::post(LOGIN_PATH).with_body(json!({
            "email": email,
            "password": password,
        }));
        let response = self.request(request).await?;
        let user = parse_user(&response.body["user"])?;
        self.session().set_user(user.clone());
        Ok(user)
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<SessionUser, ClientError> {
        let request = ApiRequest::post(REGISTER_PATH).with_body(json!({
            "email": email,
            "password": password,
            "name": name,
        }));
        let response = self.request(request).await?;
        let user = parse_user(&response.body["user"])?;
        self.session().set_user(user.clone());
        Ok(user)
    }

    /// Fetch the current user and update the cache.
    pub async fn me(&self) -> Result<SessionUser, ClientError> {
        let response = self.request(ApiRequest::get(ME_PATH)).await?;
        let user = parse_user(&response.body)?;
        self.session().set_user(user.clone());
        Ok(user)
    }

    /// Log out on the server. The local cache is cleared even if the call fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self.request(ApiRequest::post(LOGOUT_PATH)).await;
        self.session().clear();
        result.map(|_| ())
    }
}
