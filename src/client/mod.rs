//! Typed HTTP client for the JSON API.

pub mod state;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use crate::db::models::{
    Access, FollowCounts, MediaType, Post, PostComment, PostDetail, PostView, ProjectView, User,
};
use crate::pagination::Page;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{status}: {message}")]
    Status { status: StatusCode, message: String },
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub data: User,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct NewMediaRequest {
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

#[derive(Debug, Deserialize)]
pub struct BookmarkState {
    pub bookmarked: bool,
}

#[derive(Debug, Deserialize)]
pub struct LikeState {
    pub liked: bool,
    pub likes: i64,
}

#[derive(Debug, Deserialize)]
pub struct FollowState {
    pub following: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub country: Option<String>,
    pub created_at: String,
    pub posts: Vec<Post>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedProjects {
    pub projects: Vec<ProjectView>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };
        Err(ClientError::Status { status, message })
    }

    /// Create an account and keep its session token for later calls.
    pub async fn register(&mut self, name: &str, email: &str, password: &str) -> ClientResult<User> {
        let body = json!({ "name": name, "email": email, "password": password });
        let auth: AuthResponse = self
            .send(self.request(Method::POST, "/api/auth/register").json(&body))
            .await?;
        self.token = Some(auth.token);
        Ok(auth.data)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> ClientResult<User> {
        let body = json!({ "email": email, "password": password });
        let auth: AuthResponse = self
            .send(self.request(Method::POST, "/api/auth/login").json(&body))
            .await?;
        self.token = Some(auth.token);
        Ok(auth.data)
    }

    pub async fn list_posts(&self, cursor: Option<&str>, limit: Option<u32>) -> ClientResult<Page<PostView>> {
        let mut builder = self.request(Method::GET, "/api/post");
        if let Some(cursor) = cursor {
            builder = builder.query(&[("cursor", cursor)]);
        }
        if let Some(limit) = limit {
            builder = builder.query(&[("limit", limit)]);
        }
        self.send(builder).await
    }

    pub async fn create_post(
        &self,
        content: &str,
        access: Access,
        media: Vec<NewMediaRequest>,
    ) -> ClientResult<PostView> {
        let body = json!({ "content": content, "access": access, "media": media });
        let envelope: Envelope<PostView> = self
            .send(self.request(Method::POST, "/api/post").json(&body))
            .await?;
        Ok(envelope.data)
    }

    pub async fn get_post(&self, id: &str) -> ClientResult<PostDetail> {
        let envelope: Envelope<PostDetail> = self
            .send(self.request(Method::GET, &format!("/api/post/{id}")))
            .await?;
        Ok(envelope.data)
    }

    pub async fn toggle_bookmark(&self, post_id: &str) -> ClientResult<BookmarkState> {
        let body = json!({ "postId": post_id });
        self.send(self.request(Method::POST, "/api/post/bookmark").json(&body))
            .await
    }

    pub async fn toggle_like(&self, post_id: &str) -> ClientResult<LikeState> {
        let body = json!({ "postId": post_id });
        self.send(self.request(Method::POST, "/api/post/like").json(&body))
            .await
    }

    pub async fn create_comment(
        &self,
        post_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> ClientResult<PostComment> {
        let body = json!({ "postId": post_id, "content": content, "parentId": parent_id });
        let envelope: Envelope<PostComment> = self
            .send(self.request(Method::POST, "/api/post/comment").json(&body))
            .await?;
        Ok(envelope.data)
    }

    pub async fn toggle_access(&self, post_id: &str) -> ClientResult<Post> {
        let body = json!({ "postId": post_id });
        let envelope: Envelope<Post> = self
            .send(self.request(Method::PATCH, "/api/security").json(&body))
            .await?;
        Ok(envelope.data)
    }

    pub async fn check_follow(&self, ids: &[&str]) -> ClientResult<BTreeMap<String, bool>> {
        let builder = self
            .request(Method::GET, "/api/users/check-follow")
            .query(&[("ids", ids.join(","))]);
        self.send(builder).await
    }

    pub async fn follow_counts(&self, user_id: &str) -> ClientResult<FollowCounts> {
        self.send(self.request(Method::GET, &format!("/api/users/{user_id}/counts")))
            .await
    }

    pub async fn toggle_follow(&self, user_id: &str) -> ClientResult<FollowState> {
        self.send(self.request(Method::POST, &format!("/api/users/{user_id}/follow")))
            .await
    }

    pub async fn whoami(&self) -> ClientResult<Profile> {
        let envelope: Envelope<Profile> = self.send(self.request(Method::GET, "/api/whoami")).await?;
        Ok(envelope.data)
    }

    pub async fn my_posts(&self, cursor: Option<&str>) -> ClientResult<Page<PostView>> {
        let mut builder = self.request(Method::GET, "/api/whoami/post");
        if let Some(cursor) = cursor {
            builder = builder.query(&[("cursor", cursor)]);
        }
        self.send(builder).await
    }

    pub async fn rank_projects(&self, cursor: Option<&str>) -> ClientResult<RankedProjects> {
        let mut builder = self.request(Method::GET, "/api/project/rank");
        if let Some(cursor) = cursor {
            builder = builder.query(&[("cursor", cursor)]);
        }
        self.send(builder).await
    }
}
